use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fpl_preflight::availability::AvailabilityStatus;
use fpl_preflight::feed_cache::{self, FEED_SCHEMA_VERSION, FeedCacheDoc};
use fpl_preflight::fetch;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SOURCE_LABEL: &str = "secondary";

/// One refresh pass over the secondary injury feed: fetch, parse, atomically
/// replace the cache document. Scheduling stays outside (cron every few
/// hours, plus a pass shortly before each deadline).
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let url = arg_value("url")
        .or_else(|| std::env::var("APP_FEED_URL").ok())
        .ok_or_else(|| anyhow!("no feed url; pass --url or set APP_FEED_URL"))?;
    let source = arg_value("source")
        .or_else(|| std::env::var("APP_FEED_SOURCE").ok())
        .unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string());
    let out_path = arg_value("out").map(PathBuf::from).unwrap_or_else(|| {
        let data_dir = std::env::var("APP_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        feed_cache::cache_path_in(PathBuf::from(data_dir).as_path())
    });

    let client = fetch::http_client()?;
    let body = fetch::fetch_json_cached(client, &url).context("feed request failed")?;
    let reports = feed_cache::parse_feed_payload(&body)?;

    let doc = FeedCacheDoc {
        schema_version: FEED_SCHEMA_VERSION,
        generated_at: Utc::now(),
        source: source.clone(),
        reports,
    };
    feed_cache::write_feed_cache(&out_path, &doc)?;

    let mut by_status: HashMap<&'static str, usize> = HashMap::new();
    for report in &doc.reports {
        *by_status
            .entry(AvailabilityStatus::parse(&report.status).as_str())
            .or_insert(0) += 1;
    }

    println!("Feed ingest complete");
    println!("Cache: {}", out_path.display());
    println!("Source: {source}");
    println!("Reports: {}", doc.reports.len());
    for status in ["fit", "doubt", "out", "unknown"] {
        if let Some(count) = by_status.get(status) {
            println!("  {status}: {count}");
        }
    }

    Ok(())
}

fn arg_value(name: &str) -> Option<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let prefix = format!("--{name}=");
    let flag = format!("--{name}");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
