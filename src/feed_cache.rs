use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::availability::{self, AvailabilitySignal, AvailabilityStatus, SignalSource};

pub const FEED_SCHEMA_VERSION: u32 = 1;
pub const FEED_CACHE_FILE: &str = "injury_feed_cache.json";

/// On-disk document written by the ingest pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCacheDoc {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub reports: Vec<FeedReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedReport {
    pub player_id: u32,
    pub status: String,
    #[serde(default)]
    pub chance: Option<i64>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub reported_at: Option<String>,
}

/// Read-only view of one complete cache generation, taken once per analysis.
/// The writer replaces the file atomically, so a snapshot is always either
/// the previous generation or the new one, never a blend.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    reports: Vec<FeedReport>,
}

impl FeedSnapshot {
    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    /// Convert the snapshot's reports into secondary-feed signals. Reports
    /// without a usable timestamp are stamped with the generation time.
    pub fn signals(&self) -> Vec<AvailabilitySignal> {
        self.reports
            .iter()
            .map(|report| {
                let (asof, assumed) =
                    availability::parse_asof(report.reported_at.as_deref(), self.generated_at);
                let mut signal = AvailabilitySignal::new(
                    report.player_id,
                    AvailabilityStatus::parse(&report.status),
                    SignalSource::SecondaryFeed,
                    asof,
                );
                signal.asof_assumed = assumed;
                if let Some(chance) = report.chance {
                    signal = signal.with_chance(chance);
                }
                if let Some(detail) = &report.detail {
                    signal = signal.with_reason(detail.clone());
                }
                signal
            })
            .collect()
    }
}

pub fn cache_path_in(dir: &Path) -> PathBuf {
    dir.join(FEED_CACHE_FILE)
}

/// Load the current cache generation. An absent file is the normal cold
/// state and returns None silently; a present but unreadable or
/// wrong-schema file also returns None, with a warning, so one bad refresh
/// can never take resolution down.
pub fn load_feed_snapshot(path: &Path) -> Option<FeedSnapshot> {
    if !path.is_file() {
        return None;
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "feed cache unreadable, ignoring");
            return None;
        }
    };
    let doc: FeedCacheDoc = match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(path = %path.display(), %err, "feed cache malformed, ignoring");
            return None;
        }
    };
    if doc.schema_version != FEED_SCHEMA_VERSION {
        warn!(
            found = doc.schema_version,
            expected = FEED_SCHEMA_VERSION,
            "feed cache schema mismatch, ignoring"
        );
        return None;
    }

    Some(FeedSnapshot {
        generated_at: doc.generated_at,
        source: doc.source,
        reports: doc.reports,
    })
}

/// Parse a raw provider payload into reports. Providers disagree on field
/// names and wrap the list differently, so this walks the JSON leniently;
/// rows without a player id are dropped with a warning count.
pub fn parse_feed_payload(raw: &str) -> Result<Vec<FeedReport>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(anyhow::anyhow!("empty feed payload"));
    }
    let value: Value = serde_json::from_str(trimmed).context("invalid feed json")?;

    let rows = if let Some(rows) = value.as_array() {
        rows.as_slice()
    } else if let Some(rows) = ["reports", "items", "players"]
        .iter()
        .find_map(|key| value.get(key).and_then(|x| x.as_array()))
    {
        rows.as_slice()
    } else {
        return Err(anyhow::anyhow!("feed payload has no report list"));
    };

    let mut reports = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        match parse_report_row(row) {
            Some(report) => reports.push(report),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "feed rows without a player id were dropped");
    }
    Ok(reports)
}

fn parse_report_row(v: &Value) -> Option<FeedReport> {
    let player_id = v
        .get("player_id")
        .or_else(|| v.get("id"))
        .or_else(|| v.get("element"))
        .and_then(|x| x.as_u64())? as u32;

    let status = v
        .get("status")
        .or_else(|| v.get("injury_status"))
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string();
    let chance = v
        .get("chance")
        .or_else(|| v.get("chance_of_playing"))
        .and_then(|x| x.as_i64());
    let detail = v
        .get("detail")
        .or_else(|| v.get("news"))
        .or_else(|| v.get("note"))
        .and_then(|x| x.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string());
    let reported_at = v
        .get("reported_at")
        .or_else(|| v.get("updated"))
        .or_else(|| v.get("asof"))
        .and_then(|x| x.as_str())
        .map(|s| s.to_string());

    Some(FeedReport {
        player_id,
        status,
        chance,
        detail,
        reported_at,
    })
}

/// Atomic replace: write the new generation next to the live file, then
/// rename over it. Concurrent readers keep whichever generation they
/// already opened.
pub fn write_feed_cache(path: &Path, doc: &FeedCacheDoc) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(doc).context("encode feed cache")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
