use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const AGENT: &str = "fpl-preflight/0.1";

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "fpl_preflight";
const CACHE_FILE: &str = "http_cache.json";

static CLIENT: OnceCell<Client> = OnceCell::new();
static CACHE: Mutex<Option<FetchCacheFile>> = Mutex::new(None);

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FetchCacheFile {
    version: u32,
    responses: HashMap<String, CachedResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResponse {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// Conditional GET with an on-disk response cache. Sends If-None-Match /
/// If-Modified-Since when a validator is known; a 304 serves the cached
/// body. Feed endpoints rarely change between ingest passes, so most passes
/// cost a header exchange.
pub fn fetch_json_cached(client: &Client, url: &str) -> Result<String> {
    let cached = {
        let mut guard = CACHE.lock().expect("fetch cache lock poisoned");
        let cache = guard.get_or_insert_with(load_cache_file);
        cache.responses.get(url).cloned()
    };

    let mut req = client.get(url).header(USER_AGENT, AGENT);
    if let Some(entry) = cached.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().context("request failed")?;
    let status = resp.status();
    let headers = resp.headers().clone();
    if status == StatusCode::NOT_MODIFIED {
        if let Some(entry) = cached {
            store_response(url, entry.clone());
            return Ok(entry.body);
        }
        return Err(anyhow::anyhow!("received 304 without a cached body"));
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }

    let etag = headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let last_modified = headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    store_response(
        url,
        CachedResponse {
            body: body.clone(),
            etag,
            last_modified,
            fetched_at: system_time_to_secs(SystemTime::now()).unwrap_or_default(),
        },
    );
    Ok(body)
}

fn store_response(url: &str, entry: CachedResponse) {
    let mut guard = CACHE.lock().expect("fetch cache lock poisoned");
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    cache.responses.insert(url.to_string(), entry);
    let _ = save_cache_file(cache);
}

fn load_cache_file() -> FetchCacheFile {
    let Some(path) = cache_path() else {
        return FetchCacheFile::default();
    };
    let Some(raw) = fs::read_to_string(path).ok() else {
        return FetchCacheFile::default();
    };
    let cache = serde_json::from_str::<FetchCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return FetchCacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &FetchCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).ok();
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize fetch cache")?;
    fs::write(&tmp, json).context("write fetch cache")?;
    fs::rename(&tmp, &path).context("swap fetch cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(CACHE_DIR)
            .join(CACHE_FILE),
    )
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
