use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::availability::{self, AvailabilitySignal, AvailabilityStatus, SignalSource};
use crate::slate::{self, Fixture, Slate};

pub const STATIC_DATA_FILE: &str = "static_data.json";
pub const FIXTURES_FILE: &str = "fixtures.json";
pub const SCHEDULE_FILE: &str = "schedule.json";
pub const SLATE_FILE: &str = "slate.json";
pub const COLLECTION_META_FILE: &str = "collection_meta.json";
pub const MANUAL_OVERRIDES_FILE: &str = "manual_overrides.json";

/// Handle to one collection run's artifact directory. The bundle itself
/// holds no data; loaders read the files on demand so the gate can check
/// presence before anything parses.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    root: PathBuf,
}

impl ArtifactBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn static_data_path(&self) -> PathBuf {
        self.root.join(STATIC_DATA_FILE)
    }

    pub fn fixtures_path(&self) -> PathBuf {
        self.root.join(FIXTURES_FILE)
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.root.join(SCHEDULE_FILE)
    }

    pub fn slate_path(&self) -> PathBuf {
        self.root.join(SLATE_FILE)
    }

    pub fn collection_meta_path(&self) -> PathBuf {
        self.root.join(COLLECTION_META_FILE)
    }

    pub fn manual_overrides_path(&self) -> PathBuf {
        self.root.join(MANUAL_OVERRIDES_FILE)
    }

    pub fn picks_path(&self, roster_id: u64) -> PathBuf {
        self.root.join(format!("picks_{roster_id}.json"))
    }

    /// Static reference data uses the upstream's own row shapes, so rows are
    /// walked leniently; only a corrupt file as a whole is an error.
    pub fn load_static_data(&self) -> Result<StaticData> {
        let value = read_value(&self.static_data_path())?;

        let mut players = Vec::new();
        let mut skipped = 0usize;
        if let Some(rows) = array_at(&value, &["elements", "players"]) {
            for row in rows {
                match parse_player_row(row) {
                    Some(player) => players.push(player),
                    None => skipped += 1,
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "player rows missing required fields were dropped");
        }

        let mut teams = Vec::new();
        if let Some(rows) = array_at(&value, &["teams"]) {
            for row in rows {
                if let Some(team) = parse_team_row(row) {
                    teams.push(team);
                }
            }
        }

        players.sort_unstable_by_key(|p| p.id);
        players.dedup_by_key(|p| p.id);
        teams.sort_unstable_by_key(|t| t.id);
        teams.dedup_by_key(|t| t.id);
        Ok(StaticData { players, teams })
    }

    pub fn load_fixtures(&self) -> Result<Vec<Fixture>> {
        let value = read_value(&self.fixtures_path())?;
        let mut fixtures = Vec::new();
        let mut skipped = 0usize;
        if let Some(rows) = array_at(&value, &["fixtures"]) {
            for row in rows {
                match slate::parse_fixture_row(row) {
                    Some(fixture) => fixtures.push(fixture),
                    None => skipped += 1,
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "fixture rows missing required fields were dropped");
        }
        Ok(fixtures)
    }

    pub fn load_schedule(&self) -> Result<ScheduleMeta> {
        read_json(&self.schedule_path())
    }

    pub fn load_slate_artifact(&self) -> Result<Slate> {
        read_json(&self.slate_path())
    }

    pub fn load_collection_meta(&self) -> Result<CollectionMeta> {
        read_json(&self.collection_meta_path())
    }

    pub fn load_manual_overrides(&self) -> Result<Vec<ManualOverrideEntry>> {
        read_json(&self.manual_overrides_path())
    }

    pub fn load_picks(&self, roster_id: u64) -> Result<RosterPicks> {
        read_json(&self.picks_path(roster_id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticData {
    pub players: Vec<PlayerRecord>,
    pub teams: Vec<TeamRecord>,
}

impl StaticData {
    pub fn team_ids(&self) -> Vec<u32> {
        self.teams.iter().map(|t| t.id).collect()
    }

    /// Canonical player -> team mapping, the reference side of the identity
    /// integrity check.
    pub fn canonical_team_map(&self) -> HashMap<u32, u32> {
        self.players.iter().map(|p| (p.id, p.team)).collect()
    }

    pub fn player_ids(&self) -> HashSet<u32> {
        self.players.iter().map(|p| p.id).collect()
    }
}

#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: u32,
    pub name: String,
    pub team: u32,
    pub element_type: u8,
    pub status: Option<String>,
    pub news: Option<String>,
    pub chance_of_playing: Option<i64>,
    pub news_added: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TeamRecord {
    pub id: u32,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMeta {
    pub periods: Vec<PeriodEvent>,
}

impl ScheduleMeta {
    pub fn deadline_for(&self, period: u32) -> Option<DateTime<Utc>> {
        self.periods
            .iter()
            .find(|p| p.id == period)
            .and_then(|p| p.deadline_utc)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodEvent {
    pub id: u32,
    pub deadline_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: bool,
}

/// `collected_at` stays a raw string here: the gate distinguishes an
/// unreadable stamp from a stale one, so parsing happens at check time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub collected_at: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl CollectionMeta {
    pub fn collected_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.collected_at.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterPicks {
    pub roster_id: u64,
    pub period: u32,
    pub picks: Vec<PickEntry>,
}

impl RosterPicks {
    pub fn player_ids(&self) -> HashSet<u32> {
        self.picks.iter().map(|p| p.player_id).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickEntry {
    pub player_id: u32,
    #[serde(default)]
    pub slot: u32,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualOverrideEntry {
    pub player_id: u32,
    pub status: String,
    #[serde(default)]
    pub chance: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub asof: Option<String>,
}

/// Convert manual override entries into first-class signals. Overrides with
/// no timestamp are treated as stated now; the marker keeps that visible in
/// resolution traces.
pub fn override_signals(
    entries: &[ManualOverrideEntry],
    now: DateTime<Utc>,
) -> Vec<AvailabilitySignal> {
    entries
        .iter()
        .map(|entry| {
            let (asof, assumed) = availability::parse_asof(entry.asof.as_deref(), now);
            let mut signal = AvailabilitySignal::new(
                entry.player_id,
                AvailabilityStatus::parse(&entry.status),
                SignalSource::ManualConfirmed,
                asof,
            );
            signal.asof_assumed = assumed;
            if let Some(chance) = entry.chance {
                signal = signal.with_chance(chance);
            }
            if let Some(note) = &entry.note {
                signal = signal.with_reason(note.clone());
            }
            signal
        })
        .collect()
}

/// Derive primary-feed signals from the static reference rows. Every player
/// row carries a status, so every known player gets one signal; rows without
/// a news timestamp are stamped with the bundle's collection time.
pub fn primary_signals(
    static_data: &StaticData,
    collected_at: DateTime<Utc>,
) -> Vec<AvailabilitySignal> {
    static_data
        .players
        .iter()
        .map(|player| {
            let (asof, assumed) =
                availability::parse_asof(player.news_added.as_deref(), collected_at);
            let status = AvailabilityStatus::parse(player.status.as_deref().unwrap_or(""));
            let mut signal =
                AvailabilitySignal::new(player.id, status, SignalSource::PrimaryFeed, asof);
            signal.asof_assumed = assumed;
            if let Some(chance) = player.chance_of_playing {
                signal = signal.with_chance(chance);
            }
            if let Some(news) = &player.news {
                signal = signal.with_reason(news.clone());
            }
            signal
        })
        .collect()
}

fn read_value(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Accept either a bare array or an object keyed by any of `keys`: the
/// collection step stores upstream payloads close to their original shape,
/// and that shape has drifted across seasons.
fn array_at<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Vec<Value>> {
    if let Some(rows) = value.as_array() {
        return Some(rows);
    }
    for key in keys {
        if let Some(rows) = value.get(key).and_then(|x| x.as_array()) {
            return Some(rows);
        }
    }
    None
}

fn parse_player_row(v: &Value) -> Option<PlayerRecord> {
    let id = v.get("id")?.as_u64()? as u32;
    let name = v
        .get("web_name")
        .or_else(|| v.get("name"))
        .and_then(|x| x.as_str())
        .unwrap_or("?")
        .to_string();
    let team = v.get("team").and_then(|x| x.as_u64()).unwrap_or(0) as u32;
    let element_type = v.get("element_type").and_then(|x| x.as_u64()).unwrap_or(0) as u8;
    let status = v
        .get("status")
        .and_then(|x| x.as_str())
        .map(|s| s.to_string());
    let news = v
        .get("news")
        .and_then(|x| x.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string());
    let chance_of_playing = v
        .get("chance_of_playing_next_round")
        .or_else(|| v.get("chance_of_playing"))
        .and_then(|x| x.as_i64());
    let news_added = v
        .get("news_added")
        .and_then(|x| x.as_str())
        .map(|s| s.to_string());

    Some(PlayerRecord {
        id,
        name,
        team,
        element_type,
        status,
        news,
        chance_of_playing,
        news_added,
    })
}

fn parse_team_row(v: &Value) -> Option<TeamRecord> {
    let id = v.get("id")?.as_u64()? as u32;
    let name = v
        .get("name")
        .and_then(|x| x.as_str())
        .unwrap_or("?")
        .to_string();
    let short_name = v
        .get("short_name")
        .and_then(|x| x.as_str())
        .unwrap_or("?")
        .to_string();
    Some(TeamRecord {
        id,
        name,
        short_name,
    })
}
