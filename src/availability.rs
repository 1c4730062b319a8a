use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Fit,
    Doubt,
    Out,
    Unknown,
}

impl AvailabilityStatus {
    /// Map free text onto a closed status. Unrecognized input is Unknown,
    /// never an error; accepts both words and the upstream letter codes.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "fit" | "available" | "a" => return AvailabilityStatus::Fit,
            "doubt" | "doubtful" | "d" => return AvailabilityStatus::Doubt,
            "out" | "injured" | "suspended" | "unavailable" | "i" | "s" | "o" | "u" | "n" => {
                return AvailabilityStatus::Out;
            }
            _ => {}
        }
        if s.contains("doubt") || s.contains("knock") {
            AvailabilityStatus::Doubt
        } else if s.contains("injur") || s.contains("susp") || s.contains("out") {
            AvailabilityStatus::Out
        } else {
            AvailabilityStatus::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Fit => "fit",
            AvailabilityStatus::Doubt => "doubt",
            AvailabilityStatus::Out => "out",
            AvailabilityStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    ManualConfirmed,
    PrimaryFeed,
    SecondaryFeed,
    Unknown,
}

impl SignalSource {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual_confirmed" | "manual" | "override" => SignalSource::ManualConfirmed,
            "primary_feed" | "primary" => SignalSource::PrimaryFeed,
            "secondary_feed" | "secondary" => SignalSource::SecondaryFeed,
            _ => SignalSource::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::ManualConfirmed => "manual_confirmed",
            SignalSource::PrimaryFeed => "primary_feed",
            SignalSource::SecondaryFeed => "secondary_feed",
            SignalSource::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalConfidence {
    High,
    Med,
    Low,
}

impl SignalConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalConfidence::High => "high",
            SignalConfidence::Med => "med",
            SignalConfidence::Low => "low",
        }
    }
}

/// One availability observation for one player from one source.
///
/// `confidence` is derived during resolution; whatever an input document
/// claims is ignored. `asof_assumed` marks that the observation carried no
/// usable timestamp and `asof` was degraded to the collection time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySignal {
    pub player_id: u32,
    pub status: AvailabilityStatus,
    pub chance: Option<u8>,
    pub reason: Option<String>,
    pub source: SignalSource,
    pub asof: DateTime<Utc>,
    #[serde(default)]
    pub asof_assumed: bool,
    pub confidence: SignalConfidence,
}

impl AvailabilitySignal {
    pub fn new(
        player_id: u32,
        status: AvailabilityStatus,
        source: SignalSource,
        asof: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id,
            status,
            chance: None,
            reason: None,
            source,
            asof,
            asof_assumed: false,
            confidence: SignalConfidence::Low,
        }
    }

    /// Placeholder for a player expected in scope but absent from every
    /// source: status Unknown, confidence Low.
    pub fn unknown_placeholder(player_id: u32, now: DateTime<Utc>) -> Self {
        let mut signal = Self::new(player_id, AvailabilityStatus::Unknown, SignalSource::Unknown, now);
        signal.asof_assumed = true;
        signal
    }

    pub fn with_chance(mut self, raw: i64) -> Self {
        self.chance = Some(clamp_chance(raw));
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if !reason.trim().is_empty() {
            self.reason = Some(reason);
        }
        self
    }
}

pub fn clamp_chance(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Parse an observation timestamp; absent or unparseable input degrades to
/// `now` and the second element reports that the degradation happened.
pub fn parse_asof(raw: Option<&str>, now: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    let Some(raw) = raw else {
        return (now, true);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (now, true);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return (parsed.with_timezone(&Utc), false);
    }
    // Some providers drop the offset; assume UTC for bare datetimes.
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
            return (naive.and_utc(), false);
        }
    }
    (now, true)
}
