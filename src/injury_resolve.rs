//! Multi-source availability reconciliation.
//!
//! Every player in scope resolves to exactly one winning signal: manual
//! overrides beat the primary feed, the primary feed beats the secondary
//! feed, and recency only breaks ties inside a tier. Confidence decays with
//! the winner's age per source-specific windows.

use std::collections::{HashMap, HashSet};
use std::env;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::availability::{AvailabilitySignal, AvailabilityStatus, SignalConfidence, SignalSource};

const DEFAULT_MANUAL_FRESH_HOURS: i64 = 12;
const DEFAULT_PRIMARY_FRESH_HOURS: i64 = 6;
const DEFAULT_SECONDARY_FRESH_HOURS: i64 = 8;

/// Freshness windows (hours) before a source's confidence decays. Candidates
/// for promotion into the per-season ruleset; env-tunable until then.
#[derive(Debug, Clone)]
pub struct DecayPolicy {
    pub manual_fresh_hours: i64,
    pub primary_fresh_hours: i64,
    pub secondary_fresh_hours: i64,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            manual_fresh_hours: DEFAULT_MANUAL_FRESH_HOURS,
            primary_fresh_hours: DEFAULT_PRIMARY_FRESH_HOURS,
            secondary_fresh_hours: DEFAULT_SECONDARY_FRESH_HOURS,
        }
    }
}

impl DecayPolicy {
    pub fn from_env() -> Self {
        Self {
            manual_fresh_hours: env_hours("APP_DECAY_MANUAL_HOURS", DEFAULT_MANUAL_FRESH_HOURS),
            primary_fresh_hours: env_hours("APP_DECAY_PRIMARY_HOURS", DEFAULT_PRIMARY_FRESH_HOURS),
            secondary_fresh_hours: env_hours(
                "APP_DECAY_SECONDARY_HOURS",
                DEFAULT_SECONDARY_FRESH_HOURS,
            ),
        }
    }
}

fn env_hours(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(1, 168)
}

/// The single winning signal for a player plus an ordered audit trail of why
/// it won.
#[derive(Debug, Clone)]
pub struct ResolvedAvailability {
    pub signal: AvailabilitySignal,
    pub trace: Vec<String>,
}

fn source_rank(source: SignalSource) -> u8 {
    match source {
        SignalSource::ManualConfirmed => 0,
        SignalSource::PrimaryFeed => 1,
        SignalSource::SecondaryFeed => 2,
        SignalSource::Unknown => 3,
    }
}

fn status_severity(status: AvailabilityStatus) -> u8 {
    match status {
        AvailabilityStatus::Out => 3,
        AvailabilityStatus::Doubt => 2,
        AvailabilityStatus::Fit => 1,
        AvailabilityStatus::Unknown => 0,
    }
}

// Content-only ordering so a shuffled candidate list can never change the
// winner: latest asof, then higher reported chance, then graver status.
fn beats(challenger: &AvailabilitySignal, incumbent: &AvailabilitySignal) -> bool {
    let ck = (
        challenger.asof,
        challenger.chance.unwrap_or(0),
        status_severity(challenger.status),
    );
    let ik = (
        incumbent.asof,
        incumbent.chance.unwrap_or(0),
        status_severity(incumbent.status),
    );
    ck > ik
}

/// Reduce all observations for one player to a single `ResolvedAvailability`.
/// Pure with respect to the candidates and the supplied `now`.
pub fn resolve_player(
    player_id: u32,
    mut candidates: Vec<AvailabilitySignal>,
    now: DateTime<Utc>,
    policy: &DecayPolicy,
) -> ResolvedAvailability {
    let mut trace = Vec::new();

    for candidate in &mut candidates {
        if let Some(chance) = candidate.chance
            && chance > 100
        {
            candidate.chance = Some(100);
            trace.push(format!(
                "chance {} from {} clamped to 100",
                chance,
                candidate.source.as_str()
            ));
        }
        if candidate.asof_assumed {
            trace.push(format!(
                "{} observation had no usable asof; treated as collection time",
                candidate.source.as_str()
            ));
        }
    }

    if candidates.is_empty() {
        trace.push("no observations from any source; synthesized unknown placeholder".to_string());
        return ResolvedAvailability {
            signal: AvailabilitySignal::unknown_placeholder(player_id, now),
            trace,
        };
    }

    let best_rank = candidates
        .iter()
        .map(|c| source_rank(c.source))
        .min()
        .unwrap_or(u8::MAX);
    let tier: Vec<&AvailabilitySignal> = candidates
        .iter()
        .filter(|c| source_rank(c.source) == best_rank)
        .collect();
    let ignored = candidates.len() - tier.len();

    let mut winner = tier[0];
    for candidate in &tier[1..] {
        if beats(candidate, winner) {
            winner = candidate;
        }
    }

    trace.push(format!(
        "{} of {} observation(s) in winning tier {}",
        tier.len(),
        candidates.len(),
        winner.source.as_str()
    ));
    if ignored > 0 {
        trace.push(format!(
            "{ignored} lower-precedence observation(s) ignored regardless of recency"
        ));
    }
    if tier.len() > 1 {
        trace.push(format!(
            "tie within tier broken by recency; winner asof {}",
            winner.asof.to_rfc3339()
        ));
    }

    let mut resolved = winner.clone();
    let age = now - resolved.asof;
    let (confidence, reason) = decayed_confidence(resolved.source, age, policy);
    resolved.confidence = confidence;
    trace.push(reason);

    debug!(
        player_id,
        source = resolved.source.as_str(),
        status = resolved.status.as_str(),
        confidence = resolved.confidence.as_str(),
        "availability resolved"
    );

    ResolvedAvailability {
        signal: resolved,
        trace,
    }
}

fn decayed_confidence(
    source: SignalSource,
    age: Duration,
    policy: &DecayPolicy,
) -> (SignalConfidence, String) {
    let (window_hours, fresh, label) = match source {
        SignalSource::ManualConfirmed => {
            (policy.manual_fresh_hours, SignalConfidence::High, "manual")
        }
        SignalSource::PrimaryFeed => (
            policy.primary_fresh_hours,
            SignalConfidence::High,
            "primary feed",
        ),
        SignalSource::SecondaryFeed => (
            policy.secondary_fresh_hours,
            SignalConfidence::Med,
            "secondary feed",
        ),
        SignalSource::Unknown => {
            return (
                SignalConfidence::Low,
                "unknown source is always low confidence".to_string(),
            );
        }
    };

    // Inclusive boundary: a signal aged exactly at the window keeps the
    // fresh confidence; one second past it decays.
    if age <= Duration::hours(window_hours) {
        let minutes = age.num_minutes().max(0);
        (
            fresh,
            format!(
                "confidence {}: {label} observation is {minutes}m old (window {window_hours}h)",
                fresh.as_str()
            ),
        )
    } else {
        (
            SignalConfidence::Low,
            format!(
                "confidence low: {label} observation is {}h old, past the {window_hours}h window",
                age.num_hours()
            ),
        )
    }
}

/// Resolve every player in `expected` plus every player that has at least
/// one observation. Expected players with no observations synthesize an
/// Unknown/Low placeholder so the roster is always fully covered.
pub fn resolve_all(
    expected: &HashSet<u32>,
    mut by_player: HashMap<u32, Vec<AvailabilitySignal>>,
    now: DateTime<Utc>,
    policy: &DecayPolicy,
) -> HashMap<u32, ResolvedAvailability> {
    let mut ids: HashSet<u32> = expected.clone();
    ids.extend(by_player.keys().copied());

    let mut out = HashMap::with_capacity(ids.len());
    for id in ids {
        let candidates = by_player.remove(&id).unwrap_or_default();
        out.insert(id, resolve_player(id, candidates, now, policy));
    }
    out
}

/// Group a flat signal list by player id, preserving per-player input order.
pub fn group_by_player(signals: Vec<AvailabilitySignal>) -> HashMap<u32, Vec<AvailabilitySignal>> {
    let mut out: HashMap<u32, Vec<AvailabilitySignal>> = HashMap::new();
    for signal in signals {
        out.entry(signal.player_id).or_default().push(signal);
    }
    out
}
