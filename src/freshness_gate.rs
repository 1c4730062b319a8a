//! Readiness gate over the artifact bundle. Runs before anything else and
//! stops the pipeline with a HOLD value when the inputs are incomplete or
//! stale. A HOLD is routed output, not an error: it means "not ready", and
//! nothing downstream may run until the underlying condition changes.

use std::env;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::artifacts::ArtifactBundle;

const DEFAULT_MAX_AGE_MINUTES: i64 = 120;

/// Fewer picks than a full starting eleven cannot produce a lineup.
pub const MIN_PICKS: usize = 11;

#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub max_age_minutes: i64,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            max_age_minutes: DEFAULT_MAX_AGE_MINUTES,
        }
    }
}

impl GatePolicy {
    pub fn from_env() -> Self {
        let max_age_minutes = env::var("APP_GATE_MAX_AGE_MIN")
            .ok()
            .and_then(|val| val.parse::<i64>().ok())
            .unwrap_or(DEFAULT_MAX_AGE_MINUTES)
            .clamp(1, 10_080);
        Self { max_age_minutes }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Pass,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    StaticDataMissing,
    FixturesMissing,
    ScheduleMissing,
    SlateMissing,
    PicksMissing,
    CollectionMetaMissing,
    CollectionMetaUnreadable,
    StaleCollection,
    NoFixturesForPeriod,
    EmptySlate,
    NoDeadlineForPeriod,
    InsufficientPicks,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::StaticDataMissing => "static_data_missing",
            BlockReason::FixturesMissing => "fixtures_missing",
            BlockReason::ScheduleMissing => "schedule_missing",
            BlockReason::SlateMissing => "slate_missing",
            BlockReason::PicksMissing => "picks_missing",
            BlockReason::CollectionMetaMissing => "collection_meta_missing",
            BlockReason::CollectionMetaUnreadable => "collection_meta_unreadable",
            BlockReason::StaleCollection => "stale_collection",
            BlockReason::NoFixturesForPeriod => "no_fixtures_for_period",
            BlockReason::EmptySlate => "empty_slate",
            BlockReason::NoDeadlineForPeriod => "no_deadline_for_period",
            BlockReason::InsufficientPicks => "insufficient_picks",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateResult {
    pub status: GateStatus,
    pub block_reason: Option<BlockReason>,
    pub missing: Vec<String>,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }

    fn pass() -> Self {
        Self {
            status: GateStatus::Pass,
            block_reason: None,
            missing: Vec::new(),
        }
    }
}

fn hold(reason: BlockReason, detail: String) -> GateResult {
    warn!(reason = reason.as_str(), detail, "preflight gate hold");
    GateResult {
        status: GateStatus::Hold,
        block_reason: Some(reason),
        missing: vec![detail],
    }
}

/// Evaluate the gate checks strictly in order; the first failure decides
/// the block reason. Presence checks come before content checks, so a
/// missing artifact always names itself rather than a downstream symptom.
/// An artifact that is present but unreadable fails the first check that
/// needs its contents.
pub fn evaluate(
    bundle: &ArtifactBundle,
    roster: Option<u64>,
    target_period: u32,
    policy: &GatePolicy,
    now: DateTime<Utc>,
) -> GateResult {
    let static_path = bundle.static_data_path();
    if !static_path.is_file() {
        return hold(
            BlockReason::StaticDataMissing,
            format!("static reference data not collected ({})", static_path.display()),
        );
    }
    let fixtures_path = bundle.fixtures_path();
    if !fixtures_path.is_file() {
        return hold(
            BlockReason::FixturesMissing,
            format!("fixtures not collected ({})", fixtures_path.display()),
        );
    }
    let schedule_path = bundle.schedule_path();
    if !schedule_path.is_file() {
        return hold(
            BlockReason::ScheduleMissing,
            format!("period schedule not collected ({})", schedule_path.display()),
        );
    }
    let slate_path = bundle.slate_path();
    if !slate_path.is_file() {
        return hold(
            BlockReason::SlateMissing,
            format!("slate artifact not built ({})", slate_path.display()),
        );
    }
    if let Some(roster_id) = roster {
        let picks_path = bundle.picks_path(roster_id);
        if !picks_path.is_file() {
            return hold(
                BlockReason::PicksMissing,
                format!("no picks artifact for roster {roster_id} ({})", picks_path.display()),
            );
        }
    }

    let meta_path = bundle.collection_meta_path();
    if !meta_path.is_file() {
        return hold(
            BlockReason::CollectionMetaMissing,
            format!("collection metadata missing ({})", meta_path.display()),
        );
    }
    let collected_at = match bundle.load_collection_meta() {
        Ok(meta) => match meta.collected_at_utc() {
            Some(ts) => ts,
            None => {
                return hold(
                    BlockReason::CollectionMetaUnreadable,
                    format!("collected_at '{}' is not a timestamp", meta.collected_at),
                );
            }
        },
        Err(err) => {
            return hold(
                BlockReason::CollectionMetaUnreadable,
                format!("collection metadata unreadable: {err:#}"),
            );
        }
    };
    let age = now - collected_at;
    if age > Duration::minutes(policy.max_age_minutes) {
        return hold(
            BlockReason::StaleCollection,
            format!(
                "collection is {}m old, limit is {}m",
                age.num_minutes(),
                policy.max_age_minutes
            ),
        );
    }

    let fixtures = match bundle.load_fixtures() {
        Ok(fixtures) => fixtures,
        Err(err) => {
            return hold(
                BlockReason::NoFixturesForPeriod,
                format!("fixtures artifact unreadable: {err:#}"),
            );
        }
    };
    if !fixtures.iter().any(|f| f.period == Some(target_period)) {
        return hold(
            BlockReason::NoFixturesForPeriod,
            format!("no fixtures scheduled for period {target_period}"),
        );
    }

    let slate = match bundle.load_slate_artifact() {
        Ok(slate) => slate,
        Err(err) => {
            return hold(
                BlockReason::EmptySlate,
                format!("slate artifact unreadable: {err:#}"),
            );
        }
    };
    if slate.fixture_count() == 0 {
        return hold(
            BlockReason::EmptySlate,
            format!("slate artifact is empty for period {}", slate.target_period),
        );
    }

    let schedule = match bundle.load_schedule() {
        Ok(schedule) => schedule,
        Err(err) => {
            return hold(
                BlockReason::NoDeadlineForPeriod,
                format!("schedule artifact unreadable: {err:#}"),
            );
        }
    };
    if schedule.deadline_for(target_period).is_none() {
        return hold(
            BlockReason::NoDeadlineForPeriod,
            format!("schedule has no deadline entry for period {target_period}"),
        );
    }

    if let Some(roster_id) = roster {
        let picks = match bundle.load_picks(roster_id) {
            Ok(picks) => picks,
            Err(err) => {
                return hold(
                    BlockReason::InsufficientPicks,
                    format!("picks artifact unreadable: {err:#}"),
                );
            }
        };
        if picks.picks.len() < MIN_PICKS {
            return hold(
                BlockReason::InsufficientPicks,
                format!(
                    "roster {roster_id} has {} picks, need at least {MIN_PICKS}",
                    picks.picks.len()
                ),
            );
        }
    }

    GateResult::pass()
}
