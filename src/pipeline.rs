use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::artifacts::{self, ArtifactBundle};
use crate::availability::AvailabilitySignal;
use crate::feed_cache;
use crate::freshness_gate::{self, GatePolicy, GateResult};
use crate::injury_resolve::{self, DecayPolicy, ResolvedAvailability};
use crate::ruleset::{self, ChipWindowStatus, Ruleset};
use crate::slate::{self, Slate};

/// Tunables for one preflight run, resolved once at process start.
#[derive(Debug, Clone, Default)]
pub struct PreflightPolicies {
    pub gate: GatePolicy,
    pub decay: DecayPolicy,
}

impl PreflightPolicies {
    pub fn from_env() -> Self {
        Self {
            gate: GatePolicy::from_env(),
            decay: DecayPolicy::from_env(),
        }
    }
}

/// Everything downstream consumers need once the gate passes. The pipeline
/// never computes projections itself; it hands over clean inputs.
#[derive(Debug, Clone)]
pub struct PreflightInputs {
    pub gate: GateResult,
    pub ruleset: Ruleset,
    pub slate: Slate,
    pub availability: HashMap<u32, ResolvedAvailability>,
    pub chip_status: ChipWindowStatus,
    pub canonical_teams: HashMap<u32, u32>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum PreflightOutcome {
    /// The artifact bundle is not ready; nothing downstream ran.
    Hold(GateResult),
    Ready(Box<PreflightInputs>),
}

/// One analysis pass: gate, then ruleset, slate, and availability
/// resolution over the bundle. A gate HOLD is returned as a value; errors
/// are reserved for a missing ruleset or an artifact that passed the gate
/// yet failed to load.
pub fn run_preflight(
    bundle: &ArtifactBundle,
    ruleset_dir: &Path,
    season_id: &str,
    roster: Option<u64>,
    target_period: u32,
    policies: &PreflightPolicies,
    now: DateTime<Utc>,
) -> Result<PreflightOutcome> {
    let gate = freshness_gate::evaluate(bundle, roster, target_period, &policies.gate, now);
    if !gate.passed() {
        return Ok(PreflightOutcome::Hold(gate));
    }

    let ruleset: Ruleset = ruleset::load_ruleset(ruleset_dir, season_id)?;

    let static_data = bundle.load_static_data().context("static data")?;
    let fixtures = bundle.load_fixtures().context("fixtures")?;
    let built_slate = slate::build_slate(&fixtures, &static_data.team_ids(), target_period);

    let meta = bundle.load_collection_meta().context("collection metadata")?;
    let collected_at = meta.collected_at_utc().unwrap_or(now);

    let mut signals: Vec<AvailabilitySignal> = Vec::new();
    if bundle.manual_overrides_path().is_file() {
        let overrides = bundle.load_manual_overrides().context("manual overrides")?;
        signals.extend(artifacts::override_signals(&overrides, now));
    }
    signals.extend(artifacts::primary_signals(&static_data, collected_at));
    let feed_path = feed_cache::cache_path_in(bundle.root());
    if let Some(snapshot) = feed_cache::load_feed_snapshot(&feed_path) {
        debug!(
            reports = snapshot.report_count(),
            source = %snapshot.source,
            "secondary feed snapshot loaded"
        );
        signals.extend(snapshot.signals());
    }

    // With a roster, every picked player must resolve even if unobserved;
    // without one, coverage is whatever the sources mention.
    let expected: HashSet<u32> = match roster {
        Some(roster_id) => bundle
            .load_picks(roster_id)
            .context("roster picks")?
            .player_ids(),
        None => HashSet::new(),
    };

    let grouped = injury_resolve::group_by_player(signals);
    let availability = injury_resolve::resolve_all(&expected, grouped, now, &policies.decay);

    let chip_status = ruleset::evaluate_chip_windows(&ruleset, target_period);
    let schedule = bundle.load_schedule().context("schedule")?;
    let deadline = schedule.deadline_for(target_period);

    info!(
        target_period,
        players = availability.len(),
        fixtures = built_slate.fixture_count(),
        "preflight ready"
    );

    Ok(PreflightOutcome::Ready(Box::new(PreflightInputs {
        gate,
        ruleset,
        slate: built_slate,
        availability,
        chip_status,
        canonical_teams: static_data.canonical_team_map(),
        deadline,
    })))
}
