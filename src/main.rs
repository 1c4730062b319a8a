use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fpl_preflight::artifacts::ArtifactBundle;
use fpl_preflight::availability::{AvailabilitySignal, AvailabilityStatus, SignalConfidence};
use fpl_preflight::identity_check::{self, RenderedPlayerRef, RenderedSection};
use fpl_preflight::pipeline::{self, PreflightInputs, PreflightOutcome, PreflightPolicies};
use fpl_preflight::ruleset::ChipUrgency;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_RULESET_DIR: &str = "rulesets";
const DEFAULT_SEASON: &str = "2026-27";
const MAX_FLAG_LINES: usize = 15;

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_logging();

    let data_dir = arg_value("data")
        .or_else(|| std::env::var("APP_DATA_DIR").ok())
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    let ruleset_dir = arg_value("rulesets")
        .or_else(|| std::env::var("APP_RULESET_DIR").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RULESET_DIR));
    let season = arg_value("season")
        .or_else(|| std::env::var("APP_SEASON").ok())
        .unwrap_or_else(|| DEFAULT_SEASON.to_string());
    let roster = arg_value("roster")
        .or_else(|| std::env::var("APP_ROSTER_ID").ok())
        .and_then(|raw| raw.parse::<u64>().ok());

    let bundle = ArtifactBundle::new(&data_dir);
    let target_period = arg_value("period")
        .and_then(|raw| raw.parse::<u32>().ok())
        .or_else(|| infer_target_period(&bundle))
        .context("no --period given and none inferable from the schedule artifact")?;

    let policies = PreflightPolicies::from_env();
    let now = Utc::now();

    let outcome = pipeline::run_preflight(
        &bundle,
        &ruleset_dir,
        &season,
        roster,
        target_period,
        &policies,
        now,
    )?;

    match outcome {
        PreflightOutcome::Hold(gate) => {
            println!("PREFLIGHT HOLD (period {target_period})");
            if let Some(reason) = gate.block_reason {
                println!("Reason: {}", reason.as_str());
            }
            for line in &gate.missing {
                println!("  - {line}");
            }
            println!("Pipeline stopped; refresh the artifact bundle and rerun.");
            Ok(ExitCode::from(2))
        }
        PreflightOutcome::Ready(inputs) => {
            print_ready(&inputs, &bundle, target_period)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_ready(inputs: &PreflightInputs, bundle: &ArtifactBundle, target_period: u32) -> Result<()> {
    let static_data = bundle.load_static_data().context("static data for report")?;
    let team_short: HashMap<u32, &str> = static_data
        .teams
        .iter()
        .map(|t| (t.id, t.short_name.as_str()))
        .collect();
    let player_names: HashMap<u32, &str> = static_data
        .players
        .iter()
        .map(|p| (p.id, p.name.as_str()))
        .collect();
    let player_teams: HashMap<u32, u32> = static_data
        .players
        .iter()
        .map(|p| (p.id, p.team))
        .collect();

    let mut fit = 0usize;
    let mut doubt = 0usize;
    let mut out = 0usize;
    let mut unknown = 0usize;
    let mut low_confidence = 0usize;
    let mut flagged: Vec<(u32, &AvailabilitySignal)> = Vec::new();
    for (id, resolved) in &inputs.availability {
        match resolved.signal.status {
            AvailabilityStatus::Fit => fit += 1,
            AvailabilityStatus::Doubt => doubt += 1,
            AvailabilityStatus::Out => out += 1,
            AvailabilityStatus::Unknown => unknown += 1,
        }
        if resolved.signal.confidence == SignalConfidence::Low {
            low_confidence += 1;
        }
        if matches!(
            resolved.signal.status,
            AvailabilityStatus::Doubt | AvailabilityStatus::Out
        ) {
            flagged.push((*id, &resolved.signal));
        }
    }
    flagged.sort_unstable_by_key(|(id, _)| *id);

    // Verify the rows we are about to print against the canonical mapping
    // before anything leaves the process.
    let rows: Vec<RenderedPlayerRef> = flagged
        .iter()
        .map(|(id, _)| RenderedPlayerRef {
            player_id: Some(*id),
            team: player_teams.get(id).copied(),
        })
        .collect();
    identity_check::verify_sections(
        &inputs.canonical_teams,
        &[RenderedSection {
            label: "availability_flags".to_string(),
            rows,
        }],
    )?;

    println!(
        "Preflight ready: season {} (ruleset v{}) period {target_period}",
        inputs.ruleset.season_id, inputs.ruleset.version
    );
    match inputs.deadline {
        Some(deadline) => println!("Deadline: {}", deadline.to_rfc3339()),
        None => println!("Deadline: unknown"),
    }
    println!(
        "Slate: {} fixtures, blanks [{}], doubles [{}]",
        inputs.slate.fixture_count(),
        fmt_team_list(&inputs.slate.blank_teams, &team_short),
        fmt_team_list(&inputs.slate.double_teams, &team_short),
    );
    match &inputs.chip_status.window {
        Some(window) => {
            let urgency = match inputs.chip_status.urgency {
                ChipUrgency::ForceThisPeriod => "closes this period, use or lose",
                ChipUrgency::None => "open",
            };
            println!(
                "Chips: [{}] window periods {}-{} ({urgency})",
                window.chips.join(", "),
                window.start_period,
                window.end_period
            );
        }
        None => println!("Chips: no window open"),
    }
    println!(
        "Availability: {fit} fit / {doubt} doubt / {out} out / {unknown} unknown ({low_confidence} low confidence)"
    );

    if flagged.is_empty() {
        println!("No availability flags.");
        return Ok(());
    }
    println!("Flags:");
    for (id, signal) in flagged.iter().take(MAX_FLAG_LINES) {
        let name = player_names.get(id).copied().unwrap_or("?");
        let team = player_teams
            .get(id)
            .and_then(|t| team_short.get(t).copied())
            .unwrap_or("?");
        let chance = signal
            .chance
            .map(|c| format!(" {c}%"))
            .unwrap_or_default();
        let reason = signal
            .reason
            .as_deref()
            .map(|r| format!(" {r}"))
            .unwrap_or_default();
        println!(
            "  - {id} {name} ({team}): {}{chance} [{}, {}]{reason}",
            signal.status.as_str(),
            signal.confidence.as_str(),
            signal.source.as_str()
        );
    }
    if flagged.len() > MAX_FLAG_LINES {
        println!("  ... and {} more", flagged.len() - MAX_FLAG_LINES);
    }

    Ok(())
}

fn fmt_team_list(ids: &[u32], team_short: &HashMap<u32, &str>) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| {
            team_short
                .get(id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| id.to_string())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// First period the schedule still has open, when the caller gave none.
fn infer_target_period(bundle: &ArtifactBundle) -> Option<u32> {
    let schedule = bundle.load_schedule().ok()?;
    schedule.periods.iter().find(|p| !p.finished).map(|p| p.id)
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
