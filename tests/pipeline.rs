use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use fpl_preflight::artifacts::ArtifactBundle;
use fpl_preflight::availability::{AvailabilityStatus, SignalSource};
use fpl_preflight::feed_cache::{FEED_SCHEMA_VERSION, FeedCacheDoc, FeedReport, cache_path_in, write_feed_cache};
use fpl_preflight::freshness_gate::BlockReason;
use fpl_preflight::pipeline::{PreflightOutcome, PreflightPolicies, run_preflight};
use fpl_preflight::ruleset::{
    ChipPolicy, ChipUrgency, ChipWindow, Ruleset, ScoringPolicy, SquadConstraints, TransferPolicy,
};

const ROSTER: u64 = 4242;
const SEASON: &str = "2026-27";
const PERIOD: u32 = 1;

fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 14, 12, 0, 0)
        .single()
        .expect("valid datetime")
}

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write artifact");
}

fn write_static_data(dir: &Path) {
    let mut elements = String::from(
        r#"[{"id":1,"web_name":"Raya","team":1,"element_type":1,"status":"a"},
            {"id":2,"web_name":"Saka","team":1,"element_type":3,"status":"d",
             "chance_of_playing_next_round":75,"news":"Knock, 75% chance of playing",
             "news_added":"2026-08-14T09:00:00Z"},
            {"id":3,"web_name":"Son","team":2,"element_type":3,"status":"a"}"#,
    );
    for id in 4..=15 {
        elements.push_str(&format!(
            r#",{{"id":{id},"web_name":"P{id}","team":{},"element_type":3,"status":"a"}}"#,
            id % 2 + 1
        ));
    }
    elements.push(']');
    write(
        &dir.join("static_data.json"),
        &format!(
            r#"{{"elements":{elements},"teams":[{{"id":1,"name":"Arsenal","short_name":"ARS"}},{{"id":2,"name":"Spurs","short_name":"TOT"}}]}}"#
        ),
    );
}

fn write_bundle(dir: &Path) -> ArtifactBundle {
    write_static_data(dir);
    write(
        &dir.join("fixtures.json"),
        r#"[{"id":100,"event":1,"team_h":1,"team_a":2,"kickoff_time":"2026-08-15T14:00:00Z",
             "team_h_difficulty":2,"team_a_difficulty":4,"finished":false},
            {"id":101,"event":2,"team_h":2,"team_a":1,"kickoff_time":"2026-08-22T14:00:00Z",
             "team_h_difficulty":3,"team_a_difficulty":3,"finished":false}]"#,
    );
    write(
        &dir.join("schedule.json"),
        r#"{"periods":[{"id":1,"deadline_utc":"2026-08-15T10:00:00Z","finished":false},
                       {"id":2,"deadline_utc":"2026-08-22T10:00:00Z","finished":false}]}"#,
    );
    write(
        &dir.join("slate.json"),
        r#"{"target_period":1,
            "fixtures":[{"id":100,"period":1,"kickoff_utc":"2026-08-15T14:00:00Z",
                         "home_team":1,"away_team":2,"home_difficulty":2,"away_difficulty":4,
                         "finished":false}],
            "teams_in_period":[1,2],"blank_teams":[],"double_teams":[]}"#,
    );
    write(
        &dir.join("collection_meta.json"),
        r#"{"collected_at":"2026-08-14T11:30:00Z","source":"collector"}"#,
    );

    let mut picks = String::from("[");
    for id in 1..=15 {
        if id > 1 {
            picks.push(',');
        }
        picks.push_str(&format!(r#"{{"player_id":{id},"slot":{id}}}"#));
    }
    picks.push(']');
    write(
        &dir.join(format!("picks_{ROSTER}.json")),
        &format!(r#"{{"roster_id":{ROSTER},"period":1,"picks":{picks}}}"#),
    );

    ArtifactBundle::new(dir)
}

fn write_ruleset(dir: &Path) {
    let ruleset = Ruleset {
        season_id: SEASON.to_string(),
        version: 3,
        chip_policy: ChipPolicy {
            windows: vec![ChipWindow {
                start_period: 1,
                end_period: 1,
                chips: vec!["wildcard".to_string()],
            }],
        },
        scoring_policy: ScoringPolicy::default(),
        transfer_policy: TransferPolicy::default(),
        constraints: SquadConstraints::default(),
        source: PathBuf::new(),
    };
    write(
        &dir.join(format!("ruleset_{SEASON}.json")),
        &serde_json::to_string_pretty(&ruleset).expect("encode ruleset"),
    );
}

#[test]
fn ready_outcome_carries_resolved_inputs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let data = temp.path().join("data");
    let rulesets = temp.path().join("rulesets");
    fs::create_dir_all(&data).expect("data dir");
    fs::create_dir_all(&rulesets).expect("ruleset dir");

    let bundle = write_bundle(&data);
    write_ruleset(&rulesets);
    // Manual call overrides the primary feed's 75% doubt for Saka.
    write(
        &data.join("manual_overrides.json"),
        r#"[{"player_id":2,"status":"out","note":"ruled out in presser","asof":"2026-08-14T11:00:00Z"}]"#,
    );
    // Secondary feed disagrees about Son; the primary feed must win.
    let feed = FeedCacheDoc {
        schema_version: FEED_SCHEMA_VERSION,
        generated_at: test_now(),
        source: "press".to_string(),
        reports: vec![FeedReport {
            player_id: 3,
            status: "doubt".to_string(),
            chance: Some(25),
            detail: None,
            reported_at: None,
        }],
    };
    write_feed_cache(&cache_path_in(&data), &feed).expect("write feed cache");

    let outcome = run_preflight(
        &bundle,
        &rulesets,
        SEASON,
        Some(ROSTER),
        PERIOD,
        &PreflightPolicies::default(),
        test_now(),
    )
    .expect("preflight should not error");

    let inputs = match outcome {
        PreflightOutcome::Ready(inputs) => inputs,
        PreflightOutcome::Hold(gate) => panic!("unexpected hold: {:?}", gate.block_reason),
    };

    assert!(inputs.gate.passed());
    assert_eq!(inputs.ruleset.season_id, SEASON);
    assert_eq!(inputs.slate.fixture_count(), 1);
    assert_eq!(inputs.slate.teams_in_period, vec![1, 2]);

    // Every picked player resolved, nobody extra.
    assert_eq!(inputs.availability.len(), 15);

    let saka = &inputs.availability[&2];
    assert_eq!(saka.signal.status, AvailabilityStatus::Out);
    assert_eq!(saka.signal.source, SignalSource::ManualConfirmed);

    let son = &inputs.availability[&3];
    assert_eq!(son.signal.status, AvailabilityStatus::Fit);
    assert_eq!(son.signal.source, SignalSource::PrimaryFeed);

    assert_eq!(inputs.chip_status.urgency, ChipUrgency::ForceThisPeriod);
    assert_eq!(inputs.chip_status.chips_in_window, vec!["wildcard"]);

    assert_eq!(inputs.canonical_teams.get(&1), Some(&1));
    assert_eq!(inputs.canonical_teams.get(&3), Some(&2));
    assert_eq!(
        inputs.deadline,
        Utc.with_ymd_and_hms(2026, 8, 15, 10, 0, 0).single()
    );
}

#[test]
fn gate_hold_returns_before_the_ruleset_is_touched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let data = temp.path().join("data");
    let empty_rulesets = temp.path().join("rulesets");
    fs::create_dir_all(&data).expect("data dir");
    fs::create_dir_all(&empty_rulesets).expect("ruleset dir");

    let bundle = write_bundle(&data);
    write(
        &data.join("collection_meta.json"),
        r#"{"collected_at":"2026-08-14T06:00:00Z","source":"collector"}"#,
    );

    // No ruleset file exists, yet the stale bundle must come back as a
    // routed hold rather than an error.
    let outcome = run_preflight(
        &bundle,
        &empty_rulesets,
        SEASON,
        Some(ROSTER),
        PERIOD,
        &PreflightPolicies::default(),
        test_now(),
    )
    .expect("hold is not an error");

    match outcome {
        PreflightOutcome::Hold(gate) => {
            assert_eq!(gate.block_reason, Some(BlockReason::StaleCollection));
        }
        PreflightOutcome::Ready(_) => panic!("stale bundle must not pass"),
    }
}

#[test]
fn missing_ruleset_is_an_error_once_the_gate_passes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let data = temp.path().join("data");
    let empty_rulesets = temp.path().join("rulesets");
    fs::create_dir_all(&data).expect("data dir");
    fs::create_dir_all(&empty_rulesets).expect("ruleset dir");

    let bundle = write_bundle(&data);

    let err = run_preflight(
        &bundle,
        &empty_rulesets,
        SEASON,
        Some(ROSTER),
        PERIOD,
        &PreflightPolicies::default(),
        test_now(),
    )
    .expect_err("no ruleset document exists");

    assert!(err.to_string().contains("no ruleset for season"));
}

#[test]
fn without_roster_coverage_follows_the_observed_signals() {
    let temp = tempfile::tempdir().expect("tempdir");
    let data = temp.path().join("data");
    let rulesets = temp.path().join("rulesets");
    fs::create_dir_all(&data).expect("data dir");
    fs::create_dir_all(&rulesets).expect("ruleset dir");

    let bundle = write_bundle(&data);
    write_ruleset(&rulesets);

    let outcome = run_preflight(
        &bundle,
        &rulesets,
        SEASON,
        None,
        PERIOD,
        &PreflightPolicies::default(),
        test_now(),
    )
    .expect("preflight should not error");

    let inputs = match outcome {
        PreflightOutcome::Ready(inputs) => inputs,
        PreflightOutcome::Hold(gate) => panic!("unexpected hold: {:?}", gate.block_reason),
    };

    // The primary feed mentions all fifteen players in the reference data.
    assert_eq!(inputs.availability.len(), 15);
    assert!(inputs.availability.values().all(|r| r.signal.source == SignalSource::PrimaryFeed));
}
