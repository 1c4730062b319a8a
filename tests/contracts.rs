use std::collections::HashMap;

use fpl_preflight::identity_check::{RenderedPlayerRef, RenderedSection, verify_sections};
use fpl_preflight::identity_check::IntegrityError;
use fpl_preflight::lineup::{LineupError, LineupSelection};
use fpl_preflight::projection::{
    CanonicalPlayerProjection, PlayerPosition, TAG_ROTATION_RISK, validate_projection_set,
    validate_squad,
};
use fpl_preflight::ruleset::SquadConstraints;

fn projection(player_id: u32, position: PlayerPosition, team: u32) -> CanonicalPlayerProjection {
    CanonicalPlayerProjection {
        player_id,
        name: format!("P{player_id}"),
        position,
        team,
        price: 6.0,
        next_period_points: 4.2,
        next_n_periods_points: 16.0,
        expected_minutes_next: 85.0,
        volatility_score: 0.3,
        ceiling: 12.0,
        floor: 1.0,
        tags: Vec::new(),
        confidence: 0.7,
        ownership_pct: 12.5,
        captaincy_rate: None,
        fixture_difficulty: Some(3),
    }
}

fn legal_starters() -> Vec<CanonicalPlayerProjection> {
    let mut starters = vec![projection(1, PlayerPosition::Gk, 1)];
    for id in 2..=5 {
        starters.push(projection(id, PlayerPosition::Def, id % 6 + 1));
    }
    for id in 6..=9 {
        starters.push(projection(id, PlayerPosition::Mid, id % 6 + 1));
    }
    starters.push(projection(10, PlayerPosition::Fwd, 5));
    starters.push(projection(11, PlayerPosition::Fwd, 6));
    starters
}

fn legal_bench() -> Vec<CanonicalPlayerProjection> {
    vec![
        projection(12, PlayerPosition::Gk, 7),
        projection(13, PlayerPosition::Def, 8),
        projection(14, PlayerPosition::Mid, 9),
        projection(15, PlayerPosition::Fwd, 10),
    ]
}

#[test]
fn lineup_with_ten_starters_fails() {
    let mut starters = legal_starters();
    starters.pop();

    let err = LineupSelection::new(starters, legal_bench(), vec![]).expect_err("10 starters");
    assert_eq!(
        err,
        LineupError::StarterCount {
            expected: 11,
            found: 10
        }
    );
}

#[test]
fn lineup_with_twelve_starters_fails() {
    let mut starters = legal_starters();
    starters.push(projection(16, PlayerPosition::Mid, 2));

    let err = LineupSelection::new(starters, legal_bench(), vec![]).expect_err("12 starters");
    assert_eq!(
        err,
        LineupError::StarterCount {
            expected: 11,
            found: 12
        }
    );
}

#[test]
fn lineup_with_three_bench_players_fails() {
    let mut bench = legal_bench();
    bench.pop();

    let err = LineupSelection::new(legal_starters(), bench, vec![]).expect_err("3 bench");
    assert_eq!(
        err,
        LineupError::BenchCount {
            expected: 4,
            found: 3
        }
    );
}

#[test]
fn captain_pool_with_bench_player_fails() {
    let err = LineupSelection::new(legal_starters(), legal_bench(), vec![7, 12])
        .expect_err("bench captain");
    assert_eq!(err, LineupError::CaptainOutsideStarters { player_id: 12 });
}

#[test]
fn two_goalkeepers_in_the_eleven_fails() {
    let mut starters = legal_starters();
    // Swap a forward for a second keeper; counts become 2 GK / 4 DEF / 4 MID / 1 FWD.
    starters.pop();
    starters.push(projection(11, PlayerPosition::Gk, 6));

    let err = LineupSelection::new(starters, legal_bench(), vec![]).expect_err("two keepers");
    assert!(matches!(err, LineupError::BadFormation { gk: 2, .. }));
}

#[test]
fn one_four_four_two_constructs_with_valid_formation() {
    let lineup = LineupSelection::new(legal_starters(), legal_bench(), vec![7, 10])
        .expect("legal lineup should construct");

    assert_eq!(lineup.formation(), "4-4-2");
    assert!(lineup.formation_valid());
    assert_eq!(lineup.starters().len(), 11);
    assert_eq!(lineup.bench().len(), 4);
    assert_eq!(lineup.captain_pool(), &[7, 10]);
}

#[test]
fn empty_captain_pool_is_allowed() {
    assert!(LineupSelection::new(legal_starters(), legal_bench(), vec![]).is_ok());
}

#[test]
fn projection_validator_accumulates_every_violation() {
    let mut broken = projection(1, PlayerPosition::Mid, 1);
    broken.price = -0.5;
    broken.expected_minutes_next = 120.0;
    broken.volatility_score = 1.5;
    let mut negative = projection(2, PlayerPosition::Fwd, 2);
    negative.next_period_points = -1.0;
    negative.confidence = 1.2;

    let report = validate_projection_set(&[broken, negative]);

    assert!(!report.valid);
    assert!(report.errors.len() >= 5, "all defects reported: {:?}", report.errors);
    assert!(report.errors.iter().any(|e| e.contains("price")));
    assert!(report.errors.iter().any(|e| e.contains("minutes")));
    assert!(report.errors.iter().any(|e| e.contains("volatility")));
    assert!(report.errors.iter().any(|e| e.contains("points")));
    assert!(report.errors.iter().any(|e| e.contains("confidence")));
}

#[test]
fn empty_projection_set_is_a_violation() {
    let report = validate_projection_set(&[]);
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn clean_projection_set_passes() {
    let set = vec![
        projection(1, PlayerPosition::Gk, 1),
        projection(2, PlayerPosition::Def, 2),
    ];
    let report = validate_projection_set(&set);
    assert!(report.valid);
    assert!(report.errors.is_empty());
}

#[test]
fn duplicate_player_ids_are_flagged() {
    let set = vec![
        projection(5, PlayerPosition::Mid, 1),
        projection(5, PlayerPosition::Mid, 1),
    ];
    let report = validate_projection_set(&set);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("more than once")));
}

#[test]
fn derived_projection_quantities() {
    let mut player = projection(1, PlayerPosition::Fwd, 1);
    assert_eq!(player.effective_ownership(), None);

    player.ownership_pct = 40.0;
    player.captaincy_rate = Some(15.0);
    let eo = player.effective_ownership().expect("captaincy known");
    assert!((eo - 55.0).abs() < f64::EPSILON);

    assert!(!player.rotation_risk());
    player.expected_minutes_next = 55.0;
    assert!(player.rotation_risk());
    player.expected_minutes_next = 90.0;
    player.tags.push(TAG_ROTATION_RISK.to_string());
    assert!(player.rotation_risk());

    player.price = 8.0;
    player.next_period_points = 6.0;
    assert!((player.points_per_price() - 0.75).abs() < f64::EPSILON);
}

fn legal_squad() -> Vec<CanonicalPlayerProjection> {
    let positions = [
        PlayerPosition::Gk,
        PlayerPosition::Gk,
        PlayerPosition::Def,
        PlayerPosition::Def,
        PlayerPosition::Def,
        PlayerPosition::Def,
        PlayerPosition::Def,
        PlayerPosition::Mid,
        PlayerPosition::Mid,
        PlayerPosition::Mid,
        PlayerPosition::Mid,
        PlayerPosition::Mid,
        PlayerPosition::Fwd,
        PlayerPosition::Fwd,
        PlayerPosition::Fwd,
    ];
    positions
        .into_iter()
        .enumerate()
        .map(|(i, pos)| projection(i as u32 + 1, pos, (i as u32 % 5) + 1))
        .collect()
}

#[test]
fn legal_squad_passes_constraints() {
    let report = validate_squad(&legal_squad(), &SquadConstraints::default());
    assert!(report.valid, "unexpected errors: {:?}", report.errors);
}

#[test]
fn squad_constraint_violations_accumulate() {
    let mut squad = legal_squad();
    // Pile four players onto team 1 and blow the budget.
    squad[1].team = 1;
    squad[6].team = 1;
    for player in &mut squad {
        player.price = 7.5;
    }

    let report = validate_squad(&squad, &SquadConstraints::default());

    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("team 1")));
    assert!(report.errors.iter().any(|e| e.contains("budget")));
}

#[test]
fn short_squad_is_flagged() {
    let squad = vec![projection(1, PlayerPosition::Gk, 1)];
    let report = validate_squad(&squad, &SquadConstraints::default());
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("15")));
}

#[test]
fn identity_mismatch_is_a_hard_failure() {
    let canonical: HashMap<u32, u32> = [(1, 10), (2, 20)].into_iter().collect();
    let sections = vec![RenderedSection {
        label: "captain_shortlist".to_string(),
        rows: vec![
            RenderedPlayerRef {
                player_id: Some(1),
                team: Some(10),
            },
            RenderedPlayerRef {
                player_id: Some(2),
                team: Some(30),
            },
        ],
    }];

    let err = verify_sections(&canonical, &sections).expect_err("team 30 is wrong");
    assert_eq!(
        err,
        IntegrityError::TeamMismatch {
            section: "captain_shortlist".to_string(),
            player_id: 2,
            canonical_team: 20,
            rendered_team: 30,
        }
    );
}

#[test]
fn underspecified_rows_are_skipped() {
    let canonical: HashMap<u32, u32> = [(1, 10)].into_iter().collect();
    let sections = vec![RenderedSection {
        label: "transfers".to_string(),
        rows: vec![
            // No player id.
            RenderedPlayerRef {
                player_id: None,
                team: Some(99),
            },
            // No rendered team.
            RenderedPlayerRef {
                player_id: Some(1),
                team: None,
            },
            // Unknown to the canonical map.
            RenderedPlayerRef {
                player_id: Some(777),
                team: Some(3),
            },
        ],
    }];

    assert!(verify_sections(&canonical, &sections).is_ok());
}

#[test]
fn consistent_sections_pass() {
    let canonical: HashMap<u32, u32> = [(1, 10), (2, 20)].into_iter().collect();
    let sections = vec![
        RenderedSection {
            label: "starters".to_string(),
            rows: vec![RenderedPlayerRef {
                player_id: Some(1),
                team: Some(10),
            }],
        },
        RenderedSection {
            label: "bench".to_string(),
            rows: vec![RenderedPlayerRef {
                player_id: Some(2),
                team: Some(20),
            }],
        },
    ];

    assert!(verify_sections(&canonical, &sections).is_ok());
}
