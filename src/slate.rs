use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One scheduled match as collected from the fixtures artifact. `period` and
/// `kickoff_utc` stay optional: the upstream publishes unscheduled fixtures
/// with both fields null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub period: Option<u32>,
    pub kickoff_utc: Option<DateTime<Utc>>,
    pub home_team: u32,
    pub away_team: u32,
    #[serde(default)]
    pub home_difficulty: u8,
    #[serde(default)]
    pub away_difficulty: u8,
    #[serde(default)]
    pub finished: bool,
}

/// The fixture slate for one target period, with per-team schedule quirks
/// already classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slate {
    pub target_period: u32,
    pub fixtures: Vec<Fixture>,
    pub teams_in_period: Vec<u32>,
    pub blank_teams: Vec<u32>,
    pub double_teams: Vec<u32>,
}

impl Slate {
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }
}

/// Build the slate for `target_period`. Pure; two calls over the same rows
/// in any order produce identical output (fixtures sorted by kickoff then
/// id, team lists ascending).
pub fn build_slate(fixtures: &[Fixture], team_universe: &[u32], target_period: u32) -> Slate {
    let mut in_period: Vec<Fixture> = fixtures
        .iter()
        .filter(|f| f.period == Some(target_period))
        .cloned()
        .collect();

    in_period.sort_unstable_by_key(|f| f.id);
    in_period.dedup_by_key(|f| f.id);
    // Unscheduled kickoffs go last; id breaks exact-time ties.
    in_period.sort_unstable_by_key(|f| (f.kickoff_utc.is_none(), f.kickoff_utc, f.id));

    let mut counts: HashMap<u32, u32> = HashMap::new();
    for fixture in &in_period {
        *counts.entry(fixture.home_team).or_insert(0) += 1;
        *counts.entry(fixture.away_team).or_insert(0) += 1;
    }

    let mut teams_in_period: Vec<u32> = counts.keys().copied().collect();
    teams_in_period.sort_unstable();

    let mut blank_teams = Vec::new();
    let mut double_teams = Vec::new();
    for &team in team_universe {
        match counts.get(&team).copied().unwrap_or(0) {
            0 => blank_teams.push(team),
            n if n >= 2 => double_teams.push(team),
            _ => {}
        }
    }
    blank_teams.sort_unstable();
    blank_teams.dedup();
    double_teams.sort_unstable();
    double_teams.dedup();

    debug!(
        target_period,
        fixtures = in_period.len(),
        blanks = blank_teams.len(),
        doubles = double_teams.len(),
        "slate built"
    );

    Slate {
        target_period,
        fixtures: in_period,
        teams_in_period,
        blank_teams,
        double_teams,
    }
}

/// Parse one fixtures-artifact row. Rows without an id or team pair are
/// unusable and yield None; everything else degrades field by field.
pub fn parse_fixture_row(v: &Value) -> Option<Fixture> {
    let id = v.get("id")?.as_u64()? as u32;
    let home_team = v.get("team_h")?.as_u64()? as u32;
    let away_team = v.get("team_a")?.as_u64()? as u32;

    let period = v.get("event").and_then(|x| x.as_u64()).map(|e| e as u32);
    let kickoff_utc = v
        .get("kickoff_time")
        .and_then(|x| x.as_str())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let home_difficulty = v
        .get("team_h_difficulty")
        .and_then(|x| x.as_u64())
        .unwrap_or(3) as u8;
    let away_difficulty = v
        .get("team_a_difficulty")
        .and_then(|x| x.as_u64())
        .unwrap_or(3) as u8;
    let finished = v.get("finished").and_then(|x| x.as_bool()).unwrap_or(false);

    Some(Fixture {
        id,
        period,
        kickoff_utc,
        home_team,
        away_team,
        home_difficulty,
        away_difficulty,
        finished,
    })
}
