use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ruleset::SquadConstraints;

pub const TAG_INJURY_RISK: &str = "injury_risk";
pub const TAG_ROTATION_RISK: &str = "rotation_risk";
pub const TAG_DOUBLE_PERIOD: &str = "double_period";
pub const TAG_BLANK_PERIOD: &str = "blank_period";

const ROTATION_MINUTES_FLOOR: f64 = 70.0;
const BUDGET_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayerPosition {
    Gk,
    Def,
    Mid,
    Fwd,
}

impl PlayerPosition {
    /// Upstream encodes positions as element type 1..4.
    pub fn from_element_type(element_type: u8) -> Option<Self> {
        match element_type {
            1 => Some(PlayerPosition::Gk),
            2 => Some(PlayerPosition::Def),
            3 => Some(PlayerPosition::Mid),
            4 => Some(PlayerPosition::Fwd),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GK" | "GKP" | "GOALKEEPER" => Some(PlayerPosition::Gk),
            "DEF" | "DEFENDER" => Some(PlayerPosition::Def),
            "MID" | "MIDFIELDER" => Some(PlayerPosition::Mid),
            "FWD" | "FORWARD" | "STRIKER" => Some(PlayerPosition::Fwd),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerPosition::Gk => "GK",
            PlayerPosition::Def => "DEF",
            PlayerPosition::Mid => "MID",
            PlayerPosition::Fwd => "FWD",
        }
    }
}

/// The one projection shape downstream logic may consume. Everything the
/// recommendation engine needs travels on this record; derived quantities
/// are methods so they can never go stale against the stored fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPlayerProjection {
    pub player_id: u32,
    pub name: String,
    pub position: PlayerPosition,
    pub team: u32,
    pub price: f64,
    pub next_period_points: f64,
    pub next_n_periods_points: f64,
    pub expected_minutes_next: f64,
    pub volatility_score: f64,
    pub ceiling: f64,
    pub floor: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: f64,
    pub ownership_pct: f64,
    #[serde(default)]
    pub captaincy_rate: Option<f64>,
    #[serde(default)]
    pub fixture_difficulty: Option<u8>,
}

impl CanonicalPlayerProjection {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Ownership counting captaincy double-weight. Only computable when a
    /// captaincy rate was observed.
    pub fn effective_ownership(&self) -> Option<f64> {
        self.captaincy_rate.map(|cap| self.ownership_pct + cap)
    }

    pub fn rotation_risk(&self) -> bool {
        self.has_tag(TAG_ROTATION_RISK) || self.expected_minutes_next < ROTATION_MINUTES_FLOOR
    }

    pub fn points_per_price(&self) -> f64 {
        if self.price > 0.0 {
            self.next_period_points / self.price
        } else {
            0.0
        }
    }
}

/// Outcome of a validation walk. Disposition is the caller's: reject, log,
/// or proceed degraded.
#[derive(Debug, Clone)]
pub struct ProjectionValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ProjectionValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Walk a full projection set and accumulate every violation. Never
/// fail-fast: a caller deciding what to do with a bad set needs the whole
/// picture, not the first defect.
pub fn validate_projection_set(projections: &[CanonicalPlayerProjection]) -> ProjectionValidation {
    let mut errors = Vec::new();

    if projections.is_empty() {
        errors.push("projection set is empty".to_string());
    }

    let mut seen: HashMap<u32, usize> = HashMap::new();
    for projection in projections {
        let who = format!("player {} ({})", projection.player_id, projection.name);

        if projection.price <= 0.0 {
            errors.push(format!("{who}: price {:.1} is not positive", projection.price));
        }
        if projection.next_period_points < 0.0 {
            errors.push(format!(
                "{who}: next-period points {:.2} is negative",
                projection.next_period_points
            ));
        }
        if projection.next_n_periods_points < 0.0 {
            errors.push(format!(
                "{who}: multi-period points {:.2} is negative",
                projection.next_n_periods_points
            ));
        }
        if !(0.0..=90.0).contains(&projection.expected_minutes_next) {
            errors.push(format!(
                "{who}: expected minutes {:.1} outside 0-90",
                projection.expected_minutes_next
            ));
        }
        if !(0.0..=1.0).contains(&projection.volatility_score) {
            errors.push(format!(
                "{who}: volatility {:.3} outside 0-1",
                projection.volatility_score
            ));
        }
        if !(0.0..=1.0).contains(&projection.confidence) {
            errors.push(format!(
                "{who}: confidence {:.3} outside 0-1",
                projection.confidence
            ));
        }
        if let Some(difficulty) = projection.fixture_difficulty
            && !(1..=5).contains(&difficulty)
        {
            errors.push(format!("{who}: fixture difficulty {difficulty} outside 1-5"));
        }

        *seen.entry(projection.player_id).or_insert(0) += 1;
    }

    let mut dup_ids: Vec<u32> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    dup_ids.sort_unstable();
    for id in dup_ids {
        errors.push(format!("player {id} appears more than once in the set"));
    }

    ProjectionValidation::from_errors(errors)
}

/// Squad-level legality against the season's constraints: size, position
/// template, per-team cap, budget.
pub fn validate_squad(
    squad: &[CanonicalPlayerProjection],
    constraints: &SquadConstraints,
) -> ProjectionValidation {
    let mut errors = Vec::new();

    if squad.len() != constraints.squad_size as usize {
        errors.push(format!(
            "squad has {} players, rules require {}",
            squad.len(),
            constraints.squad_size
        ));
    }

    let mut gk = 0u8;
    let mut def = 0u8;
    let mut mid = 0u8;
    let mut fwd = 0u8;
    let mut per_team: HashMap<u32, u8> = HashMap::new();
    let mut total_price = 0.0f64;
    for player in squad {
        match player.position {
            PlayerPosition::Gk => gk += 1,
            PlayerPosition::Def => def += 1,
            PlayerPosition::Mid => mid += 1,
            PlayerPosition::Fwd => fwd += 1,
        }
        *per_team.entry(player.team).or_insert(0) += 1;
        total_price += player.price;
    }

    for (label, have, want) in [
        ("GK", gk, constraints.goalkeepers),
        ("DEF", def, constraints.defenders),
        ("MID", mid, constraints.midfielders),
        ("FWD", fwd, constraints.forwards),
    ] {
        if have != want {
            errors.push(format!("{label} count {have}, rules require {want}"));
        }
    }

    let mut over_cap: Vec<(u32, u8)> = per_team
        .into_iter()
        .filter(|(_, count)| *count > constraints.max_per_team)
        .collect();
    over_cap.sort_unstable();
    for (team, count) in over_cap {
        errors.push(format!(
            "team {team} supplies {count} players, cap is {}",
            constraints.max_per_team
        ));
    }

    if total_price > constraints.budget + BUDGET_EPS {
        errors.push(format!(
            "squad costs {total_price:.1}, budget is {:.1}",
            constraints.budget
        ));
    }

    ProjectionValidation::from_errors(errors)
}
