use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Loading failures callers must distinguish: an absent season document is
/// fatal for that season (there is no safe default policy), an unusable one
/// is a config defect.
#[derive(Debug)]
pub enum RulesetError {
    NotFound { season_id: String, path: PathBuf },
    Invalid { path: PathBuf, detail: String },
}

impl fmt::Display for RulesetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulesetError::NotFound { season_id, path } => {
                write!(f, "no ruleset for season {season_id} at {}", path.display())
            }
            RulesetError::Invalid { path, detail } => {
                write!(f, "ruleset {} is not usable: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for RulesetError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChipWindow {
    pub start_period: u32,
    pub end_period: u32,
    pub chips: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChipPolicy {
    pub windows: Vec<ChipWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub appearance_point: i32,
    pub full_appearance_points: i32,
    pub goal_points_gk_def: i32,
    pub goal_points_mid: i32,
    pub goal_points_fwd: i32,
    pub assist_points: i32,
    pub clean_sheet_gk_def: i32,
    pub clean_sheet_mid: i32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            appearance_point: 1,
            full_appearance_points: 2,
            goal_points_gk_def: 6,
            goal_points_mid: 5,
            goal_points_fwd: 4,
            assist_points: 3,
            clean_sheet_gk_def: 4,
            clean_sheet_mid: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPolicy {
    pub free_transfers_per_period: u8,
    pub max_banked_transfers: u8,
    pub points_hit_per_extra: i32,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            free_transfers_per_period: 1,
            max_banked_transfers: 5,
            points_hit_per_extra: 4,
        }
    }
}

/// Squad-level legality bounds consumed by `projection::validate_squad`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadConstraints {
    pub squad_size: u8,
    pub goalkeepers: u8,
    pub defenders: u8,
    pub midfielders: u8,
    pub forwards: u8,
    pub max_per_team: u8,
    pub budget: f64,
}

impl Default for SquadConstraints {
    fn default() -> Self {
        Self {
            squad_size: 15,
            goalkeepers: 2,
            defenders: 5,
            midfielders: 5,
            forwards: 3,
            max_per_team: 3,
            budget: 100.0,
        }
    }
}

/// One season's rules. Loaded once per season; read-only for every analysis
/// that uses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub season_id: String,
    pub version: u32,
    pub chip_policy: ChipPolicy,
    pub scoring_policy: ScoringPolicy,
    pub transfer_policy: TransferPolicy,
    pub constraints: SquadConstraints,
    #[serde(skip)]
    pub source: PathBuf,
}

pub fn ruleset_path(dir: &Path, season_id: &str) -> PathBuf {
    dir.join(format!("ruleset_{season_id}.json"))
}

pub fn load_ruleset(dir: &Path, season_id: &str) -> Result<Ruleset, RulesetError> {
    let path = ruleset_path(dir, season_id);
    if !path.is_file() {
        return Err(RulesetError::NotFound {
            season_id: season_id.to_string(),
            path,
        });
    }

    let raw = fs::read_to_string(&path).map_err(|err| RulesetError::Invalid {
        path: path.clone(),
        detail: err.to_string(),
    })?;
    let mut ruleset: Ruleset = serde_json::from_str(&raw).map_err(|err| RulesetError::Invalid {
        path: path.clone(),
        detail: err.to_string(),
    })?;

    if ruleset.season_id != season_id {
        return Err(RulesetError::Invalid {
            path,
            detail: format!(
                "document is for season {}, wanted {season_id}",
                ruleset.season_id
            ),
        });
    }

    ruleset.source = path;
    debug!(
        season_id,
        version = ruleset.version,
        chip_windows = ruleset.chip_policy.windows.len(),
        "ruleset loaded"
    );
    Ok(ruleset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipUrgency {
    None,
    ForceThisPeriod,
}

#[derive(Debug, Clone)]
pub struct ChipWindowStatus {
    pub window: Option<ChipWindow>,
    pub chips_in_window: Vec<String>,
    pub urgency: ChipUrgency,
}

/// Scan the ordered chip windows for one containing `current_period`. A chip
/// whose window closes this period is use-it-or-lose-it.
pub fn evaluate_chip_windows(ruleset: &Ruleset, current_period: u32) -> ChipWindowStatus {
    for window in &ruleset.chip_policy.windows {
        if window.start_period <= current_period && current_period <= window.end_period {
            let urgency = if current_period == window.end_period {
                ChipUrgency::ForceThisPeriod
            } else {
                ChipUrgency::None
            };
            return ChipWindowStatus {
                chips_in_window: window.chips.clone(),
                window: Some(window.clone()),
                urgency,
            };
        }
    }

    ChipWindowStatus {
        window: None,
        chips_in_window: Vec::new(),
        urgency: ChipUrgency::None,
    }
}
