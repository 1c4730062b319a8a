use std::collections::HashSet;
use std::fmt;

use crate::projection::{CanonicalPlayerProjection, PlayerPosition};

pub const STARTER_COUNT: usize = 11;
pub const BENCH_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineupError {
    StarterCount { expected: usize, found: usize },
    BenchCount { expected: usize, found: usize },
    CaptainOutsideStarters { player_id: u32 },
    BadFormation { gk: u8, def: u8, mid: u8, fwd: u8 },
}

impl fmt::Display for LineupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineupError::StarterCount { expected, found } => {
                write!(f, "lineup needs {expected} starters, got {found}")
            }
            LineupError::BenchCount { expected, found } => {
                write!(f, "lineup needs {expected} bench players, got {found}")
            }
            LineupError::CaptainOutsideStarters { player_id } => {
                write!(f, "captain candidate {player_id} is not a starter")
            }
            LineupError::BadFormation { gk, def, mid, fwd } => {
                write!(
                    f,
                    "formation {gk}GK/{def}DEF/{mid}MID/{fwd}FWD is not playable"
                )
            }
        }
    }
}

impl std::error::Error for LineupError {}

/// A starting eleven plus bench that passed every legality check at
/// construction. Fields are private on purpose: an illegal lineup can never
/// exist as a value of this type.
#[derive(Debug, Clone)]
pub struct LineupSelection {
    starters: Vec<CanonicalPlayerProjection>,
    bench: Vec<CanonicalPlayerProjection>,
    captain_pool: Vec<u32>,
    formation: String,
}

impl LineupSelection {
    /// Checks run in order: starter count, bench count, captain pool subset
    /// of starters, formation (1 GK, 3-5 DEF, 3-5 MID, 1-3 FWD).
    pub fn new(
        starters: Vec<CanonicalPlayerProjection>,
        bench: Vec<CanonicalPlayerProjection>,
        captain_pool: Vec<u32>,
    ) -> Result<Self, LineupError> {
        if starters.len() != STARTER_COUNT {
            return Err(LineupError::StarterCount {
                expected: STARTER_COUNT,
                found: starters.len(),
            });
        }
        if bench.len() != BENCH_COUNT {
            return Err(LineupError::BenchCount {
                expected: BENCH_COUNT,
                found: bench.len(),
            });
        }

        let starter_ids: HashSet<u32> = starters.iter().map(|p| p.player_id).collect();
        if let Some(&outsider) = captain_pool.iter().find(|id| !starter_ids.contains(id)) {
            return Err(LineupError::CaptainOutsideStarters {
                player_id: outsider,
            });
        }

        let mut gk = 0u8;
        let mut def = 0u8;
        let mut mid = 0u8;
        let mut fwd = 0u8;
        for starter in &starters {
            match starter.position {
                PlayerPosition::Gk => gk += 1,
                PlayerPosition::Def => def += 1,
                PlayerPosition::Mid => mid += 1,
                PlayerPosition::Fwd => fwd += 1,
            }
        }
        if gk != 1 || !(3..=5).contains(&def) || !(3..=5).contains(&mid) || !(1..=3).contains(&fwd)
        {
            return Err(LineupError::BadFormation { gk, def, mid, fwd });
        }

        let formation = format!("{def}-{mid}-{fwd}");
        Ok(Self {
            starters,
            bench,
            captain_pool,
            formation,
        })
    }

    pub fn starters(&self) -> &[CanonicalPlayerProjection] {
        &self.starters
    }

    pub fn bench(&self) -> &[CanonicalPlayerProjection] {
        &self.bench
    }

    pub fn captain_pool(&self) -> &[u32] {
        &self.captain_pool
    }

    pub fn formation(&self) -> &str {
        &self.formation
    }

    /// Always true for a constructed value; legality is a construction
    /// precondition, not a post-hoc flag.
    pub fn formation_valid(&self) -> bool {
        true
    }
}
