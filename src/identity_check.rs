use std::collections::HashMap;
use std::fmt;

/// A rendered output block about to leave the core, reduced to the identity
/// facts it asserts. Rows may be partial; only fully-stated claims are
/// checked.
#[derive(Debug, Clone)]
pub struct RenderedSection {
    pub label: String,
    pub rows: Vec<RenderedPlayerRef>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderedPlayerRef {
    pub player_id: Option<u32>,
    pub team: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    TeamMismatch {
        section: String,
        player_id: u32,
        canonical_team: u32,
        rendered_team: u32,
    },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::TeamMismatch {
                section,
                player_id,
                canonical_team,
                rendered_team,
            } => write!(
                f,
                "section {section}: player {player_id} rendered with team {rendered_team}, canonical team is {canonical_team}"
            ),
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Check every rendered player/team claim against the canonical mapping. A
/// mismatch means a join or caching bug upstream and fails the run hard.
/// Rows missing either side of the comparison, or naming a player the
/// canonical map does not know, are skipped without comment: the check
/// exists to catch gross inconsistency, not to police incomplete data.
pub fn verify_sections(
    canonical: &HashMap<u32, u32>,
    sections: &[RenderedSection],
) -> Result<(), IntegrityError> {
    for section in sections {
        for row in &section.rows {
            let (Some(player_id), Some(rendered_team)) = (row.player_id, row.team) else {
                continue;
            };
            let Some(&canonical_team) = canonical.get(&player_id) else {
                continue;
            };
            if canonical_team != rendered_team {
                return Err(IntegrityError::TeamMismatch {
                    section: section.label.clone(),
                    player_id,
                    canonical_team,
                    rendered_team,
                });
            }
        }
    }
    Ok(())
}
