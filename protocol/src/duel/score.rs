//! Score validation shared by participant submissions and admin overrides.

use serde::{Deserialize, Serialize};

use crate::error::{DuelError, DuelResult};

use super::state::Role;

/// Lowest legal touch count.
pub const MIN_SCORE: i64 = 0;
/// Highest legal touch count.
pub const MAX_SCORE: i64 = 50;

pub const FIELD_SCORE_PROVOCATEUR: &str = "scoreProvocateur";
pub const FIELD_SCORE_ADVERSAIRE: &str = "scoreAdversaire";

/// Whether equal scores are acceptable for a given submission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPolicy {
    Forbidden,
    Allowed,
}

/// A validated pair of scores, in `[MIN_SCORE, MAX_SCORE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePair {
    pub score_provocateur: u8,
    pub score_adversaire: u8,
}

impl ScorePair {
    /// Side with the strictly higher score, `None` on a draw.
    pub fn leader(&self) -> Option<Role> {
        match self.score_provocateur.cmp(&self.score_adversaire) {
            std::cmp::Ordering::Greater => Some(Role::Provocateur),
            std::cmp::Ordering::Less => Some(Role::Adversaire),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn is_draw(&self) -> bool {
        self.score_provocateur == self.score_adversaire
    }
}

impl std::fmt::Display for ScorePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.score_provocateur, self.score_adversaire)
    }
}

fn check_range(field: &str, value: i64) -> DuelResult<u8> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        return Err(DuelError::validation(
            field,
            format!("{} is outside [{}, {}]", value, MIN_SCORE, MAX_SCORE),
        ));
    }
    u8::try_from(value).map_err(|_| DuelError::validation(field, "not representable"))
}

/// Validate a candidate score pair.
///
/// Both submission paths call this; only the draw policy differs.
pub fn validate_scores(
    score_provocateur: i64,
    score_adversaire: i64,
    draws: DrawPolicy,
) -> DuelResult<ScorePair> {
    let score_provocateur = check_range(FIELD_SCORE_PROVOCATEUR, score_provocateur)?;
    let score_adversaire = check_range(FIELD_SCORE_ADVERSAIRE, score_adversaire)?;

    if draws == DrawPolicy::Forbidden && score_provocateur == score_adversaire {
        return Err(DuelError::validation(
            FIELD_SCORE_ADVERSAIRE,
            format!("scores must differ (got {} twice)", score_adversaire),
        ));
    }

    Ok(ScorePair {
        score_provocateur,
        score_adversaire,
    })
}

/// Parse a textual score, rejecting anything that is not an integer.
pub fn parse_score(field: &str, raw: &str) -> DuelResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| DuelError::validation(field, format!("'{}' is not an integer", raw.trim())))
}

/// Extract a score from a JSON value. `15.0`, `"15"` and `null` are rejected.
pub fn score_from_json(field: &str, value: &serde_json::Value) -> DuelResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| DuelError::validation(field, format!("{} is not an integer", value)))
}
