//! Score proposals and their caller-relative read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duel::{ParticipantId, ScorePair};

/// A score submission awaiting the other participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposition {
    #[serde(flatten)]
    pub score: ScorePair,
    /// Author of this proposal.
    pub propose_par: ParticipantId,
    /// 1 for the first submission, incremented on every later one.
    pub round: u32,
    pub proposed_at: DateTime<Utc>,
}

impl Proposition {
    pub fn new(score: ScorePair, propose_par: ParticipantId, round: u32) -> Self {
        Self {
            score,
            propose_par,
            round,
            proposed_at: Utc::now(),
        }
    }

    /// View of this proposal as seen by `caller`.
    pub fn view_for(&self, caller: ParticipantId) -> PropositionView {
        PropositionView {
            proposition: self.clone(),
            a_propose: self.propose_par == caller,
        }
    }
}

/// What `GetProposition` returns.
///
/// `a_propose` tells the caller whether they are waiting on the other side
/// (`true`) or the other side is waiting on them (`false`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropositionView {
    #[serde(flatten)]
    pub proposition: Proposition,
    pub a_propose: bool,
}
