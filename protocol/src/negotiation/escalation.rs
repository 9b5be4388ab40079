//! Stall detection for score negotiation.
//!
//! A counter-proposal is a submission whose author differs from the
//! previous one. Once the configured number of counter-proposals is reached
//! the duel leaves `PROPOSE_SCORE` for `EN_ATTENTE_VALIDATION`, where only
//! an administrator can settle it.

use serde::{Deserialize, Serialize};

use super::proposition::Proposition;

/// Outcome of evaluating a negotiation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationOutcome {
    /// Keep waiting for an acceptance.
    Continue,
    /// Hand over to an administrator.
    Escalate { counter_proposals: u32 },
}

impl NegotiationOutcome {
    pub fn should_escalate(&self) -> bool {
        matches!(self, Self::Escalate { .. })
    }
}

impl std::fmt::Display for NegotiationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Escalate { counter_proposals } => {
                write!(f, "escalate ({} counter-proposals)", counter_proposals)
            }
        }
    }
}

/// When a disagreement becomes an administrative matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Counter-proposals tolerated before escalating. `None` never escalates.
    #[serde(default)]
    pub max_counter_proposals: Option<u32>,
}

impl EscalationPolicy {
    pub fn after(max_counter_proposals: u32) -> Self {
        Self {
            max_counter_proposals: Some(max_counter_proposals),
        }
    }

    pub fn evaluate(&self, history: &[Proposition]) -> NegotiationOutcome {
        let Some(limit) = self.max_counter_proposals else {
            return NegotiationOutcome::Continue;
        };

        let counter_proposals = count_counter_proposals(history);
        if limit > 0 && counter_proposals >= limit {
            NegotiationOutcome::Escalate { counter_proposals }
        } else {
            NegotiationOutcome::Continue
        }
    }
}

/// Number of submissions that flipped the author.
pub fn count_counter_proposals(history: &[Proposition]) -> u32 {
    history
        .windows(2)
        .filter(|w| w[0].propose_par != w[1].propose_par)
        .count()
        .try_into()
        .unwrap_or(u32::MAX)
}
