//! Score negotiation
//!
//! Once a duel is `A_JOUER`, the two fencers exchange score proposals. The
//! participant who did not author the outstanding proposal may accept it,
//! which validates the duel. Administrators can force a result at any time.

pub mod engine;
pub mod escalation;
pub mod proposition;

pub use engine::ScoreNegotiation;
pub use escalation::{count_counter_proposals, EscalationPolicy, NegotiationOutcome};
pub use proposition::{Proposition, PropositionView};
