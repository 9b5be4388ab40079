//! The duel record and its lifecycle graph.
//!
//! ```text
//! PROPOSE ──accept──▶ ACCEPTE ──schedule──▶ A_JOUER ──submit──▶ PROPOSE_SCORE ◀─┐
//!    │                  │                                        │  │  └─counter─┘
//!    ├─refuse─▶ REFUSE  │                                        │  └─stall─▶ EN_ATTENTE_VALIDATION
//!    └─cancel─▶ ANNULE ◀┘                                        └─accept─▶ VALIDE
//!
//! admin: any state ──force──▶ VALIDE, any state ──delete──▶ (removed)
//! ```

pub mod invariants;
pub mod score;
pub mod state;

pub use invariants::{check_invariants, policy_warnings};
pub use score::{parse_score, score_from_json, validate_scores, DrawPolicy, ScorePair};
pub use state::{Duel, DuelId, DuelState, DuelTransition, ParticipantId, Role};
