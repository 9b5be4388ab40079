//! Duel Protocol Library
//!
//! Challenge lifecycle and score consensus for club fencing duels.
//!
//! # Overview
//!
//! - [`lifecycle::DuelLifecycle`]: challenge, answer, cancellation and scheduling
//! - [`negotiation::ScoreNegotiation`]: score proposals, acceptance, and the
//!   administrator overrides (forced validation, deletion)
//! - [`store`]: the persistence seam, an in-memory store and JSON snapshots
//! - [`events`]: broadcast of committed changes for notification consumers
//!
//! Identity and the fencer directory are collaborators: callers arrive as a
//! [`principal::Principal`] and participants are resolved through a
//! [`roster::Roster`].
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use duel_protocol::{
//!     AuditLog, Decision, DuelLifecycle, DuelState, EventBus, InMemoryDuelStore, Principal,
//!     ProtocolConfig, ScoreNegotiation, StaticRoster,
//! };
//!
//! let roster = StaticRoster::new().with_member(1, "Athos").with_member(2, "Porthos");
//! let lifecycle = DuelLifecycle::new(
//!     Arc::new(InMemoryDuelStore::new()),
//!     roster.shared(),
//!     EventBus::new().shared(),
//!     ProtocolConfig::default(),
//! );
//! let engine = ScoreNegotiation::new(lifecycle, Arc::new(AuditLog::new()));
//!
//! let athos = Principal::participant(1);
//! let porthos = Principal::participant(2);
//! let duel = engine.lifecycle().create(&athos, 1, 2, None, None)?;
//! engine.lifecycle().respond(duel.id, &porthos, Decision::Accept)?;
//! engine.submit_score(duel.id, &athos, 15, 12)?;
//! let duel = engine.accept_proposition(duel.id, &porthos)?;
//!
//! assert_eq!(duel.etat, DuelState::Valide);
//! assert_eq!(duel.vainqueur_id, Some(1));
//! # Ok::<(), duel_protocol::DuelError>(())
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod audit;
pub mod config;
pub mod duel;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod negotiation;
pub mod principal;
pub mod roster;
pub mod store;

pub use audit::{AdminAction, AuditEntry, AuditLog};
pub use config::ProtocolConfig;
pub use duel::{
    check_invariants, policy_warnings, validate_scores, DrawPolicy, Duel, DuelId, DuelState, DuelTransition,
    ParticipantId, Role, ScorePair,
};
pub use error::{DuelError, DuelResult, ErrorKind, StructuredError};
pub use events::{DuelEvent, EventBus, SharedEventBus};
pub use lifecycle::{Decision, DuelFilter, DuelLifecycle, DuelView};
pub use negotiation::{
    EscalationPolicy, NegotiationOutcome, Proposition, PropositionView, ScoreNegotiation,
};
pub use principal::{Principal, Request};
pub use roster::{Fencer, Roster, SharedRoster, StaticRoster};
pub use store::{
    DuelStore, InMemoryDuelStore, IntegrityStatus, LedgerLock, LedgerSnapshot, SharedDuelStore,
};
