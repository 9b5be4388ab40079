//! Duel persistence
//!
//! The engines only need atomic read-modify-write per duel id. The
//! in-memory store provides that with one lock per duel; the snapshot
//! module checkpoints it to JSON, and [`LedgerLock`] serializes processes
//! sharing a snapshot file.

pub mod lock;
pub mod memory;
pub mod snapshot;

use std::sync::Arc;

use crate::duel::{Duel, DuelId};
use crate::error::DuelResult;

pub use lock::LedgerLock;
pub use memory::InMemoryDuelStore;
pub use snapshot::{validate_snapshot, IntegrityStatus, LedgerSnapshot};

/// Persistence seam used by the lifecycle and negotiation engines.
pub trait DuelStore: Send + Sync {
    /// Reserve a fresh duel id.
    fn allocate_id(&self) -> DuelId;

    /// The id the next `allocate_id` call will return.
    fn peek_next_id(&self) -> DuelId;

    fn insert(&self, duel: Duel) -> DuelResult<()>;

    fn get(&self, id: DuelId) -> DuelResult<Option<Duel>>;

    /// Apply `apply` to a working copy of the duel and commit it only if
    /// `apply` succeeds. Calls on the same id are serialized.
    fn update(
        &self,
        id: DuelId,
        apply: &mut dyn FnMut(&mut Duel) -> DuelResult<()>,
    ) -> DuelResult<Duel>;

    fn remove(&self, id: DuelId) -> DuelResult<Option<Duel>>;

    /// All duels, ordered by id.
    fn list(&self) -> DuelResult<Vec<Duel>>;
}

pub type SharedDuelStore = Arc<dyn DuelStore>;
