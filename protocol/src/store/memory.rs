//! In-memory duel store with per-duel locking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::DuelStore;
use crate::duel::{Duel, DuelId};
use crate::error::{DuelError, DuelResult};

/// A duel slot. `None` once removed, so a writer that grabbed the cell
/// before removal observes the deletion.
type Cell = Arc<Mutex<Option<Duel>>>;

fn poisoned() -> DuelError {
    DuelError::Storage("lock poisoned".to_string())
}

pub struct InMemoryDuelStore {
    cells: RwLock<BTreeMap<DuelId, Cell>>,
    next_id: AtomicU64,
}

impl InMemoryDuelStore {
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Rebuild from a set of duels. The id counter is raised past every
    /// existing id if needed.
    pub fn from_duels(duels: Vec<Duel>, next_id: DuelId) -> Self {
        let max_id = duels.iter().map(|d| d.id).max().unwrap_or(0);
        let cells = duels
            .into_iter()
            .map(|d| (d.id, Arc::new(Mutex::new(Some(d)))))
            .collect();
        Self {
            cells: RwLock::new(cells),
            next_id: AtomicU64::new(next_id.max(max_id + 1)),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn cell(&self, id: DuelId) -> DuelResult<Cell> {
        let cells = self.cells.read().map_err(|_| poisoned())?;
        cells.get(&id).cloned().ok_or_else(|| DuelError::not_found(id))
    }
}

impl Default for InMemoryDuelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DuelStore for InMemoryDuelStore {
    fn allocate_id(&self) -> DuelId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn peek_next_id(&self) -> DuelId {
        self.next_id.load(Ordering::SeqCst)
    }

    fn insert(&self, duel: Duel) -> DuelResult<()> {
        let mut cells = self.cells.write().map_err(|_| poisoned())?;
        if cells.contains_key(&duel.id) {
            return Err(DuelError::Storage(format!("duel {} already exists", duel.id)));
        }
        cells.insert(duel.id, Arc::new(Mutex::new(Some(duel))));
        Ok(())
    }

    fn get(&self, id: DuelId) -> DuelResult<Option<Duel>> {
        let cell = match self.cell(id) {
            Ok(cell) => cell,
            Err(DuelError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let slot = cell.lock().map_err(|_| poisoned())?;
        Ok(slot.clone())
    }

    fn update(
        &self,
        id: DuelId,
        apply: &mut dyn FnMut(&mut Duel) -> DuelResult<()>,
    ) -> DuelResult<Duel> {
        let cell = self.cell(id)?;
        let mut slot = cell.lock().map_err(|_| poisoned())?;
        let current = slot.as_ref().ok_or_else(|| DuelError::not_found(id))?;

        let mut working = current.clone();
        apply(&mut working)?;
        *slot = Some(working.clone());
        Ok(working)
    }

    fn remove(&self, id: DuelId) -> DuelResult<Option<Duel>> {
        let cell = self.cells.write().map_err(|_| poisoned())?.remove(&id);
        match cell {
            Some(cell) => Ok(cell.lock().map_err(|_| poisoned())?.take()),
            None => Ok(None),
        }
    }

    fn list(&self) -> DuelResult<Vec<Duel>> {
        let cells: Vec<Cell> = self
            .cells
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();

        let mut duels = Vec::with_capacity(cells.len());
        for cell in cells {
            if let Some(duel) = cell.lock().map_err(|_| poisoned())?.clone() {
                duels.push(duel);
            }
        }
        Ok(duels)
    }
}
