//! Audit trail for administrative acts.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duel::{DuelId, ParticipantId, ScorePair};
use crate::error::{DuelError, DuelResult};

/// What the administrator did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminAction {
    ForceValidate {
        score: ScorePair,
        /// Whether the duel was already validated (a score correction).
        correction: bool,
    },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub duel_id: DuelId,
    pub admin_id: ParticipantId,
    pub action: AdminAction,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(duel_id: DuelId, admin_id: ParticipantId, action: AdminAction, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            duel_id,
            admin_id,
            action,
            reason: reason.to_string(),
            at: Utc::now(),
        }
    }
}

/// Append-only audit log.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn record(&self, entry: AuditEntry) -> DuelResult<()> {
        self.entries
            .write()
            .map_err(|_| DuelError::Storage("audit log lock poisoned".into()))?
            .push(entry);
        Ok(())
    }

    pub fn entries(&self) -> DuelResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| DuelError::Storage("audit log lock poisoned".into()))?
            .clone())
    }

    pub fn for_duel(&self, duel_id: DuelId) -> DuelResult<Vec<AuditEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.duel_id == duel_id)
            .collect())
    }
}
