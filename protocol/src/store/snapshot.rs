//! Ledger snapshots: checkpoint and restore of the whole duel ledger.
//!
//! A snapshot carries every live duel, the id counter and the audit log.
//! Restores are validated against the duel invariants; a corrupted
//! snapshot is refused rather than loaded.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DuelStore, InMemoryDuelStore};
use crate::audit::{AuditEntry, AuditLog};
use crate::duel::{check_invariants, policy_warnings, DrawPolicy, Duel, DuelId};
use crate::error::{DuelError, DuelResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub next_id: DuelId,
    pub duels: Vec<Duel>,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
    pub taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn empty() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            next_id: 1,
            duels: Vec::new(),
            audit: Vec::new(),
            taken_at: Utc::now(),
        }
    }

    pub fn capture(store: &dyn DuelStore, audit: &AuditLog) -> DuelResult<Self> {
        Ok(Self {
            version: Self::CURRENT_VERSION,
            next_id: store.peek_next_id(),
            duels: store.list()?,
            audit: audit.entries()?,
            taken_at: Utc::now(),
        })
    }

    pub fn to_json(&self) -> DuelResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DuelError::Storage(format!("serialize failed: {}", e)))
    }

    pub fn from_json(json: &str) -> DuelResult<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| DuelError::Storage(format!("deserialize failed: {}", e)))?;

        if snapshot.version > Self::CURRENT_VERSION {
            return Err(DuelError::Storage(format!(
                "version mismatch: expected {}, found {}",
                Self::CURRENT_VERSION,
                snapshot.version
            )));
        }

        Ok(snapshot)
    }

    /// Parse and validate; corrupted snapshots are rejected.
    pub fn restore(json: &str, draws: DrawPolicy) -> DuelResult<(Self, IntegrityStatus)> {
        let snapshot = Self::from_json(json)?;
        let status = validate_snapshot(&snapshot, draws);

        match &status {
            IntegrityStatus::Corrupted { errors } => {
                return Err(DuelError::Storage(format!(
                    "integrity check failed: {}",
                    errors.join("; ")
                )))
            }
            IntegrityStatus::Recoverable { warnings } => {
                for warning in warnings {
                    warn!(warning = %warning, "Snapshot restored with warning");
                }
            }
            IntegrityStatus::Valid => {}
        }

        Ok((snapshot, status))
    }

    /// Read a snapshot file; a missing file is an empty ledger.
    pub fn load(path: &Path, draws: DrawPolicy) -> DuelResult<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No snapshot yet, starting empty ledger");
                return Ok(Self::empty());
            }
            Err(e) => {
                return Err(DuelError::Storage(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self::restore(&json, draws)?.0)
    }

    /// Write through a uniquely named temp file in the same directory, then
    /// rename over `path`.
    pub fn save(&self, path: &Path) -> DuelResult<()> {
        let json = self.to_json()?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let storage =
            |e: std::io::Error| DuelError::Storage(format!("writing {}: {}", path.display(), e));

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(storage)?;
        temp.write_all(json.as_bytes()).map_err(storage)?;
        temp.persist(path).map_err(|e| storage(e.error))?;
        info!(path = %path.display(), duels = self.duels.len(), "Snapshot saved");
        Ok(())
    }

    /// Rebuild the store and audit log.
    pub fn into_parts(self) -> (InMemoryDuelStore, AuditLog) {
        (
            InMemoryDuelStore::from_duels(self.duels, self.next_id),
            AuditLog::from_entries(self.audit),
        )
    }
}

/// Integrity check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
    Valid,
    /// Loadable; each warning is logged on restore.
    Recoverable { warnings: Vec<String> },
    Corrupted { errors: Vec<String> },
}

impl IntegrityStatus {
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Valid | Self::Recoverable { .. })
    }
}

pub fn validate_snapshot(snapshot: &LedgerSnapshot, draws: DrawPolicy) -> IntegrityStatus {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if snapshot.version > LedgerSnapshot::CURRENT_VERSION {
        errors.push(format!(
            "version {} > current {}",
            snapshot.version,
            LedgerSnapshot::CURRENT_VERSION
        ));
    }

    let mut seen = HashSet::new();
    for duel in &snapshot.duels {
        if !seen.insert(duel.id) {
            errors.push(format!("duplicate duel id {}", duel.id));
        }
        for violation in check_invariants(duel) {
            errors.push(format!("duel {}: {}", duel.id, violation));
        }
        for warning in policy_warnings(duel, draws) {
            warnings.push(format!("duel {}: {}", duel.id, warning));
        }
    }

    if let Some(max_id) = snapshot.duels.iter().map(|d| d.id).max() {
        if snapshot.next_id <= max_id {
            warnings.push(format!(
                "next_id {} not above highest duel id {}",
                snapshot.next_id, max_id
            ));
        }
    }

    if !errors.is_empty() {
        IntegrityStatus::Corrupted { errors }
    } else if !warnings.is_empty() {
        IntegrityStatus::Recoverable { warnings }
    } else {
        IntegrityStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duel::DuelState;

    fn snapshot_with(duels: Vec<Duel>, next_id: DuelId) -> LedgerSnapshot {
        LedgerSnapshot {
            next_id,
            duels,
            ..LedgerSnapshot::empty()
        }
    }

    #[test]
    fn test_capture_roundtrip() {
        let store = InMemoryDuelStore::new();
        let id = store.allocate_id();
        store.insert(Duel::new(id, 1, 2, None, None)).unwrap();
        let audit = AuditLog::new();

        let snap = LedgerSnapshot::capture(&store, &audit).unwrap();
        let restored = LedgerSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(restored.next_id, 2);
        assert_eq!(restored.duels.len(), 1);
    }

    #[test]
    fn test_future_version_rejected() {
        let mut value = serde_json::to_value(LedgerSnapshot::empty()).unwrap();
        value["version"] = serde_json::json!(999);
        let err = LedgerSnapshot::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_bad_json() {
        let err = LedgerSnapshot::from_json("not json").unwrap_err();
        assert!(err.to_string().contains("deserialize"));
    }

    #[test]
    fn test_valid_snapshot() {
        let snap = snapshot_with(vec![Duel::new(1, 1, 2, None, None)], 2);
        assert_eq!(
            validate_snapshot(&snap, DrawPolicy::Forbidden),
            IntegrityStatus::Valid
        );
    }

    #[test]
    fn test_stale_counter_is_recoverable() {
        let snap = snapshot_with(vec![Duel::new(5, 1, 2, None, None)], 3);
        let status = validate_snapshot(&snap, DrawPolicy::Forbidden);
        assert!(matches!(status, IntegrityStatus::Recoverable { .. }));
        assert!(status.can_resume());

        let (store, _) = snap.into_parts();
        assert_eq!(store.peek_next_id(), 6);
    }

    #[test]
    fn test_corrupted_duel_refused() {
        let mut duel = Duel::new(1, 1, 2, None, None);
        duel.etat = DuelState::Valide;
        let snap = snapshot_with(vec![duel], 2);
        let status = validate_snapshot(&snap, DrawPolicy::Forbidden);
        assert!(!status.can_resume());

        let err = LedgerSnapshot::restore(&snap.to_json().unwrap(), DrawPolicy::Forbidden)
            .unwrap_err();
        assert!(err.to_string().contains("integrity"));
    }

    #[test]
    fn test_duplicate_ids_corrupted() {
        let snap = snapshot_with(
            vec![Duel::new(1, 1, 2, None, None), Duel::new(1, 3, 4, None, None)],
            2,
        );
        assert!(matches!(
            validate_snapshot(&snap, DrawPolicy::Forbidden),
            IntegrityStatus::Corrupted { .. }
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let snap = snapshot_with(vec![Duel::new(1, 1, 2, None, None)], 2);
        snap.save(&path).unwrap();

        let loaded = LedgerSnapshot::load(&path, DrawPolicy::Forbidden).unwrap();
        assert_eq!(loaded.duels[0].id, 1);

        snap.save(&path).unwrap();
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("ledger.json")]);
    }

    #[test]
    fn test_disabled_draw_policy_is_recoverable() {
        let mut duel = Duel::new(1, 1, 2, None, None);
        duel.force_validate(
            crate::duel::validate_scores(7, 7, DrawPolicy::Allowed).unwrap(),
            99,
            "double touch",
        );
        let snap = snapshot_with(vec![duel], 2);

        assert_eq!(
            validate_snapshot(&snap, DrawPolicy::Allowed),
            IntegrityStatus::Valid
        );
        let status = validate_snapshot(&snap, DrawPolicy::Forbidden);
        assert!(matches!(status, IntegrityStatus::Recoverable { .. }));

        let (restored, _) =
            LedgerSnapshot::restore(&snap.to_json().unwrap(), DrawPolicy::Forbidden).unwrap();
        assert_eq!(restored.duels[0].vainqueur_id, None);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded =
            LedgerSnapshot::load(&dir.path().join("none.json"), DrawPolicy::Forbidden).unwrap();
        assert!(loaded.duels.is_empty());
        assert_eq!(loaded.next_id, 1);
    }
}
