//! Caller identity passed explicitly into every operation.

use serde::{Deserialize, Serialize};

use crate::duel::{Duel, DuelState, ParticipantId};
use crate::error::{DuelError, DuelResult};

/// A verified caller, as produced by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: ParticipantId,
    #[serde(default)]
    pub is_admin: bool,
}

impl Principal {
    pub fn participant(id: ParticipantId) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: ParticipantId) -> Self {
        Self { id, is_admin: true }
    }

    pub fn require_admin(&self) -> DuelResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(DuelError::permission(
                self.id,
                "administrator capability required",
            ))
        }
    }
}

/// A participant request: who is calling, and optionally which state they
/// believe the duel is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub principal: &'a Principal,
    pub expected: Option<DuelState>,
}

impl<'a> Request<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self {
            principal,
            expected: None,
        }
    }

    /// Reject with `StateConflict` unless the duel is currently `state`.
    pub fn expecting(mut self, state: DuelState) -> Self {
        self.expected = Some(state);
        self
    }

    pub fn caller(&self) -> ParticipantId {
        self.principal.id
    }

    /// Check `duel` is in one of `allowed` and, if the caller stated an
    /// expectation, in exactly that state.
    pub(crate) fn check_source(&self, duel: &Duel, allowed: &[DuelState]) -> DuelResult<()> {
        duel.require_state(allowed)?;
        match self.expected {
            Some(expected) if expected != duel.etat => {
                Err(DuelError::conflict(duel.id, &[expected], duel.etat))
            }
            _ => Ok(()),
        }
    }
}

impl<'a> From<&'a Principal> for Request<'a> {
    fn from(principal: &'a Principal) -> Self {
        Self::new(principal)
    }
}
