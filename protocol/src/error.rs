//! Protocol error types
//!
//! Every rejected operation maps to one of four kinds a caller can act on:
//! fix the input, re-read and retry, switch identity, or give up on the id.
//! `Storage` covers failures of the persistence collaborator itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duel::{DuelId, DuelState, ParticipantId};

/// Result type alias for protocol operations
pub type DuelResult<T> = Result<T, DuelError>;

/// Errors returned by lifecycle and negotiation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DuelError {
    /// Malformed input (score shape, participant ids).
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The duel is not in the state the transition requires.
    #[error("State conflict on duel {duel_id}: expected {expected}, found {actual}")]
    StateConflict {
        duel_id: DuelId,
        expected: String,
        actual: DuelState,
    },

    /// The caller may not perform this operation.
    #[error("Permission denied for caller {caller}: {reason}")]
    PermissionDenied {
        caller: ParticipantId,
        reason: String,
    },

    /// No duel (or no outstanding proposal) under this id.
    #[error("Not found: {what} for duel {duel_id}")]
    NotFound { duel_id: DuelId, what: String },

    /// The persistence collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Flat classification of [`DuelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    StateConflict,
    PermissionDenied,
    NotFound,
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::StateConflict => write!(f, "state_conflict"),
            Self::PermissionDenied => write!(f, "permission_denied"),
            Self::NotFound => write!(f, "not_found"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

impl DuelError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn permission(caller: ParticipantId, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            caller,
            reason: reason.into(),
        }
    }

    pub fn not_found(duel_id: DuelId) -> Self {
        Self::NotFound {
            duel_id,
            what: "duel".to_string(),
        }
    }

    /// Conflict against one or more acceptable source states.
    pub fn conflict(duel_id: DuelId, expected: &[DuelState], actual: DuelState) -> Self {
        let expected = expected
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("|");
        Self::StateConflict {
            duel_id,
            expected,
            actual,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::StateConflict { .. } => ErrorKind::StateConflict,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether re-reading the duel and retrying can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }

    /// Render as a structured response for a remote caller.
    pub fn to_structured(&self) -> StructuredError {
        let base = match self {
            Self::Validation { field, .. } => StructuredError::new(
                "VALIDATION_ERROR",
                self.to_string(),
                "Correct the offending field and resubmit",
            )
            .with_context("field", field.clone()),
            Self::StateConflict {
                duel_id,
                expected,
                actual,
            } => StructuredError::new(
                "STATE_CONFLICT",
                self.to_string(),
                "Re-fetch the duel and retry against its current state",
            )
            .with_context("duel_id", *duel_id)
            .with_context("expected", expected.clone())
            .with_context("actual", actual.to_string())
            .retryable(),
            Self::PermissionDenied { caller, .. } => StructuredError::new(
                "PERMISSION_DENIED",
                self.to_string(),
                "Retry with a caller allowed to perform this operation",
            )
            .with_context("caller", *caller),
            Self::NotFound { duel_id, what } => StructuredError::new(
                "NOT_FOUND",
                self.to_string(),
                "Refresh the duel list; the record may have been deleted",
            )
            .with_context("duel_id", *duel_id)
            .with_context("what", what.clone()),
            Self::Storage(_) => StructuredError::new(
                "STORAGE_ERROR",
                self.to_string(),
                "Check the persistence layer before retrying",
            ),
        };
        base.with_context("kind", self.kind().to_string())
    }
}

/// Structured error response with a recovery hint.
///
/// ```json
/// {
///   "code": "STATE_CONFLICT",
///   "message": "State conflict on duel 7: expected A_JOUER|PROPOSE_SCORE, found VALIDE",
///   "recovery_action": "Re-fetch the duel and retry against its current state",
///   "context": { "duel_id": 7, "kind": "state_conflict" },
///   "retryable": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// What the caller should do next
    pub recovery_action: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub retryable: bool,
}

impl StructuredError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
            retryable: false,
        }
    }

    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}
