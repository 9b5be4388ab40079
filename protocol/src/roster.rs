//! Roster lookup: resolves participant ids to club members.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::duel::ParticipantId;

/// A club member as the roster reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fencer {
    pub id: ParticipantId,
    pub display_name: String,
}

/// Read-only membership lookup.
pub trait Roster: Send + Sync {
    fn resolve(&self, id: ParticipantId) -> Option<Fencer>;
}

pub type SharedRoster = Arc<dyn Roster>;

/// Fixed in-memory roster.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    members: HashMap<ParticipantId, Fencer>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, id: ParticipantId, display_name: &str) -> Self {
        self.insert(id, display_name);
        self
    }

    pub fn insert(&mut self, id: ParticipantId, display_name: &str) {
        self.members.insert(
            id,
            Fencer {
                id,
                display_name: display_name.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn shared(self) -> SharedRoster {
        Arc::new(self)
    }
}

impl Roster for StaticRoster {
    fn resolve(&self, id: ParticipantId) -> Option<Fencer> {
        self.members.get(&id).cloned()
    }
}
