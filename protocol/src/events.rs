//! Duel events
//!
//! Every committed change is published on a Tokio broadcast channel. The
//! notification collaborator subscribes here; with no subscriber, events
//! are dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::duel::{DuelId, DuelState, ParticipantId, ScorePair};

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DuelEvent {
    Created {
        duel_id: DuelId,
        provocateur_id: ParticipantId,
        adversaire_id: ParticipantId,
        timestamp: DateTime<Utc>,
    },
    /// Accept, refuse, cancel or schedule.
    StateChanged {
        duel_id: DuelId,
        from: DuelState,
        to: DuelState,
        actor: Option<ParticipantId>,
        timestamp: DateTime<Utc>,
    },
    ScoreProposed {
        duel_id: DuelId,
        propose_par: ParticipantId,
        score: ScorePair,
        round: u32,
        timestamp: DateTime<Utc>,
    },
    Escalated {
        duel_id: DuelId,
        counter_proposals: u32,
        timestamp: DateTime<Utc>,
    },
    Validated {
        duel_id: DuelId,
        score: ScorePair,
        vainqueur_id: Option<ParticipantId>,
        /// Set when an administrator forced the result.
        forced_by: Option<ParticipantId>,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        duel_id: DuelId,
        admin_id: ParticipantId,
        timestamp: DateTime<Utc>,
    },
}

impl DuelEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::StateChanged { .. } => "state_changed",
            Self::ScoreProposed { .. } => "score_proposed",
            Self::Escalated { .. } => "escalated",
            Self::Validated { .. } => "validated",
            Self::Deleted { .. } => "deleted",
        }
    }

    pub fn duel_id(&self) -> DuelId {
        match self {
            Self::Created { duel_id, .. }
            | Self::StateChanged { duel_id, .. }
            | Self::ScoreProposed { duel_id, .. }
            | Self::Escalated { duel_id, .. }
            | Self::Validated { duel_id, .. }
            | Self::Deleted { duel_id, .. } => *duel_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Created { timestamp, .. }
            | Self::StateChanged { timestamp, .. }
            | Self::ScoreProposed { timestamp, .. }
            | Self::Escalated { timestamp, .. }
            | Self::Validated { timestamp, .. }
            | Self::Deleted { timestamp, .. } => *timestamp,
        }
    }
}

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<DuelEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish to all subscribers. Never fails; a missing audience is fine.
    pub fn publish(&self, event: DuelEvent) {
        let event_type = event.event_type();
        let duel_id = event.duel_id();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event_type, duel_id, receivers, "Event published"),
            Err(_) => debug!(event_type, duel_id, "Event published (no receivers)"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DuelEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
