//! Protocol configuration.
//!
//! Defaults reproduce the observed behaviour: unbounded counter-proposals,
//! no draws even under override, acceptance immediately schedules the duel.
//! Values come from TOML, then environment, then explicit overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::duel::DrawPolicy;
use crate::error::{DuelError, DuelResult};
use crate::negotiation::EscalationPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Stall threshold for `PROPOSE_SCORE → EN_ATTENTE_VALIDATION`.
    pub escalation: EscalationPolicy,
    /// Let administrators record an official draw.
    pub allow_admin_draws: bool,
    /// Take `ACCEPTE → A_JOUER` as soon as the challenge is accepted.
    pub auto_schedule: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationPolicy::default(),
            allow_admin_draws: false,
            auto_schedule: true,
        }
    }
}

fn env_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl ProtocolConfig {
    /// Create config from environment variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `DUEL_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(max) = std::env::var("DUEL_MAX_COUNTER_PROPOSALS") {
            if let Ok(n) = max.parse::<u32>() {
                self.escalation.max_counter_proposals = (n > 0).then_some(n);
            }
        }
        if let Ok(val) = std::env::var("DUEL_ALLOW_ADMIN_DRAWS") {
            self.allow_admin_draws = env_flag(&val);
        }
        if let Ok(val) = std::env::var("DUEL_AUTO_SCHEDULE") {
            self.auto_schedule = env_flag(&val);
        }
    }

    pub fn from_toml_str(raw: &str) -> DuelResult<Self> {
        toml::from_str(raw).map_err(|e| DuelError::validation("config", e.to_string()))
    }

    /// Load a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> DuelResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(DuelError::Storage(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Draw policy for administrative overrides. Participants never get draws.
    pub fn admin_draws(&self) -> DrawPolicy {
        if self.allow_admin_draws {
            DrawPolicy::Allowed
        } else {
            DrawPolicy::Forbidden
        }
    }
}
