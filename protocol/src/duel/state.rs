//! Duel state machine: states, legal edges, and the duel record itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DuelError, DuelResult};
use crate::negotiation::Proposition;

use super::score::ScorePair;

/// Unique duel identifier.
pub type DuelId = u64;

/// Participant (fencer) identifier, as issued by the roster.
pub type ParticipantId = u64;

/// Lifecycle state of a duel (`etat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuelState {
    /// Challenge issued, awaiting the adversaire's answer.
    Propose,
    /// Challenge accepted.
    Accepte,
    /// Scheduled, awaiting a result.
    AJouer,
    /// A score proposal awaits the other participant.
    ProposeScore,
    /// Negotiation stalled; only an administrator can settle it.
    EnAttenteValidation,
    /// Result agreed or forced.
    Valide,
    /// Challenge refused by the adversaire.
    Refuse,
    /// Challenge withdrawn by a participant.
    Annule,
}

impl DuelState {
    pub const ALL: [DuelState; 8] = [
        Self::Propose,
        Self::Accepte,
        Self::AJouer,
        Self::ProposeScore,
        Self::EnAttenteValidation,
        Self::Valide,
        Self::Refuse,
        Self::Annule,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Valide | Self::Refuse | Self::Annule)
    }

    /// Edges reachable by participants or the system.
    ///
    /// The administrative edge to `Valide` is not listed here; it is
    /// available from every state and taken through [`Duel::force_validate`].
    pub fn valid_transitions(self) -> &'static [DuelState] {
        match self {
            Self::Propose => &[Self::Accepte, Self::Refuse, Self::Annule],
            Self::Accepte => &[Self::AJouer, Self::Annule],
            Self::AJouer => &[Self::ProposeScore],
            Self::ProposeScore => &[
                Self::ProposeScore,
                Self::Valide,
                Self::EnAttenteValidation,
            ],
            Self::EnAttenteValidation => &[],
            Self::Valide | Self::Refuse | Self::Annule => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Propose => "PROPOSE",
            Self::Accepte => "ACCEPTE",
            Self::AJouer => "A_JOUER",
            Self::ProposeScore => "PROPOSE_SCORE",
            Self::EnAttenteValidation => "EN_ATTENTE_VALIDATION",
            Self::Valide => "VALIDE",
            Self::Refuse => "REFUSE",
            Self::Annule => "ANNULE",
        }
    }
}

impl std::fmt::Display for DuelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DuelState {
    type Err = DuelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == wanted)
            .ok_or_else(|| DuelError::validation("etat", format!("unknown state '{}'", s)))
    }
}

/// Side of a participant in a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Challenger.
    Provocateur,
    /// Challenged.
    Adversaire,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provocateur => write!(f, "provocateur"),
            Self::Adversaire => write!(f, "adversaire"),
        }
    }
}

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelTransition {
    pub from: DuelState,
    pub to: DuelState,
    pub at: DateTime<Utc>,
    /// Who triggered it; `None` for system-internal edges.
    pub actor: Option<ParticipantId>,
    pub reason: String,
}

/// The duel record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Duel {
    pub id: DuelId,
    pub provocateur_id: ParticipantId,
    pub adversaire_id: ParticipantId,
    pub etat: DuelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub date_proposition: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_programmee: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_validation: Option<DateTime<Utc>>,
    /// Final scores, on the wire as top-level `scoreProvocateur` and
    /// `scoreAdversaire`; both set or both null.
    #[serde(flatten, with = "score_fields")]
    pub score: Option<ScorePair>,
    #[serde(default)]
    pub vainqueur_id: Option<ParticipantId>,
    /// Outstanding proposal, present only in `PROPOSE_SCORE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposition: Option<Proposition>,
    /// Every proposal ever submitted, oldest first.
    #[serde(default)]
    pub negotiation: Vec<Proposition>,
    #[serde(default)]
    pub transitions: Vec<DuelTransition>,
}

mod score_fields {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::duel::score::{ScorePair, FIELD_SCORE_ADVERSAIRE, FIELD_SCORE_PROVOCATEUR};

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Fields {
        #[serde(default)]
        score_provocateur: Option<u8>,
        #[serde(default)]
        score_adversaire: Option<u8>,
    }

    pub fn serialize<S: Serializer>(score: &Option<ScorePair>, s: S) -> Result<S::Ok, S::Error> {
        Fields {
            score_provocateur: score.map(|p| p.score_provocateur),
            score_adversaire: score.map(|p| p.score_adversaire),
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ScorePair>, D::Error> {
        let fields = Fields::deserialize(d)?;
        match (fields.score_provocateur, fields.score_adversaire) {
            (Some(score_provocateur), Some(score_adversaire)) => Ok(Some(ScorePair {
                score_provocateur,
                score_adversaire,
            })),
            (None, None) => Ok(None),
            _ => Err(D::Error::custom(format!(
                "{} and {} must be set together",
                FIELD_SCORE_PROVOCATEUR, FIELD_SCORE_ADVERSAIRE
            ))),
        }
    }
}

impl Duel {
    /// Create a duel in `PROPOSE`.
    pub fn new(
        id: DuelId,
        provocateur_id: ParticipantId,
        adversaire_id: ParticipantId,
        notes: Option<String>,
        date_programmee: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            provocateur_id,
            adversaire_id,
            etat: DuelState::Propose,
            notes,
            date_proposition: Utc::now(),
            date_programmee,
            date_validation: None,
            score: None,
            vainqueur_id: None,
            proposition: None,
            negotiation: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn role_of(&self, id: ParticipantId) -> Option<Role> {
        if id == self.provocateur_id {
            Some(Role::Provocateur)
        } else if id == self.adversaire_id {
            Some(Role::Adversaire)
        } else {
            None
        }
    }

    pub fn is_participant(&self, id: ParticipantId) -> bool {
        self.role_of(id).is_some()
    }

    pub fn participant(&self, role: Role) -> ParticipantId {
        match role {
            Role::Provocateur => self.provocateur_id,
            Role::Adversaire => self.adversaire_id,
        }
    }

    /// Whether the duel is blocked on `id`: an unanswered challenge, or a
    /// score proposal authored by the other side.
    pub fn awaits_action_from(&self, id: ParticipantId) -> bool {
        match self.etat {
            DuelState::Propose => id == self.adversaire_id,
            DuelState::AJouer => self.is_participant(id),
            DuelState::ProposeScore => self
                .proposition
                .as_ref()
                .is_some_and(|p| p.propose_par != id && self.is_participant(id)),
            _ => false,
        }
    }

    /// Check that the current state is one of `from`.
    pub fn require_state(&self, from: &[DuelState]) -> DuelResult<()> {
        if from.contains(&self.etat) {
            Ok(())
        } else {
            Err(DuelError::conflict(self.id, from, self.etat))
        }
    }

    /// Move along a participant/system edge.
    ///
    /// `from` is the set of states the caller believes current; any other
    /// state is a conflict.
    pub fn transition(
        &mut self,
        from: &[DuelState],
        to: DuelState,
        actor: Option<ParticipantId>,
        reason: &str,
    ) -> DuelResult<()> {
        self.require_state(from)?;
        if !self.etat.valid_transitions().contains(&to) {
            return Err(DuelError::conflict(self.id, &[to], self.etat));
        }
        self.record(to, actor, reason);
        Ok(())
    }

    fn record(&mut self, to: DuelState, actor: Option<ParticipantId>, reason: &str) {
        self.transitions.push(DuelTransition {
            from: self.etat,
            to,
            at: Utc::now(),
            actor,
            reason: reason.to_string(),
        });
        self.etat = to;
    }

    /// Adopt a final score and enter `VALIDE`.
    ///
    /// `date_validation` is only stamped the first time.
    fn settle(&mut self, score: ScorePair) {
        self.vainqueur_id = score.leader().map(|role| self.participant(role));
        self.score = Some(score);
        self.proposition = None;
        if self.date_validation.is_none() {
            self.date_validation = Some(Utc::now());
        }
    }

    /// Consensual validation out of `PROPOSE_SCORE`.
    pub fn validate(&mut self, score: ScorePair, actor: ParticipantId) -> DuelResult<()> {
        self.transition(
            &[DuelState::ProposeScore],
            DuelState::Valide,
            Some(actor),
            "proposition accepted",
        )?;
        self.settle(score);
        Ok(())
    }

    /// Administrative edge to `VALIDE` from any state.
    ///
    /// On an already validated duel this corrects the score in place.
    pub fn force_validate(&mut self, score: ScorePair, admin: ParticipantId, reason: &str) {
        self.record(DuelState::Valide, Some(admin), reason);
        self.settle(score);
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        let score = self
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "[{}] duel {} | {} vs {} | score {}",
            self.etat, self.id, self.provocateur_id, self.adversaire_id, score
        )
    }
}
