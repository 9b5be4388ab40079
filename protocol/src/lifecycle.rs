//! Duel lifecycle: proposal, answer, cancellation, scheduling and reads.
//!
//! Every mutation runs as one read-modify-write on a single duel id through
//! the store, so a rejected call leaves the record untouched and calls on
//! the same id are linearized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProtocolConfig;
use crate::duel::{Duel, DuelId, DuelState, ParticipantId};
use crate::error::{DuelError, DuelResult};
use crate::events::{DuelEvent, SharedEventBus};
use crate::principal::{Principal, Request};
use crate::roster::{Fencer, SharedRoster};
use crate::store::SharedDuelStore;

/// The adversaire's answer to a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accept,
    Refuse,
}

impl std::str::FromStr for Decision {
    type Err = DuelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Ok(Self::Accept),
            "REFUSE" => Ok(Self::Refuse),
            other => Err(DuelError::validation(
                "decision",
                format!("expected ACCEPT or REFUSE, got '{}'", other),
            )),
        }
    }
}

/// Dashboard list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuelFilter {
    /// Keep only these states; empty keeps all.
    pub states: Vec<DuelState>,
    /// Keep only duels blocked on the caller.
    pub awaiting_me: bool,
    /// Admins only: restrict to this participant instead of listing everything.
    pub participant: Option<ParticipantId>,
}

impl DuelFilter {
    pub fn with_states(mut self, states: &[DuelState]) -> Self {
        self.states = states.to_vec();
        self
    }

    pub fn awaiting_me(mut self) -> Self {
        self.awaiting_me = true;
        self
    }
}

/// A duel with both participants resolved through the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelView {
    #[serde(flatten)]
    pub duel: Duel,
    pub provocateur: Option<Fencer>,
    pub adversaire: Option<Fencer>,
}

pub(crate) fn ensure_participant(duel: &Duel, caller: ParticipantId) -> DuelResult<()> {
    if duel.is_participant(caller) {
        Ok(())
    } else {
        Err(DuelError::permission(
            caller,
            format!("not a participant of duel {}", duel.id),
        ))
    }
}

fn ensure_reader(duel: &Duel, caller: &Principal) -> DuelResult<()> {
    if caller.is_admin {
        Ok(())
    } else {
        ensure_participant(duel, caller.id)
    }
}

/// State machine over a duel's `etat`.
#[derive(Clone)]
pub struct DuelLifecycle {
    store: SharedDuelStore,
    roster: SharedRoster,
    bus: SharedEventBus,
    config: ProtocolConfig,
}

impl DuelLifecycle {
    pub fn new(
        store: SharedDuelStore,
        roster: SharedRoster,
        bus: SharedEventBus,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            store,
            roster,
            bus,
            config,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedDuelStore {
        &self.store
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    /// Run `apply` as one transaction on `duel_id` and publish the
    /// transitions it committed.
    pub(crate) fn mutate(
        &self,
        duel_id: DuelId,
        apply: &mut dyn FnMut(&mut Duel) -> DuelResult<()>,
    ) -> DuelResult<Duel> {
        let mut before = 0;
        let duel = self.store.update(duel_id, &mut |duel| {
            before = duel.transitions.len();
            apply(duel)
        })?;

        for t in &duel.transitions[before..] {
            info!(
                duel_id,
                actor = ?t.actor,
                from = %t.from,
                to = %t.to,
                reason = %t.reason,
                "Duel transition committed"
            );
            // Score states are published by the negotiation engine.
            if matches!(
                t.to,
                DuelState::Accepte | DuelState::AJouer | DuelState::Refuse | DuelState::Annule
            ) {
                self.bus.publish(DuelEvent::StateChanged {
                    duel_id,
                    from: t.from,
                    to: t.to,
                    actor: t.actor,
                    timestamp: t.at,
                });
            }
        }
        debug!(status = %duel.status_line(), "Duel committed");
        Ok(duel)
    }

    fn resolve(&self, field: &str, id: ParticipantId) -> DuelResult<Fencer> {
        self.roster
            .resolve(id)
            .ok_or_else(|| DuelError::validation(field, format!("unknown participant {}", id)))
    }

    /// `CreateDuel`: issue a challenge.
    pub fn create(
        &self,
        caller: &Principal,
        provocateur_id: ParticipantId,
        adversaire_id: ParticipantId,
        notes: Option<String>,
        date_programmee: Option<DateTime<Utc>>,
    ) -> DuelResult<Duel> {
        if provocateur_id == adversaire_id {
            return Err(DuelError::validation(
                "adversaireId",
                "a fencer cannot challenge themselves",
            ));
        }
        if caller.id != provocateur_id && !caller.is_admin {
            return Err(DuelError::permission(
                caller.id,
                "only the provocateur can issue a challenge",
            ));
        }
        self.resolve("provocateurId", provocateur_id)?;
        self.resolve("adversaireId", adversaire_id)?;

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let duel = Duel::new(
            self.store.allocate_id(),
            provocateur_id,
            adversaire_id,
            notes,
            date_programmee,
        );
        self.store.insert(duel.clone())?;

        info!(
            duel_id = duel.id,
            provocateur_id, adversaire_id, "Duel proposed"
        );
        self.bus.publish(DuelEvent::Created {
            duel_id: duel.id,
            provocateur_id,
            adversaire_id,
            timestamp: duel.date_proposition,
        });
        Ok(duel)
    }

    /// `RespondToProposal`: the adversaire accepts or refuses.
    pub fn respond<'a>(
        &self,
        duel_id: DuelId,
        request: impl Into<Request<'a>>,
        decision: Decision,
    ) -> DuelResult<Duel> {
        let request = request.into();
        let caller = request.caller();
        let auto_schedule = self.config.auto_schedule;

        self.mutate(duel_id, &mut |duel| {
            if caller != duel.adversaire_id {
                return Err(DuelError::permission(
                    caller,
                    "only the adversaire can answer a challenge",
                ));
            }
            request.check_source(duel, &[DuelState::Propose])?;

            match decision {
                Decision::Refuse => duel.transition(
                    &[DuelState::Propose],
                    DuelState::Refuse,
                    Some(caller),
                    "challenge refused",
                ),
                Decision::Accept => {
                    duel.transition(
                        &[DuelState::Propose],
                        DuelState::Accepte,
                        Some(caller),
                        "challenge accepted",
                    )?;
                    if auto_schedule {
                        duel.transition(
                            &[DuelState::Accepte],
                            DuelState::AJouer,
                            None,
                            "scheduling acknowledged",
                        )?;
                    }
                    Ok(())
                }
            }
        })
    }

    /// `CancelDuel`: either participant withdraws before the bout is scheduled.
    pub fn cancel<'a>(&self, duel_id: DuelId, request: impl Into<Request<'a>>) -> DuelResult<Duel> {
        let request = request.into();
        let caller = request.caller();
        let from = [DuelState::Propose, DuelState::Accepte];

        self.mutate(duel_id, &mut |duel| {
            ensure_participant(duel, caller)?;
            request.check_source(duel, &from)?;
            duel.transition(&from, DuelState::Annule, Some(caller), "cancelled")
        })
    }

    /// System-internal `ACCEPTE → A_JOUER`, for when acceptance does not
    /// schedule by itself.
    pub fn schedule(&self, duel_id: DuelId) -> DuelResult<Duel> {
        self.mutate(duel_id, &mut |duel| {
            duel.transition(
                &[DuelState::Accepte],
                DuelState::AJouer,
                None,
                "scheduling acknowledged",
            )
        })
    }

    /// `GetDuel`: participants and administrators only.
    pub fn get(&self, duel_id: DuelId, caller: &Principal) -> DuelResult<Duel> {
        let duel = self
            .store
            .get(duel_id)?
            .ok_or_else(|| DuelError::not_found(duel_id))?;
        ensure_reader(&duel, caller)?;
        Ok(duel)
    }

    pub fn view(&self, duel_id: DuelId, caller: &Principal) -> DuelResult<DuelView> {
        let duel = self.get(duel_id, caller)?;
        Ok(self.describe(duel))
    }

    pub fn describe(&self, duel: Duel) -> DuelView {
        DuelView {
            provocateur: self.roster.resolve(duel.provocateur_id),
            adversaire: self.roster.resolve(duel.adversaire_id),
            duel,
        }
    }

    /// `ListDuels`: the caller's duels, or any duel for an administrator.
    pub fn list(&self, caller: &Principal, filter: &DuelFilter) -> DuelResult<Vec<Duel>> {
        let subject = match (caller.is_admin, filter.participant) {
            (true, participant) => participant,
            (false, Some(other)) if other != caller.id => {
                return Err(DuelError::permission(
                    caller.id,
                    "only administrators can list another fencer's duels",
                ))
            }
            (false, _) => Some(caller.id),
        };

        let duels: Vec<Duel> = self
            .store
            .list()?
            .into_iter()
            .filter(|d| subject.map_or(true, |id| d.is_participant(id)))
            .filter(|d| filter.states.is_empty() || filter.states.contains(&d.etat))
            .filter(|d| !filter.awaiting_me || d.awaits_action_from(subject.unwrap_or(caller.id)))
            .collect();

        debug!(caller = caller.id, count = duels.len(), "Duels listed");
        Ok(duels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::EventBus;
    use crate::roster::StaticRoster;
    use crate::store::InMemoryDuelStore;
    use std::sync::Arc;

    fn lifecycle_with(config: ProtocolConfig) -> DuelLifecycle {
        let roster = StaticRoster::new()
            .with_member(1, "Athos")
            .with_member(2, "Porthos")
            .with_member(3, "Aramis");
        DuelLifecycle::new(
            Arc::new(InMemoryDuelStore::new()),
            roster.shared(),
            EventBus::new().shared(),
            config,
        )
    }

    fn lifecycle() -> DuelLifecycle {
        lifecycle_with(ProtocolConfig::default())
    }

    fn p(id: ParticipantId) -> Principal {
        Principal::participant(id)
    }

    #[test]
    fn test_create() {
        let lc = lifecycle();
        let duel = lc
            .create(&p(1), 1, 2, Some("  à toi  ".into()), None)
            .unwrap();
        assert_eq!(duel.etat, DuelState::Propose);
        assert_eq!(duel.notes.as_deref(), Some("à toi"));
        assert_eq!(lc.get(duel.id, &p(2)).unwrap(), duel);
    }

    #[test]
    fn test_create_blank_notes_dropped() {
        let duel = lifecycle().create(&p(1), 1, 2, Some("   ".into()), None).unwrap();
        assert!(duel.notes.is_none());
    }

    #[test]
    fn test_create_rejects_self_challenge() {
        let err = lifecycle().create(&p(1), 1, 1, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_create_rejects_unknown_participant() {
        let err = lifecycle().create(&p(1), 1, 42, None, None).unwrap_err();
        assert!(matches!(err, DuelError::Validation { ref field, .. } if field == "adversaireId"));
    }

    #[test]
    fn test_create_on_behalf_of_someone_else() {
        let lc = lifecycle();
        let err = lc.create(&p(3), 1, 2, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(lc.create(&Principal::admin(99), 1, 2, None, None).is_ok());
    }

    #[test]
    fn test_accept_schedules() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        let duel = lc.respond(duel.id, &p(2), Decision::Accept).unwrap();
        assert_eq!(duel.etat, DuelState::AJouer);
        let path: Vec<_> = duel.transitions.iter().map(|t| t.to).collect();
        assert_eq!(path, vec![DuelState::Accepte, DuelState::AJouer]);
    }

    #[test]
    fn test_accept_without_auto_schedule() {
        let lc = lifecycle_with(ProtocolConfig {
            auto_schedule: false,
            ..Default::default()
        });
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        let duel = lc.respond(duel.id, &p(2), Decision::Accept).unwrap();
        assert_eq!(duel.etat, DuelState::Accepte);

        let duel = lc.schedule(duel.id).unwrap();
        assert_eq!(duel.etat, DuelState::AJouer);
        assert_eq!(
            lc.schedule(duel.id).unwrap_err().kind(),
            ErrorKind::StateConflict
        );
    }

    #[test]
    fn test_refuse() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        let duel = lc.respond(duel.id, &p(2), Decision::Refuse).unwrap();
        assert_eq!(duel.etat, DuelState::Refuse);
    }

    #[test]
    fn test_only_adversaire_responds() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        for caller in [1, 3] {
            let err = lc.respond(duel.id, &p(caller), Decision::Accept).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        }
        assert_eq!(lc.get(duel.id, &p(1)).unwrap().etat, DuelState::Propose);
    }

    #[test]
    fn test_second_answer_conflicts() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        lc.respond(duel.id, &p(2), Decision::Refuse).unwrap();
        let err = lc.respond(duel.id, &p(2), Decision::Accept).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_stale_expectation_conflicts() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        let caller = p(2);
        let err = lc
            .respond(
                duel.id,
                Request::new(&caller).expecting(DuelState::Accepte),
                Decision::Accept,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_cancel_by_either_participant() {
        let lc = lifecycle();
        let a = lc.create(&p(1), 1, 2, None, None).unwrap();
        assert_eq!(lc.cancel(a.id, &p(1)).unwrap().etat, DuelState::Annule);

        let b = lc.create(&p(1), 1, 2, None, None).unwrap();
        assert_eq!(lc.cancel(b.id, &p(2)).unwrap().etat, DuelState::Annule);
    }

    #[test]
    fn test_cancel_from_accepte() {
        let lc = lifecycle_with(ProtocolConfig {
            auto_schedule: false,
            ..Default::default()
        });
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        lc.respond(duel.id, &p(2), Decision::Accept).unwrap();
        assert_eq!(lc.cancel(duel.id, &p(1)).unwrap().etat, DuelState::Annule);
    }

    #[test]
    fn test_cancel_after_scheduling_conflicts() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        lc.respond(duel.id, &p(2), Decision::Accept).unwrap();
        let err = lc.cancel(duel.id, &p(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_cancel_by_outsider() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        let err = lc.cancel(duel.id, &p(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_get_access() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        assert!(lc.get(duel.id, &Principal::admin(99)).is_ok());
        assert_eq!(
            lc.get(duel.id, &p(3)).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(lc.get(77, &p(1)).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_view_resolves_names() {
        let lc = lifecycle();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        let view = lc.view(duel.id, &p(1)).unwrap();
        assert_eq!(view.provocateur.unwrap().display_name, "Athos");
        assert_eq!(view.adversaire.unwrap().display_name, "Porthos");
    }

    #[test]
    fn test_list_filters() {
        let lc = lifecycle();
        let a = lc.create(&p(1), 1, 2, None, None).unwrap();
        let b = lc.create(&p(3), 3, 1, None, None).unwrap();
        lc.create(&p(2), 2, 3, None, None).unwrap();
        lc.respond(a.id, &p(2), Decision::Accept).unwrap();

        let mine = lc.list(&p(1), &DuelFilter::default()).unwrap();
        assert_eq!(mine.len(), 2);

        let awaiting = lc.list(&p(1), &DuelFilter::default().awaiting_me()).unwrap();
        let ids: Vec<_> = awaiting.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        let proposed = lc
            .list(&p(1), &DuelFilter::default().with_states(&[DuelState::Propose]))
            .unwrap();
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].id, b.id);

        let all = lc.list(&Principal::admin(99), &DuelFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_list_other_fencer_requires_admin() {
        let lc = lifecycle();
        let filter = DuelFilter {
            participant: Some(2),
            ..Default::default()
        };
        assert_eq!(
            lc.list(&p(1), &filter).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
        assert!(lc.list(&Principal::admin(99), &filter).is_ok());
    }

    #[test]
    fn test_transitions_are_published() {
        let lc = lifecycle();
        let mut rx = lc.bus().subscribe();
        let duel = lc.create(&p(1), 1, 2, None, None).unwrap();
        lc.respond(duel.id, &p(2), Decision::Accept).unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type())
            .collect();
        assert_eq!(kinds, vec!["created", "state_changed", "state_changed"]);
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!("accept".parse::<Decision>().unwrap(), Decision::Accept);
        assert_eq!("REFUSE".parse::<Decision>().unwrap(), Decision::Refuse);
        assert!("maybe".parse::<Decision>().is_err());
    }
}
