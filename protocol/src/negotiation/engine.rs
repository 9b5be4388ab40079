//! Score negotiation engine.
//!
//! Participants alternate proposals until the side that did not author the
//! outstanding one accepts it. Administrators bypass the exchange with a
//! forced result, or delete the duel outright.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::escalation::NegotiationOutcome;
use super::proposition::{Proposition, PropositionView};
use crate::audit::{AdminAction, AuditEntry, AuditLog};
use crate::config::ProtocolConfig;
use crate::duel::{validate_scores, DrawPolicy, Duel, DuelId, DuelState};
use crate::error::{DuelError, DuelResult};
use crate::events::{DuelEvent, SharedEventBus};
use crate::lifecycle::{ensure_participant, DuelLifecycle};
use crate::principal::{Principal, Request};
use crate::roster::SharedRoster;
use crate::store::LedgerSnapshot;

const SCORE_SOURCES: [DuelState; 2] = [DuelState::AJouer, DuelState::ProposeScore];

pub struct ScoreNegotiation {
    lifecycle: DuelLifecycle,
    audit: Arc<AuditLog>,
}

impl ScoreNegotiation {
    pub fn new(lifecycle: DuelLifecycle, audit: Arc<AuditLog>) -> Self {
        Self { lifecycle, audit }
    }

    /// Rebuild both engines over a restored ledger.
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        roster: SharedRoster,
        bus: SharedEventBus,
        config: ProtocolConfig,
    ) -> Self {
        let (store, audit) = snapshot.into_parts();
        let lifecycle = DuelLifecycle::new(Arc::new(store), roster, bus, config);
        Self::new(lifecycle, Arc::new(audit))
    }

    pub fn lifecycle(&self) -> &DuelLifecycle {
        &self.lifecycle
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// `SubmitScore`: record a proposal, or a counter-proposal replacing the
    /// outstanding one. Returns the stored proposal.
    pub fn submit_score<'a>(
        &self,
        duel_id: DuelId,
        request: impl Into<Request<'a>>,
        score_provocateur: i64,
        score_adversaire: i64,
    ) -> DuelResult<Proposition> {
        let request = request.into();
        let caller = request.caller();
        let score = validate_scores(score_provocateur, score_adversaire, DrawPolicy::Forbidden)?;
        let policy = self.lifecycle.config().escalation.clone();
        let mut outcome = NegotiationOutcome::Continue;

        let duel = self.lifecycle.mutate(duel_id, &mut |duel| {
            ensure_participant(duel, caller)?;
            request.check_source(duel, &SCORE_SOURCES)?;

            let reason = match &duel.proposition {
                None => "score proposed",
                Some(p) if p.propose_par == caller => "score amended",
                Some(_) => "counter-proposal",
            };
            let round = u32::try_from(duel.negotiation.len())
                .unwrap_or(u32::MAX)
                .saturating_add(1);
            let proposition = Proposition::new(score, caller, round);

            duel.transition(&SCORE_SOURCES, DuelState::ProposeScore, Some(caller), reason)?;
            duel.proposition = Some(proposition.clone());
            duel.negotiation.push(proposition);

            outcome = policy.evaluate(&duel.negotiation);
            if outcome.should_escalate() {
                duel.transition(
                    &[DuelState::ProposeScore],
                    DuelState::EnAttenteValidation,
                    None,
                    "negotiation stalled",
                )?;
                duel.proposition = None;
            }
            Ok(())
        })?;

        let proposition = duel
            .negotiation
            .last()
            .cloned()
            .ok_or_else(|| DuelError::Storage("committed proposal missing".into()))?;

        self.lifecycle.bus().publish(DuelEvent::ScoreProposed {
            duel_id,
            propose_par: caller,
            score,
            round: proposition.round,
            timestamp: proposition.proposed_at,
        });
        if let NegotiationOutcome::Escalate { counter_proposals } = outcome {
            warn!(
                duel_id,
                counter_proposals, "Score negotiation escalated to administrators"
            );
            self.lifecycle.bus().publish(DuelEvent::Escalated {
                duel_id,
                counter_proposals,
                timestamp: Utc::now(),
            });
        }

        Ok(proposition)
    }

    /// `GetProposition`: the outstanding proposal, relative to the caller.
    pub fn get_proposition(
        &self,
        duel_id: DuelId,
        caller: &Principal,
    ) -> DuelResult<PropositionView> {
        let duel = self.lifecycle.get(duel_id, caller)?;
        duel.proposition
            .as_ref()
            .map(|p| p.view_for(caller.id))
            .ok_or_else(|| DuelError::NotFound {
                duel_id,
                what: "outstanding proposition".to_string(),
            })
    }

    /// `AcceptProposition`: the non-author adopts the outstanding proposal.
    pub fn accept_proposition<'a>(
        &self,
        duel_id: DuelId,
        request: impl Into<Request<'a>>,
    ) -> DuelResult<Duel> {
        let request = request.into();
        let caller = request.caller();

        let duel = self.lifecycle.mutate(duel_id, &mut |duel| {
            ensure_participant(duel, caller)?;
            request.check_source(duel, &[DuelState::ProposeScore])?;

            let proposition = duel
                .proposition
                .clone()
                .ok_or_else(|| DuelError::conflict(duel.id, &[DuelState::ProposeScore], duel.etat))?;
            if proposition.propose_par == caller {
                return Err(DuelError::permission(
                    caller,
                    "a proposition must be accepted by the other participant",
                ));
            }
            duel.validate(proposition.score, caller)
        })?;

        self.publish_validated(&duel, None);
        Ok(duel)
    }

    /// `AdminForceValidate`: set the final score regardless of state or
    /// consent. On an already validated duel this is a score correction.
    pub fn force_validate(
        &self,
        duel_id: DuelId,
        admin: &Principal,
        score_provocateur: i64,
        score_adversaire: i64,
        reason: &str,
    ) -> DuelResult<Duel> {
        if let Err(e) = admin.require_admin() {
            warn!(duel_id, caller = admin.id, "Force validation refused");
            return Err(e);
        }
        let draws = self.lifecycle.config().admin_draws();
        let score = validate_scores(score_provocateur, score_adversaire, draws)?;
        let audit = &self.audit;

        let duel = self.lifecycle.mutate(duel_id, &mut |duel| {
            let correction = duel.etat == DuelState::Valide;
            duel.force_validate(score, admin.id, reason);
            audit.record(AuditEntry::new(
                duel.id,
                admin.id,
                AdminAction::ForceValidate { score, correction },
                reason,
            ))
        })?;

        info!(duel_id, admin = admin.id, score = %score, reason, "Duel force-validated");
        self.publish_validated(&duel, Some(admin.id));
        Ok(duel)
    }

    /// `AdminDeleteDuel`: remove the record whatever its state.
    pub fn delete(&self, duel_id: DuelId, admin: &Principal, reason: &str) -> DuelResult<()> {
        if let Err(e) = admin.require_admin() {
            warn!(duel_id, caller = admin.id, "Deletion refused");
            return Err(e);
        }
        let removed = self.lifecycle.store().remove(duel_id)?;
        let duel = removed.ok_or_else(|| DuelError::not_found(duel_id))?;

        self.audit.record(AuditEntry::new(
            duel_id,
            admin.id,
            AdminAction::Delete,
            reason,
        ))?;
        info!(duel_id, admin = admin.id, etat = %duel.etat, reason, "Duel deleted");
        self.lifecycle.bus().publish(DuelEvent::Deleted {
            duel_id,
            admin_id: admin.id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Checkpoint the ledger: every live duel plus the audit trail.
    pub fn snapshot(&self) -> DuelResult<LedgerSnapshot> {
        LedgerSnapshot::capture(self.lifecycle.store().as_ref(), &self.audit)
    }

    fn publish_validated(&self, duel: &Duel, forced_by: Option<u64>) {
        if let Some(score) = duel.score {
            self.lifecycle.bus().publish(DuelEvent::Validated {
                duel_id: duel.id,
                score,
                vainqueur_id: duel.vainqueur_id,
                forced_by,
                timestamp: duel.date_validation.unwrap_or_else(Utc::now),
            });
        }
    }
}
