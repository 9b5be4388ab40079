//! Duel scenarios end to end: challenge, negotiation, administrative
//! overrides and deletion.

use std::sync::Arc;

use duel_protocol::{
    AdminAction, AuditLog, Decision, DuelFilter, DuelLifecycle, DuelState, ErrorKind, EventBus,
    InMemoryDuelStore, Principal, ProtocolConfig, Request, ScoreNegotiation, StaticRoster,
};

const ADMIN: Principal = Principal {
    id: 100,
    is_admin: true,
};

fn engine_with(config: ProtocolConfig) -> ScoreNegotiation {
    let roster = StaticRoster::new()
        .with_member(1, "Athos")
        .with_member(2, "Porthos")
        .with_member(3, "Aramis")
        .with_member(4, "d'Artagnan");
    let lifecycle = DuelLifecycle::new(
        Arc::new(InMemoryDuelStore::new()),
        roster.shared(),
        EventBus::new().shared(),
        config,
    );
    ScoreNegotiation::new(lifecycle, Arc::new(AuditLog::new()))
}

fn engine() -> ScoreNegotiation {
    engine_with(ProtocolConfig::default())
}

fn fencer(id: u64) -> Principal {
    Principal::participant(id)
}

/// Duel 1 vs 2, accepted and scheduled.
fn playing(engine: &ScoreNegotiation) -> u64 {
    let duel = engine
        .lifecycle()
        .create(&fencer(1), 1, 2, Some("salle d'armes".into()), None)
        .unwrap();
    let duel = engine
        .lifecycle()
        .respond(duel.id, &fencer(2), Decision::Accept)
        .unwrap();
    assert_eq!(duel.etat, DuelState::AJouer);
    duel.id
}

#[test]
fn test_accepted_proposal_validates() {
    let engine = engine();
    let id = playing(&engine);

    let prop = engine.submit_score(id, &fencer(1), 15, 10).unwrap();
    assert_eq!(prop.propose_par, 1);
    let duel = engine.lifecycle().get(id, &fencer(2)).unwrap();
    assert_eq!(duel.etat, DuelState::ProposeScore);

    let duel = engine.accept_proposition(id, &fencer(2)).unwrap();
    assert_eq!(duel.etat, DuelState::Valide);
    assert_eq!(duel.vainqueur_id, Some(1));
    assert!(duel.date_validation.is_some());

    let path: Vec<_> = duel.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            DuelState::Accepte,
            DuelState::AJouer,
            DuelState::ProposeScore,
            DuelState::Valide
        ]
    );
}

#[test]
fn test_self_acceptance_leaves_state_unchanged() {
    let engine = engine();
    let id = playing(&engine);
    engine.submit_score(id, &fencer(1), 15, 10).unwrap();
    let before = engine.lifecycle().get(id, &fencer(1)).unwrap();

    let err = engine.accept_proposition(id, &fencer(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(engine.lifecycle().get(id, &fencer(1)).unwrap(), before);
}

#[test]
fn test_counter_proposal_then_accept() {
    let engine = engine();
    let id = playing(&engine);
    engine.submit_score(id, &fencer(1), 15, 10).unwrap();
    engine.submit_score(id, &fencer(2), 15, 20).unwrap();

    let view = engine.get_proposition(id, &fencer(1)).unwrap();
    assert_eq!(view.proposition.propose_par, 2);
    assert!(!view.a_propose);

    let duel = engine.accept_proposition(id, &fencer(1)).unwrap();
    assert_eq!(duel.etat, DuelState::Valide);
    assert_eq!(duel.vainqueur_id, Some(2));
    assert_eq!(duel.score.map(|s| s.to_string()), Some("15-20".into()));
}

#[test]
fn test_admin_draw_rejected_by_default() {
    let engine = engine();
    let id = playing(&engine);
    let err = engine
        .force_validate(id, &ADMIN, 12, 12, "reason")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(engine.audit().entries().unwrap().is_empty());
}

#[test]
fn test_force_validate_from_proposal() {
    let engine = engine();
    let duel = engine.lifecycle().create(&fencer(3), 3, 4, None, None).unwrap();

    let duel = engine
        .force_validate(duel.id, &ADMIN, 4, 5, "result reported by the referee")
        .unwrap();
    assert_eq!(duel.etat, DuelState::Valide);
    assert_eq!(duel.vainqueur_id, Some(4));
    assert!(duel.date_validation.is_some());
}

#[test]
fn test_force_validate_after_escalation() {
    let engine = engine_with(ProtocolConfig {
        escalation: duel_protocol::EscalationPolicy::after(3),
        ..Default::default()
    });
    let id = playing(&engine);
    for (caller, a, b) in [(1, 5, 3), (2, 3, 5), (1, 5, 4), (2, 4, 5)] {
        engine.submit_score(id, &fencer(caller), a, b).unwrap();
    }
    let duel = engine.lifecycle().get(id, &ADMIN).unwrap();
    assert_eq!(duel.etat, DuelState::EnAttenteValidation);
    assert!(engine.get_proposition(id, &fencer(1)).is_err());

    let duel = engine.force_validate(id, &ADMIN, 5, 4, "video").unwrap();
    assert_eq!(duel.etat, DuelState::Valide);
    assert_eq!(duel.vainqueur_id, Some(1));
    assert_eq!(duel.negotiation.len(), 4);
}

#[test]
fn test_force_validate_correction_keeps_first_date() {
    let engine = engine();
    let id = playing(&engine);
    engine.submit_score(id, &fencer(1), 15, 10).unwrap();
    let first = engine.accept_proposition(id, &fencer(2)).unwrap();

    let corrected = engine
        .force_validate(id, &ADMIN, 10, 15, "score sheet swapped")
        .unwrap();
    assert_eq!(corrected.vainqueur_id, Some(2));
    assert_eq!(corrected.date_validation, first.date_validation);

    let entries = engine.audit().for_duel(id).unwrap();
    assert!(matches!(
        entries[0].action,
        AdminAction::ForceValidate {
            correction: true,
            ..
        }
    ));
}

#[test]
fn test_deleted_duel_is_gone_everywhere() {
    let engine = engine();
    let id = playing(&engine);
    engine.submit_score(id, &fencer(1), 15, 10).unwrap();
    engine.delete(id, &ADMIN, "entered twice").unwrap();

    let lc = engine.lifecycle();
    let kinds = [
        lc.get(id, &fencer(1)).unwrap_err().kind(),
        lc.respond(id, &fencer(2), Decision::Accept)
            .unwrap_err()
            .kind(),
        lc.cancel(id, &fencer(1)).unwrap_err().kind(),
        lc.schedule(id).unwrap_err().kind(),
        engine.submit_score(id, &fencer(1), 5, 3).unwrap_err().kind(),
        engine.get_proposition(id, &fencer(1)).unwrap_err().kind(),
        engine.accept_proposition(id, &fencer(2)).unwrap_err().kind(),
        engine
            .force_validate(id, &ADMIN, 5, 3, "late")
            .unwrap_err()
            .kind(),
        engine.delete(id, &ADMIN, "again").unwrap_err().kind(),
    ];
    assert!(kinds.iter().all(|k| *k == ErrorKind::NotFound), "{:?}", kinds);
    assert!(lc.list(&ADMIN, &DuelFilter::default()).unwrap().is_empty());
}

#[test]
fn test_terminal_states_reject_participants() {
    let engine = engine();
    let lc = engine.lifecycle();

    let refused = lc.create(&fencer(1), 1, 2, None, None).unwrap();
    lc.respond(refused.id, &fencer(2), Decision::Refuse).unwrap();
    let cancelled = lc.create(&fencer(1), 1, 3, None, None).unwrap();
    lc.cancel(cancelled.id, &fencer(3)).unwrap();

    for id in [refused.id, cancelled.id] {
        let adversaire = lc.get(id, &ADMIN).unwrap().adversaire_id;
        let errs = [
            lc.respond(id, &fencer(adversaire), Decision::Accept)
                .unwrap_err(),
            lc.cancel(id, &fencer(1)).unwrap_err(),
            engine.submit_score(id, &fencer(1), 5, 3).unwrap_err(),
            engine.accept_proposition(id, &fencer(1)).unwrap_err(),
        ];
        for err in errs {
            assert_eq!(err.kind(), ErrorKind::StateConflict, "{}", err);
        }
    }
}

#[test]
fn test_stale_expectation_conflicts() {
    let engine = engine();
    let id = playing(&engine);
    let caller = fencer(1);

    let err = engine
        .submit_score(id, Request::new(&caller).expecting(DuelState::ProposeScore), 5, 3)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(err.is_retryable());

    engine
        .submit_score(id, Request::new(&caller).expecting(DuelState::AJouer), 5, 3)
        .unwrap();
}

#[test]
fn test_outsider_is_denied() {
    let engine = engine();
    let id = playing(&engine);
    engine.submit_score(id, &fencer(1), 15, 10).unwrap();

    let outsider = fencer(3);
    assert_eq!(
        engine.get_proposition(id, &outsider).unwrap_err().kind(),
        ErrorKind::PermissionDenied
    );
    assert_eq!(
        engine.accept_proposition(id, &outsider).unwrap_err().kind(),
        ErrorKind::PermissionDenied
    );
    assert_eq!(
        engine.lifecycle().cancel(id, &outsider).unwrap_err().kind(),
        ErrorKind::PermissionDenied
    );
}

#[test]
fn test_dashboard_awaiting_me() {
    let engine = engine();
    let lc = engine.lifecycle();
    let challenged = lc.create(&fencer(3), 3, 1, None, None).unwrap();
    let id = playing(&engine);
    engine.submit_score(id, &fencer(2), 3, 15).unwrap();

    let mine: Vec<_> = lc
        .list(&fencer(1), &DuelFilter::default().awaiting_me())
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(mine, vec![challenged.id, id]);

    let theirs = lc
        .list(&fencer(2), &DuelFilter::default().awaiting_me())
        .unwrap();
    assert!(theirs.is_empty());
}
