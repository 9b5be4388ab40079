//! Structural invariants of a duel record.
//!
//! Used when restoring snapshots and by the property tests. An empty result
//! means the record is consistent. Configuration-dependent checks live in
//! [`policy_warnings`]; they never make a committed record unreadable.

use super::score::{DrawPolicy, MAX_SCORE};
use super::state::{Duel, DuelState};

/// Return every invariant the duel violates.
pub fn check_invariants(duel: &Duel) -> Vec<String> {
    let mut violations = Vec::new();
    let validated = duel.etat == DuelState::Valide;

    if duel.provocateur_id == duel.adversaire_id {
        violations.push(format!(
            "participants are identical ({})",
            duel.provocateur_id
        ));
    }

    if let Some(score) = duel.score {
        for value in [score.score_provocateur, score.score_adversaire] {
            if i64::from(value) > MAX_SCORE {
                violations.push(format!("score {} exceeds {}", value, MAX_SCORE));
            }
        }
        if !validated {
            violations.push(format!("score set while {}", duel.etat));
        }
        let expected = score.leader().map(|role| duel.participant(role));
        if validated && duel.vainqueur_id != expected {
            violations.push(format!(
                "vainqueur {:?} does not match score {} (expected {:?})",
                duel.vainqueur_id, score, expected
            ));
        }
    } else if validated {
        violations.push("validated without a score".to_string());
    }

    if duel.vainqueur_id.is_some() && !validated {
        violations.push(format!("vainqueur set while {}", duel.etat));
    }

    if duel.date_validation.is_some() != validated {
        violations.push(format!(
            "date_validation presence does not match state {}",
            duel.etat
        ));
    }

    match (&duel.proposition, duel.etat) {
        (Some(p), DuelState::ProposeScore) => {
            if !duel.is_participant(p.propose_par) {
                violations.push(format!("proposition authored by outsider {}", p.propose_par));
            }
        }
        (None, DuelState::ProposeScore) => {
            violations.push("PROPOSE_SCORE without a proposition".to_string());
        }
        (Some(_), state) => {
            violations.push(format!("proposition outstanding while {}", state));
        }
        (None, _) => {}
    }

    let mut current = DuelState::Propose;
    for (i, t) in duel.transitions.iter().enumerate() {
        if t.from != current {
            violations.push(format!(
                "transition {} starts at {} but previous ended at {}",
                i, t.from, current
            ));
        }
        let legal = t.from.valid_transitions().contains(&t.to) || t.to == DuelState::Valide;
        if !legal {
            violations.push(format!("transition {} → {} is not an edge", t.from, t.to));
        }
        current = t.to;
    }
    if current != duel.etat {
        violations.push(format!(
            "transition log ends at {} but state is {}",
            current, duel.etat
        ));
    }

    violations
}

/// Records the current configuration would no longer produce. An
/// administrator draw stays valid after draws are switched off.
pub fn policy_warnings(duel: &Duel, draws: DrawPolicy) -> Vec<String> {
    match duel.score {
        Some(score) if score.is_draw() && draws == DrawPolicy::Forbidden => {
            vec![format!("draw recorded ({}) while draws are disabled", score)]
        }
        _ => Vec::new(),
    }
}
