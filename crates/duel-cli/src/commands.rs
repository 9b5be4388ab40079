//! Command execution against the snapshot-backed ledger.

use anyhow::{Context, Result};
use duel_protocol::duel::score::{FIELD_SCORE_ADVERSAIRE, FIELD_SCORE_PROVOCATEUR};
use duel_protocol::duel::parse_score;
use duel_protocol::{
    DuelError, DuelFilter, DuelState, EventBus, LedgerLock, LedgerSnapshot, Principal, Request,
    ScoreNegotiation, StructuredError,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cli::{Cli, Command};
use crate::config::{ledger_roster, parse_roster, protocol_config};

/// Result of one command: the JSON printed on stdout, and whether the
/// ledger changed and must be written back.
struct Outcome {
    output: Value,
    mutated: bool,
}

impl Outcome {
    fn read(output: impl Serialize) -> Result<Self> {
        Ok(Self {
            output: serde_json::to_value(output)?,
            mutated: false,
        })
    }

    fn write(output: impl Serialize) -> Result<Self> {
        Ok(Self {
            output: serde_json::to_value(output)?,
            mutated: true,
        })
    }
}

/// Load the ledger, run the command, and persist it if the command changed it.
///
/// The ledger lock is held from load to save, so concurrent invocations on
/// the same file run one after the other against committed state.
pub fn execute(cli: &Cli) -> Result<Value> {
    let config = protocol_config(cli)?;
    let roster = parse_roster(cli.roster.as_deref().unwrap_or(""))?;

    let mut lock = LedgerLock::open(&cli.state)?;
    let _guard = lock
        .acquire()
        .with_context(|| format!("locking ledger {}", cli.state.display()))?;
    let snapshot = LedgerSnapshot::load(&cli.state, config.admin_draws())
        .with_context(|| format!("loading ledger {}", cli.state.display()))?;
    debug!(
        path = %cli.state.display(),
        duels = snapshot.duels.len(),
        "Ledger loaded"
    );

    let roster = ledger_roster(roster, &snapshot);
    let bus = EventBus::new().shared();
    let mut events = bus.subscribe();
    let engine = ScoreNegotiation::from_snapshot(snapshot, roster.shared(), bus, config);

    let outcome = dispatch(&engine, cli)?;
    if outcome.mutated {
        engine
            .snapshot()?
            .save(&cli.state)
            .with_context(|| format!("saving ledger {}", cli.state.display()))?;
    }

    while let Ok(event) = events.try_recv() {
        info!(
            event = event.event_type(),
            duel_id = event.duel_id(),
            "Ledger event"
        );
    }
    Ok(outcome.output)
}

/// Render any failure as the structured JSON printed on stdout.
pub fn structured(err: &anyhow::Error) -> StructuredError {
    match err.downcast_ref::<DuelError>() {
        Some(e) => e.to_structured(),
        None => StructuredError::new(
            "CLI_ERROR",
            format!("{:#}", err),
            "Check the command arguments and file paths",
        ),
    }
}

fn request(principal: &Principal, expect: Option<DuelState>) -> Request<'_> {
    let request = Request::new(principal);
    match expect {
        Some(state) => request.expecting(state),
        None => request,
    }
}

/// Scores arrive as raw text so a non-integer is a validation failure.
fn scores(provocateur: &str, adversaire: &str) -> Result<(i64, i64)> {
    Ok((
        parse_score(FIELD_SCORE_PROVOCATEUR, provocateur)?,
        parse_score(FIELD_SCORE_ADVERSAIRE, adversaire)?,
    ))
}

fn dispatch(engine: &ScoreNegotiation, cli: &Cli) -> Result<Outcome> {
    let lifecycle = engine.lifecycle();

    match &cli.command {
        Command::Create {
            adversaire,
            provocateur,
            notes,
            date,
        } => {
            let caller = cli.principal()?;
            let provocateur = provocateur.unwrap_or(caller.id);
            let duel = lifecycle.create(&caller, provocateur, *adversaire, notes.clone(), *date)?;
            Outcome::write(lifecycle.describe(duel))
        }
        Command::Respond {
            duel_id,
            decision,
            expect,
        } => {
            let caller = cli.principal()?;
            let duel = lifecycle.respond(*duel_id, request(&caller, *expect), *decision)?;
            Outcome::write(lifecycle.describe(duel))
        }
        Command::Cancel { duel_id, expect } => {
            let caller = cli.principal()?;
            let duel = lifecycle.cancel(*duel_id, request(&caller, *expect))?;
            Outcome::write(lifecycle.describe(duel))
        }
        Command::Schedule { duel_id } => {
            let duel = lifecycle.schedule(*duel_id)?;
            Outcome::write(lifecycle.describe(duel))
        }
        Command::SubmitScore {
            duel_id,
            score_provocateur,
            score_adversaire,
            expect,
        } => {
            let caller = cli.principal()?;
            let (a, b) = scores(score_provocateur, score_adversaire)?;
            let proposition = engine.submit_score(*duel_id, request(&caller, *expect), a, b)?;
            Outcome::write(proposition.view_for(caller.id))
        }
        Command::Proposition { duel_id } => {
            let caller = cli.principal()?;
            Outcome::read(engine.get_proposition(*duel_id, &caller)?)
        }
        Command::Accept { duel_id, expect } => {
            let caller = cli.principal()?;
            let duel = engine.accept_proposition(*duel_id, request(&caller, *expect))?;
            Outcome::write(lifecycle.describe(duel))
        }
        Command::ForceValidate {
            duel_id,
            score_provocateur,
            score_adversaire,
            reason,
        } => {
            let caller = cli.principal()?;
            let (a, b) = scores(score_provocateur, score_adversaire)?;
            let duel = engine.force_validate(*duel_id, &caller, a, b, reason)?;
            Outcome::write(lifecycle.describe(duel))
        }
        Command::Delete { duel_id, reason } => {
            let caller = cli.principal()?;
            engine.delete(*duel_id, &caller, reason)?;
            Outcome::write(json!({ "deleted": duel_id }))
        }
        Command::Show { duel_id } => {
            let caller = cli.principal()?;
            Outcome::read(lifecycle.view(*duel_id, &caller)?)
        }
        Command::List {
            etats,
            awaiting_me,
            participant,
        } => {
            let caller = cli.principal()?;
            let filter = DuelFilter {
                states: etats.clone(),
                awaiting_me: *awaiting_me,
                participant: *participant,
            };
            let views: Vec<_> = lifecycle
                .list(&caller, &filter)?
                .into_iter()
                .map(|duel| lifecycle.describe(duel))
                .collect();
            Outcome::read(views)
        }
    }
}
