//! Settings resolution: TOML file, then `DUEL_*` environment, then flags.

use anyhow::{Context, Result};
use duel_protocol::{
    DuelError, DuelResult, LedgerSnapshot, ParticipantId, ProtocolConfig, Roster, StaticRoster,
};

use crate::cli::Cli;

/// Build the protocol configuration for this invocation.
pub fn protocol_config(cli: &Cli) -> Result<ProtocolConfig> {
    let mut config = match &cli.config {
        Some(path) => ProtocolConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ProtocolConfig::default(),
    };
    config.apply_env();

    if let Some(n) = cli.max_counter_proposals {
        config.escalation.max_counter_proposals = (n > 0).then_some(n);
    }
    if cli.allow_admin_draws {
        config.allow_admin_draws = true;
    }
    if cli.manual_schedule {
        config.auto_schedule = false;
    }
    Ok(config)
}

/// Parse `1=Athos,2=Porthos`.
pub fn parse_roster(raw: &str) -> DuelResult<StaticRoster> {
    let mut roster = StaticRoster::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = entry.split_once('=').ok_or_else(|| {
            DuelError::validation("roster", format!("expected id=name, got '{}'", entry))
        })?;
        let id = id
            .trim()
            .parse::<ParticipantId>()
            .map_err(|_| DuelError::validation("roster", format!("bad fencer id '{}'", id)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DuelError::validation(
                "roster",
                format!("fencer {} has no name", id),
            ));
        }
        roster.insert(id, name);
    }
    Ok(roster)
}

/// Explicit roster, completed with every fencer already in the ledger so
/// existing duels keep resolving between invocations.
pub fn ledger_roster(mut roster: StaticRoster, snapshot: &LedgerSnapshot) -> StaticRoster {
    for duel in &snapshot.duels {
        for id in [duel.provocateur_id, duel.adversaire_id] {
            if roster.resolve(id).is_none() {
                roster.insert(id, &format!("fencer {}", id));
            }
        }
    }
    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_protocol::{Duel, ErrorKind};

    #[test]
    fn test_parse_roster() {
        let roster = parse_roster("1=Athos, 2 = Porthos,").unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.resolve(2).unwrap().display_name, "Porthos");
    }

    #[test]
    fn test_parse_roster_empty() {
        assert!(parse_roster("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_roster_errors() {
        for raw in ["Athos", "x=Athos", "3="] {
            let err = parse_roster(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", raw);
        }
    }

    #[test]
    fn test_ledger_roster_keeps_explicit_names() {
        let snapshot = LedgerSnapshot {
            duels: vec![Duel::new(1, 1, 4, None, None)],
            next_id: 2,
            ..LedgerSnapshot::empty()
        };
        let roster = ledger_roster(parse_roster("1=Athos").unwrap(), &snapshot);
        assert_eq!(roster.resolve(1).unwrap().display_name, "Athos");
        assert_eq!(roster.resolve(4).unwrap().display_name, "fencer 4");
    }
}
