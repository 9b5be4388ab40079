//! Command-line arguments.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use duel_protocol::{Decision, DuelError, DuelId, DuelResult, DuelState, ParticipantId, Principal};

/// Drive the duel ledger kept in a JSON snapshot file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Ledger snapshot, created on the first mutation if absent
    #[arg(long, global = true, default_value = "duels.json")]
    pub state: PathBuf,

    /// Protocol configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Id of the fencer issuing the command
    #[arg(long, global = true)]
    pub caller: Option<ParticipantId>,

    /// Act with administrator capability
    #[arg(long, global = true, default_value_t = false)]
    pub admin: bool,

    /// Known fencers, as `id=name` pairs separated by commas
    #[arg(long, global = true)]
    pub roster: Option<String>,

    /// Counter-proposals tolerated before escalation, 0 for unbounded
    /// (overrides DUEL_MAX_COUNTER_PROPOSALS)
    #[arg(long, global = true)]
    pub max_counter_proposals: Option<u32>,

    /// Let administrators record a draw (overrides DUEL_ALLOW_ADMIN_DRAWS)
    #[arg(long, global = true, default_value_t = false)]
    pub allow_admin_draws: bool,

    /// Leave accepted duels in ACCEPTE until `schedule` is run
    #[arg(long, global = true, default_value_t = false)]
    pub manual_schedule: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The caller as a principal. Every command except `schedule` needs one.
    pub fn principal(&self) -> DuelResult<Principal> {
        let id = self
            .caller
            .ok_or_else(|| DuelError::validation("caller", "--caller is required"))?;
        Ok(Principal {
            id,
            is_admin: self.admin,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Challenge another fencer
    Create {
        /// The challenged fencer
        adversaire: ParticipantId,
        /// Defaults to the caller; admins may issue on behalf of someone else
        #[arg(long)]
        provocateur: Option<ParticipantId>,
        #[arg(long)]
        notes: Option<String>,
        /// Planned date, RFC 3339
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
    /// Accept or refuse a challenge (adversaire only)
    Respond {
        duel_id: DuelId,
        /// ACCEPT or REFUSE
        decision: Decision,
        #[arg(long)]
        expect: Option<DuelState>,
    },
    /// Withdraw a duel that has not been scheduled yet
    Cancel {
        duel_id: DuelId,
        #[arg(long)]
        expect: Option<DuelState>,
    },
    /// Acknowledge scheduling of an accepted duel
    Schedule { duel_id: DuelId },
    /// Propose or counter-propose the final score
    SubmitScore {
        duel_id: DuelId,
        #[arg(allow_negative_numbers = true)]
        score_provocateur: String,
        #[arg(allow_negative_numbers = true)]
        score_adversaire: String,
        #[arg(long)]
        expect: Option<DuelState>,
    },
    /// Show the outstanding score proposal
    Proposition { duel_id: DuelId },
    /// Accept the other participant's proposal
    Accept {
        duel_id: DuelId,
        #[arg(long)]
        expect: Option<DuelState>,
    },
    /// Set the final score regardless of state (admin)
    ForceValidate {
        duel_id: DuelId,
        #[arg(allow_negative_numbers = true)]
        score_provocateur: String,
        #[arg(allow_negative_numbers = true)]
        score_adversaire: String,
        #[arg(long)]
        reason: String,
    },
    /// Remove a duel (admin)
    Delete {
        duel_id: DuelId,
        #[arg(long)]
        reason: String,
    },
    /// Show one duel
    Show { duel_id: DuelId },
    /// List duels visible to the caller
    List {
        /// Keep only these states (repeatable)
        #[arg(long = "etat")]
        etats: Vec<DuelState>,
        /// Keep only duels waiting on the caller
        #[arg(long, default_value_t = false)]
        awaiting_me: bool,
        /// Admins: another fencer's duels
        #[arg(long)]
        participant: Option<ParticipantId>,
    },
}
