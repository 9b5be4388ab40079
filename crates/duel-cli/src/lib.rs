//! Command-line front end for the duel protocol.
//!
//! Each invocation loads the ledger snapshot, runs one operation as the
//! given caller, prints the result as JSON and writes the snapshot back if
//! the operation changed anything.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Command};
pub use commands::{execute, structured};
