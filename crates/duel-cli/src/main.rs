use std::process::ExitCode;

use clap::Parser;
use duel_cli::{execute, structured, Cli};
use tracing::warn;

fn main() -> ExitCode {
    // stdout carries the JSON result; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match execute(&cli) {
        Ok(output) => {
            println!("{:#}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let error = structured(&err);
            warn!(code = %error.code, "Command failed");
            match serde_json::to_string_pretty(&error) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", error),
            }
            ExitCode::FAILURE
        }
    }
}
