//! Wallet CLI - clients, accounts and transfers in your terminal

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;
use wallet_core::{ErrorKind, LoggingService};

mod commands;
mod output;

use commands::{account, client, logs, transfer};

/// Wallet - clients, accounts and transfers in your terminal
#[derive(Parser)]
#[command(name = "wallet", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clients
    Client {
        #[command(subcommand)]
        command: client::ClientCommands,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Transfer funds between two accounts
    Transfer {
        /// Source account ID
        #[arg(long)]
        from: String,
        /// Destination account ID
        #[arg(long)]
        to: String,
        /// Amount to move
        #[arg(long, allow_negative_numbers = true)]
        amount: Decimal,
        /// Give up when the transfer takes longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the activity log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let logger = commands::get_logger();

    match run(cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::from(exit_status(&e))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map a failure to the process exit status for its error kind
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<wallet_core::Error>().map(|e| e.kind()) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Cancelled) => 4,
        _ => 1,
    }
}

fn run(cli: Cli, logger: &Option<Arc<LoggingService>>) -> Result<()> {
    match cli.command {
        Commands::Client { command } => client::run(command, logger),
        Commands::Account { command } => account::run(command, logger),
        Commands::Transfer {
            from,
            to,
            amount,
            timeout_ms,
            json,
        } => transfer::run(from, to, amount, timeout_ms, json, logger),
        Commands::Logs { command } => logs::run(command, logger),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let status = |e: wallet_core::Error| exit_status(&anyhow::Error::from(e));

        assert_eq!(status(wallet_core::Error::validation("bad")), 2);
        assert_eq!(status(wallet_core::Error::not_found("gone")), 3);
        assert_eq!(status(wallet_core::Error::cancelled("late")), 4);
        assert_eq!(status(wallet_core::Error::persistence("disk")), 1);
        assert_eq!(status(wallet_core::Error::configuration("overdraft")), 1);
        assert_eq!(exit_status(&anyhow::anyhow!("no home directory")), 1);
    }

    #[test]
    fn test_transfer_args_parse() {
        let cli = Cli::try_parse_from([
            "wallet", "transfer", "--from", "a", "--to", "b", "--amount", "12.50",
            "--timeout-ms", "250",
        ])
        .unwrap();

        match cli.command {
            Commands::Transfer {
                amount, timeout_ms, json, ..
            } => {
                assert_eq!(amount, Decimal::new(1250, 2));
                assert_eq!(timeout_ms, Some(250));
                assert!(!json);
            }
            _ => panic!("expected transfer"),
        }
    }

    #[test]
    fn test_malformed_amount_is_rejected_by_parser() {
        assert!(Cli::try_parse_from([
            "wallet", "transfer", "--from", "a", "--to", "b", "--amount", "ten",
        ])
        .is_err());
    }
}
