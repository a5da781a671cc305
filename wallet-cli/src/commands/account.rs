//! Account command - open accounts, show balances and history

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;
use uuid::Uuid;
use wallet_core::services::CreateAccountInput;
use wallet_core::{ExecutionContext, LoggingService};

use super::{get_context, log_outcome, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account for a client
    Create {
        /// Owning client ID
        #[arg(long)]
        client_id: String,
        /// Opening deposit
        #[arg(long, allow_negative_numbers = true)]
        initial_balance: Option<Decimal>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show an account and its balance
    Show {
        /// Account ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List transfers touching an account, newest first
    History {
        /// Account ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountCommands, logger: &Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    let exec = ExecutionContext::background();

    match command {
        AccountCommands::Create {
            client_id,
            initial_balance,
            json,
        } => {
            let result = ctx.create_account.execute(
                &exec,
                CreateAccountInput {
                    client_id,
                    initial_balance,
                },
            );
            log_outcome(logger, "account create", &result);

            if json {
                print_json(&result)?;
            }
            let account = result?;
            if !json {
                output::success(&format!("Created account {}", account.id));
                println!("  Client:  {}", account.client_id);
                println!("  Balance: {}", output::format_amount(account.balance));
            }
        }
        AccountCommands::Show { id, json } => {
            let result = ctx.query_service.get_account(&exec, &id);
            log_outcome(logger, "account show", &result);

            if json {
                print_json(&result)?;
            }
            let account = result?;
            if json {
                return Ok(());
            }

            let balance = output::format_amount(account.balance);
            let balance = if account.balance < Decimal::ZERO {
                balance.red()
            } else {
                balance.green()
            };
            println!("{}", "Account".bold());
            println!("  ID:      {}", account.id);
            println!("  Client:  {}", account.client_id);
            println!("  Balance: {}", balance);
            println!("  Updated: {}", output::format_time(&account.updated_at));
        }
        AccountCommands::History { id, json } => {
            let result = ctx.query_service.history(&exec, &id);
            log_outcome(logger, "account history", &result);

            if json {
                print_json(&result)?;
            }
            let transactions = result?;
            if json {
                return Ok(());
            }

            if transactions.is_empty() {
                println!("No transfers.");
                return Ok(());
            }

            let account_id = Uuid::parse_str(id.trim()).ok();
            let mut table = output::create_table();
            table.set_header(vec!["Time", "Transfer", "Direction", "Counterparty", "Amount"]);
            for tx in &transactions {
                let outgoing = Some(tx.account_id_from) == account_id;
                let (direction, counterparty, amount) = if outgoing {
                    ("out", tx.account_id_to, format!("-{}", output::format_amount(tx.amount)).red())
                } else {
                    ("in", tx.account_id_from, format!("+{}", output::format_amount(tx.amount)).green())
                };
                table.add_row(vec![
                    output::format_time(&tx.created_at),
                    tx.id.to_string(),
                    direction.to_string(),
                    counterparty.to_string(),
                    amount.to_string(),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
