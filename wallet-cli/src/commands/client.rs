//! Client command - register and inspect clients

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use wallet_core::services::CreateClientInput;
use wallet_core::{ExecutionContext, LoggingService};

use super::{get_context, log_outcome, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a new client
    Create {
        /// Client name
        #[arg(long)]
        name: String,
        /// Client email
        #[arg(long)]
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a client and its accounts
    Show {
        /// Client ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: ClientCommands, logger: &Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    let exec = ExecutionContext::background();

    match command {
        ClientCommands::Create { name, email, json } => {
            let result = ctx
                .create_client
                .execute(&exec, CreateClientInput { name, email });
            log_outcome(logger, "client create", &result);

            if json {
                print_json(&result)?;
            }
            let client = result?;
            if !json {
                output::success(&format!("Created client {}", client.id));
                println!("  Name:  {}", client.name);
                println!("  Email: {}", client.email);
            }
        }
        ClientCommands::Show { id, json } => {
            let result = ctx.query_service.get_client(&exec, &id);
            log_outcome(logger, "client show", &result);

            if json {
                print_json(&result)?;
            }
            let client = result?;
            if json {
                return Ok(());
            }

            println!("{} {}", client.name.bold(), format!("<{}>", client.email).dimmed());
            println!("  ID:      {}", client.id);
            println!("  Created: {}", output::format_time(&client.created_at));
            println!();

            if client.accounts.is_empty() {
                println!("No accounts.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Account", "Balance", "Created"]);
            for account in &client.accounts {
                table.add_row(vec![
                    account.id.to_string(),
                    output::format_amount(account.balance),
                    output::format_time(&account.created_at),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
