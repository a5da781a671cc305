//! Transfer command - move funds between two accounts

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use wallet_core::services::CreateTransactionInput;
use wallet_core::{ExecutionContext, LogEvent, LoggingService};

use super::{get_context, log_event, log_outcome, print_json};
use crate::output;

pub fn run(
    from: String,
    to: String,
    amount: Decimal,
    timeout_ms: Option<u64>,
    json: bool,
    logger: &Option<Arc<LoggingService>>,
) -> Result<()> {
    let ctx = get_context(logger)?;
    let exec = match timeout_ms {
        Some(ms) => ExecutionContext::with_timeout(Duration::from_millis(ms)),
        None => ExecutionContext::background(),
    };

    log_event(logger, LogEvent::new("transfer_started").with_command("transfer"));
    let result = ctx.create_transaction.execute(
        &exec,
        CreateTransactionInput {
            account_id_from: from,
            account_id_to: to,
            amount,
        },
    );
    log_outcome(logger, "transfer", &result);

    if json {
        print_json(&result)?;
    }
    let transfer = result?;
    if !json {
        output::success(&format!(
            "Transferred {} from {} to {}",
            output::format_amount(transfer.amount),
            transfer.account_id_from,
            transfer.account_id_to
        ));
        println!("  Transaction: {}", transfer.id);
        if !ctx.config.activity_log {
            output::warning("Activity log disabled; transfer not recorded in logs");
        }
    }

    Ok(())
}
