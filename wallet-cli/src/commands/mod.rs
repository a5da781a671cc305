//! CLI command implementations

pub mod account;
pub mod client;
pub mod logs;
pub mod transfer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;
use wallet_core::{EntryPoint, LogEvent, LoggingService, OperationResult, WalletContext};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<Arc<LoggingService>> {
    let wallet_dir = get_wallet_dir().ok()?;
    std::fs::create_dir_all(&wallet_dir).ok()?;
    match LoggingService::new(&wallet_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            warn!(error = %e, "activity log unavailable");
            None
        }
    }
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<Arc<LoggingService>>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Record the outcome of a command in the activity log
pub fn log_outcome<T>(
    logger: &Option<Arc<LoggingService>>,
    command: &str,
    result: &wallet_core::Result<T>,
) {
    match result {
        Ok(_) => log_event(logger, LogEvent::new("command_completed").with_command(command)),
        Err(e) => log_event(
            logger,
            LogEvent::new("command_failed")
                .with_command(command)
                .with_error(e.to_string())
                .with_error_details(e.kind().to_string()),
        ),
    }
}

/// Get the wallet directory from environment or default
pub fn get_wallet_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("WALLET_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".wallet"))
        .context("Could not find home directory; set WALLET_DIR")
}

/// Open the wallet, sharing the CLI's activity log with it
pub fn get_context(logger: &Option<Arc<LoggingService>>) -> Result<WalletContext> {
    let wallet_dir = get_wallet_dir()?;
    std::fs::create_dir_all(&wallet_dir)
        .with_context(|| format!("Failed to create wallet directory: {:?}", wallet_dir))?;

    Ok(WalletContext::new(&wallet_dir, logger.clone())?)
}

/// Print a use case result as an `OperationResult` document
pub fn print_json<T: Serialize>(result: &wallet_core::Result<T>) -> Result<()> {
    let doc = match result {
        Ok(data) => OperationResult::ok(data),
        Err(e) => OperationResult::fail(e),
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
