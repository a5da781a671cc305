//! Service layer - use cases and supporting services
//!
//! Use cases coordinate domain logic through the unit of work. Each one
//! focuses on a single operation.

mod account_query;
mod create_account;
mod create_client;
mod create_transaction;
pub mod logging;
pub mod migration;

use uuid::Uuid;

use crate::domain::result::{Error, Result};

pub use account_query::AccountQueryService;
pub use create_account::{CreateAccountInput, CreateAccountOutput, CreateAccountUseCase};
pub use create_client::{CreateClientInput, CreateClientOutput, CreateClientUseCase};
pub use create_transaction::{
    CreateTransactionInput, CreateTransactionOutput, CreateTransactionUseCase, TransferStage,
};
pub use logging::{ActivityLogListener, EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};

/// Parse an id given by a caller; malformed ids are a validation error
pub(crate) fn parse_id(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| Error::validation(format!("invalid {} id '{}'", what, value)))
}
