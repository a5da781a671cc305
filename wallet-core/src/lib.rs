//! Wallet Core - accounts, transfers and the unit of work
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Client, Account, Transaction)
//! - **ports**: Repository and storage traits
//! - **uow**: Unit of work coordinating repositories over one transaction
//! - **events**: Post-commit event notification
//! - **services**: Use cases and supporting services
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod context;
pub mod domain;
pub mod events;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;
pub mod uow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use adapters::duckdb::{register_duckdb_repositories, DuckDbStore};
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use context::ExecutionContext;
pub use domain::result::{Error, ErrorKind, OperationResult, Result};
pub use domain::{Account, Client, OverdraftPolicy, Transaction};
pub use events::{DispatchReport, Event, EventDispatcher, EventHandler, TransactionCreated};
pub use services::{EntryPoint, LogEvent, LoggingService};
pub use uow::{RepositoryFactory, RepositoryRole, UnitOfWork};

/// Main context for wallet operations
///
/// Composition root: opens the database, wires the repositories into the
/// unit of work, owns the event dispatcher and builds the use cases.
pub struct WalletContext {
    pub config: Config,
    pub wallet_dir: PathBuf,
    pub store: Arc<DuckDbStore>,
    pub uow: Arc<UnitOfWork<DuckDbStore>>,
    pub dispatcher: Arc<EventDispatcher>,
    pub create_client: CreateClientUseCase<DuckDbStore>,
    pub create_account: CreateAccountUseCase<DuckDbStore>,
    pub create_transaction: CreateTransactionUseCase<DuckDbStore>,
    pub query_service: AccountQueryService<DuckDbStore>,
}

impl WalletContext {
    /// Open the wallet in `wallet_dir` using its settings
    ///
    /// When `activity_log` is given and the settings enable it, committed
    /// transfers are recorded there.
    pub fn new(wallet_dir: &Path, activity_log: Option<Arc<LoggingService>>) -> Result<Self> {
        let config = Config::load(wallet_dir)?;
        Self::with_config(wallet_dir, config, activity_log)
    }

    pub fn with_config(
        wallet_dir: &Path,
        config: Config,
        activity_log: Option<Arc<LoggingService>>,
    ) -> Result<Self> {
        std::fs::create_dir_all(wallet_dir)?;

        let db_path = config.database_path(wallet_dir);
        let store = Arc::new(DuckDbStore::open(&db_path)?);
        store.ensure_schema()?;

        let mut uow = UnitOfWork::new(Arc::clone(&store));
        register_duckdb_repositories(&mut uow);
        let uow = Arc::new(uow);

        let dispatcher = Arc::new(EventDispatcher::new());
        if let Some(logger) = activity_log.filter(|_| config.activity_log) {
            dispatcher.register(
                TransactionCreated::NAME,
                Arc::new(ActivityLogListener::new(logger)),
            )?;
        }

        debug!(db = %db_path.display(), overdraft = ?config.overdraft, "wallet opened");

        Ok(Self {
            create_client: CreateClientUseCase::new(Arc::clone(&uow)),
            create_account: CreateAccountUseCase::new(Arc::clone(&uow)),
            create_transaction: CreateTransactionUseCase::new(
                Arc::clone(&uow),
                Arc::clone(&dispatcher),
                config.overdraft.clone(),
            ),
            query_service: AccountQueryService::new(Arc::clone(&uow)),
            config,
            wallet_dir: wallet_dir.to_path_buf(),
            store,
            uow,
            dispatcher,
        })
    }
}
