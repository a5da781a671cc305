//! DuckDB store and repositories
//!
//! `DuckDbStore` keeps one root connection to the database file. Every
//! transaction runs on its own clone of it (`Connection::try_clone`), so
//! concurrent units of work never share a handle, and DuckDB's MVCC rejects
//! conflicting writes with a transaction conflict at write or commit time.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Client, Transaction};
use crate::migrations::MIGRATIONS;
use crate::ports::{AccountRepository, ClientRepository, TransactionRepository, TransactionalStore};
use crate::services::{MigrationResult, MigrationService};
use crate::uow::{RepositoryFactory, UnitOfWork};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Timestamp layout written to and read back from TIMESTAMP columns
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// DuckDB-backed [`TransactionalStore`]
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the database file at `db_path`
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::persistence(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// A private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Autoloading would pull cached extensions from ~/.duckdb
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::persistence(format!("Lock poisoned: {}", e)))
    }

    /// Apply pending wallet migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Path of the database file; `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

/// One open DuckDB transaction on its own connection
pub struct DuckDbSession {
    conn: Connection,
}

impl TransactionalStore for DuckDbStore {
    type Handle = DuckDbSession;

    fn begin(&self) -> Result<DuckDbSession> {
        let conn = self.lock()?.try_clone()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(DuckDbSession { conn })
    }

    fn commit(&self, handle: &DuckDbSession) -> Result<()> {
        handle.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self, handle: &DuckDbSession) -> Result<()> {
        handle.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::persistence(format!("invalid timestamp '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| Error::persistence(format!("invalid amount '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::persistence(format!("invalid id '{}': {}", s, e)))
}

pub struct DuckDbClientRepository {
    session: Rc<DuckDbSession>,
}

impl DuckDbClientRepository {
    pub fn new(session: Rc<DuckDbSession>) -> Self {
        Self { session }
    }
}

impl ClientRepository for DuckDbClientRepository {
    fn get(&self, id: Uuid) -> Result<Client> {
        let row = self.session.conn.query_row(
            "SELECT client_id, name, email, created_at::VARCHAR, updated_at::VARCHAR
             FROM wallet_clients WHERE client_id = ?",
            [id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );

        let (client_id, name, email, created_at, updated_at) = match row {
            Ok(row) => row,
            Err(duckdb::Error::QueryReturnedNoRows) => {
                return Err(Error::not_found(format!("client {}", id)))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Client {
            id: parse_uuid(&client_id)?,
            name,
            email,
            accounts: Vec::new(),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn save(&self, client: &Client) -> Result<()> {
        self.session.conn.execute(
            "INSERT INTO wallet_clients (client_id, name, email, created_at, updated_at)
             VALUES (?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                client.id.to_string(),
                &client.name,
                &client.email,
                format_timestamp(&client.created_at),
                format_timestamp(&client.updated_at),
            ],
        )?;
        Ok(())
    }
}

pub struct DuckDbAccountRepository {
    session: Rc<DuckDbSession>,
}

type AccountRow = (String, String, String, String, String);

const ACCOUNT_COLUMNS: &str =
    "account_id, client_id, balance::VARCHAR, created_at::VARCHAR, updated_at::VARCHAR";

impl DuckDbAccountRepository {
    pub fn new(session: Rc<DuckDbSession>) -> Self {
        Self { session }
    }

    fn read_row(row: &duckdb::Row) -> duckdb::Result<AccountRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn to_account(raw: AccountRow) -> Result<Account> {
        let (account_id, client_id, balance, created_at, updated_at) = raw;
        Ok(Account {
            id: parse_uuid(&account_id)?,
            client_id: parse_uuid(&client_id)?,
            balance: parse_decimal(&balance)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

impl AccountRepository for DuckDbAccountRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Account> {
        let sql = format!("SELECT {} FROM wallet_accounts WHERE account_id = ?", ACCOUNT_COLUMNS);
        match self
            .session
            .conn
            .query_row(&sql, [id.to_string()], Self::read_row)
        {
            Ok(raw) => Self::to_account(raw),
            Err(duckdb::Error::QueryReturnedNoRows) => Err(Error::account_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_client(&self, client_id: Uuid) -> Result<Vec<Account>> {
        let sql = format!(
            "SELECT {} FROM wallet_accounts WHERE client_id = ? ORDER BY created_at",
            ACCOUNT_COLUMNS
        );
        let mut stmt = self.session.conn.prepare(&sql)?;
        let rows = stmt.query_map([client_id.to_string()], Self::read_row)?;

        let mut accounts = Vec::new();
        for raw in rows {
            accounts.push(Self::to_account(raw?)?);
        }
        Ok(accounts)
    }

    fn save(&self, account: &Account) -> Result<()> {
        self.session.conn.execute(
            "INSERT INTO wallet_accounts (account_id, client_id, balance, created_at, updated_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 4)), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                account.id.to_string(),
                account.client_id.to_string(),
                account.balance.to_string(),
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update_balance(&self, account: &Account) -> Result<()> {
        let updated = self.session.conn.execute(
            "UPDATE wallet_accounts
             SET balance = CAST(? AS DECIMAL(18, 4)), updated_at = CAST(? AS TIMESTAMP)
             WHERE account_id = ?",
            params![
                account.balance.to_string(),
                format_timestamp(&account.updated_at),
                account.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(Error::account_not_found(account.id));
        }
        Ok(())
    }
}

pub struct DuckDbTransactionRepository {
    session: Rc<DuckDbSession>,
}

impl DuckDbTransactionRepository {
    pub fn new(session: Rc<DuckDbSession>) -> Self {
        Self { session }
    }
}

impl TransactionRepository for DuckDbTransactionRepository {
    fn create(&self, transaction: &Transaction) -> Result<()> {
        self.session.conn.execute(
            "INSERT INTO wallet_transactions (transaction_id, account_id_from, account_id_to, amount, created_at)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(18, 4)), CAST(? AS TIMESTAMP))",
            params![
                transaction.id.to_string(),
                transaction.account_id_from.to_string(),
                transaction.account_id_to.to_string(),
                transaction.amount.to_string(),
                format_timestamp(&transaction.created_at),
            ],
        )?;
        Ok(())
    }

    fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>> {
        let mut stmt = self.session.conn.prepare(
            "SELECT transaction_id, account_id_from, account_id_to, amount::VARCHAR, created_at::VARCHAR
             FROM wallet_transactions
             WHERE account_id_from = ? OR account_id_to = ?
             ORDER BY created_at DESC",
        )?;
        let id = account_id.to_string();
        let rows = stmt.query_map(params![&id, &id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            let (transaction_id, from, to, amount, created_at) = row?;
            transactions.push(Transaction {
                id: parse_uuid(&transaction_id)?,
                account_id_from: parse_uuid(&from)?,
                account_id_to: parse_uuid(&to)?,
                amount: parse_decimal(&amount)?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(transactions)
    }
}

/// Register the DuckDB repositories for every role
pub fn register_duckdb_repositories(uow: &mut UnitOfWork<DuckDbStore>) {
    uow.register(RepositoryFactory::clients(|session: &Rc<DuckDbSession>| {
        DuckDbClientRepository::new(Rc::clone(session))
    }));
    uow.register(RepositoryFactory::accounts(|session: &Rc<DuckDbSession>| {
        DuckDbAccountRepository::new(Rc::clone(session))
    }));
    uow.register(RepositoryFactory::transactions(|session: &Rc<DuckDbSession>| {
        DuckDbTransactionRepository::new(Rc::clone(session))
    }));
}
