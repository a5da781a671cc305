//! Repository ports - one trait per entity
//!
//! Implementations are created per unit of work and bound to its storage
//! transaction, so every call made through them is part of that transaction.

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Account, Client, Transaction};

/// Client persistence
pub trait ClientRepository {
    /// Get a client by ID (without its accounts)
    ///
    /// Fails with `NotFound` when no client has this ID.
    fn get(&self, id: Uuid) -> Result<Client>;

    /// Insert a new client
    fn save(&self, client: &Client) -> Result<()>;
}

/// Account persistence
pub trait AccountRepository {
    /// Get an account by ID
    ///
    /// Fails with `NotFound` when no account has this ID.
    fn find_by_id(&self, id: Uuid) -> Result<Account>;

    /// Get all accounts owned by a client, oldest first
    fn find_by_client(&self, client_id: Uuid) -> Result<Vec<Account>>;

    /// Insert a new account
    fn save(&self, account: &Account) -> Result<()>;

    /// Persist the account's current balance
    ///
    /// Fails with `NotFound` when the account row does not exist.
    fn update_balance(&self, account: &Account) -> Result<()>;
}

/// Transaction persistence
pub trait TransactionRepository {
    /// Insert a new transaction; a duplicate ID is a `Persistence` error
    fn create(&self, transaction: &Transaction) -> Result<()>;

    /// Transactions touching an account on either side, newest first
    fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>>;
}
