//! In-memory store
//!
//! Keeps committed state behind a mutex. Each transaction works on a private
//! copy of that state; commit swaps the copy in when nothing else committed
//! a write since the transaction began (optimistic versioning), and fails
//! with a `Persistence` conflict otherwise.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Client, Transaction};
use crate::ports::{AccountRepository, ClientRepository, TransactionRepository, TransactionalStore};
use crate::uow::{RepositoryFactory, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    version: u64,
    clients: HashMap<Uuid, Client>,
    accounts: HashMap<Uuid, Account>,
    /// Insertion order doubles as creation order
    transactions: Vec<Transaction>,
}

/// Thread-safe in-memory [`TransactionalStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::persistence(format!("Lock poisoned: {}", e)))
    }

    /// Insert a committed client directly, outside any transaction
    pub fn insert_client(&self, mut client: Client) -> Result<()> {
        client.accounts.clear();
        let mut state = self.lock()?;
        state.clients.insert(client.id, client);
        state.version += 1;
        Ok(())
    }

    /// Insert a committed account directly, outside any transaction
    pub fn insert_account(&self, account: Account) -> Result<()> {
        let mut state = self.lock()?;
        state.accounts.insert(account.id, account);
        state.version += 1;
        Ok(())
    }

    /// Committed view of an account
    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.lock().ok()?.accounts.get(&id).cloned()
    }

    /// Committed transactions, oldest first
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock()
            .map(|state| state.transactions.clone())
            .unwrap_or_default()
    }

    pub fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

/// Private working copy for one transaction
#[derive(Debug)]
pub struct MemorySession {
    base_version: u64,
    staged: RefCell<MemoryState>,
    dirty: Cell<bool>,
}

impl MemorySession {
    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> T {
        f(&self.staged.borrow())
    }

    fn write<T>(&self, f: impl FnOnce(&mut MemoryState) -> Result<T>) -> Result<T> {
        let value = f(&mut self.staged.borrow_mut())?;
        self.dirty.set(true);
        Ok(value)
    }
}

impl TransactionalStore for MemoryStore {
    type Handle = MemorySession;

    fn begin(&self) -> Result<MemorySession> {
        let state = self.lock()?;
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            base_version: state.version,
            staged: RefCell::new(state.clone()),
            dirty: Cell::new(false),
        })
    }

    fn commit(&self, handle: &MemorySession) -> Result<()> {
        if handle.dirty.get() {
            let mut state = self.lock()?;
            if state.version != handle.base_version {
                return Err(Error::persistence(
                    "write conflict: the store changed since this transaction began",
                ));
            }
            let mut staged = handle.staged.borrow().clone();
            staged.version = state.version + 1;
            *state = staged;
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self, handle: &MemorySession) -> Result<()> {
        handle.dirty.set(false);
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryClientRepository {
    session: Rc<MemorySession>,
}

impl MemoryClientRepository {
    pub fn new(session: Rc<MemorySession>) -> Self {
        Self { session }
    }
}

impl ClientRepository for MemoryClientRepository {
    fn get(&self, id: Uuid) -> Result<Client> {
        self.session
            .read(|state| state.clients.get(&id).cloned())
            .ok_or_else(|| Error::not_found(format!("client {}", id)))
    }

    fn save(&self, client: &Client) -> Result<()> {
        self.session.write(|state| {
            if state.clients.contains_key(&client.id) {
                return Err(Error::persistence(format!("duplicate client id {}", client.id)));
            }
            let mut stored = client.clone();
            stored.accounts.clear();
            state.clients.insert(client.id, stored);
            Ok(())
        })
    }
}

pub struct MemoryAccountRepository {
    session: Rc<MemorySession>,
}

impl MemoryAccountRepository {
    pub fn new(session: Rc<MemorySession>) -> Self {
        Self { session }
    }
}

impl AccountRepository for MemoryAccountRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Account> {
        self.session
            .read(|state| state.accounts.get(&id).cloned())
            .ok_or_else(|| Error::account_not_found(id))
    }

    fn find_by_client(&self, client_id: Uuid) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.session.read(|state| {
            state
                .accounts
                .values()
                .filter(|a| a.client_id == client_id)
                .cloned()
                .collect()
        });
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    fn save(&self, account: &Account) -> Result<()> {
        self.session.write(|state| {
            if state.accounts.contains_key(&account.id) {
                return Err(Error::persistence(format!("duplicate account id {}", account.id)));
            }
            state.accounts.insert(account.id, account.clone());
            Ok(())
        })
    }

    fn update_balance(&self, account: &Account) -> Result<()> {
        self.session.write(|state| {
            let stored = state
                .accounts
                .get_mut(&account.id)
                .ok_or_else(|| Error::account_not_found(account.id))?;
            stored.balance = account.balance;
            stored.updated_at = account.updated_at;
            Ok(())
        })
    }
}

pub struct MemoryTransactionRepository {
    session: Rc<MemorySession>,
}

impl MemoryTransactionRepository {
    pub fn new(session: Rc<MemorySession>) -> Self {
        Self { session }
    }
}

impl TransactionRepository for MemoryTransactionRepository {
    fn create(&self, transaction: &Transaction) -> Result<()> {
        self.session.write(|state| {
            if state.transactions.iter().any(|t| t.id == transaction.id) {
                return Err(Error::persistence(format!(
                    "duplicate transaction id {}",
                    transaction.id
                )));
            }
            state.transactions.push(transaction.clone());
            Ok(())
        })
    }

    fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>> {
        Ok(self.session.read(|state| {
            state
                .transactions
                .iter()
                .rev()
                .filter(|t| t.account_id_from == account_id || t.account_id_to == account_id)
                .cloned()
                .collect()
        }))
    }
}

/// Register the in-memory repositories for every role
///
/// Works for any store whose transactions are [`MemorySession`]s, so
/// wrappers around [`MemoryStore`] can reuse the same repositories.
pub fn register_memory_repositories<S>(uow: &mut UnitOfWork<S>)
where
    S: TransactionalStore<Handle = MemorySession>,
{
    uow.register(RepositoryFactory::clients(|session: &Rc<MemorySession>| {
        MemoryClientRepository::new(Rc::clone(session))
    }));
    uow.register(RepositoryFactory::accounts(|session: &Rc<MemorySession>| {
        MemoryAccountRepository::new(Rc::clone(session))
    }));
    uow.register(RepositoryFactory::transactions(|session: &Rc<MemorySession>| {
        MemoryTransactionRepository::new(Rc::clone(session))
    }));
}
