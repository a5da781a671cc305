//! Unit of work - binds a group of repository calls to one storage transaction
//!
//! Repository factories are registered once per [`RepositoryRole`]. Every
//! call to [`UnitOfWork::run`] opens a fresh transaction and a fresh
//! [`UowScope`]; repositories resolved through the scope are built on demand,
//! bound to that transaction and cached until the scope ends. The transaction
//! commits only when the closure succeeds, and rolls back on error,
//! cancellation, or panic.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::domain::result::{Error, Result};
use crate::ports::{AccountRepository, ClientRepository, TransactionRepository, TransactionalStore};

/// The repositories a unit of work knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RepositoryRole {
    Clients,
    Accounts,
    Transactions,
}

impl RepositoryRole {
    pub const ALL: [RepositoryRole; 3] = [
        RepositoryRole::Clients,
        RepositoryRole::Accounts,
        RepositoryRole::Transactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryRole::Clients => "clients",
            RepositoryRole::Accounts => "accounts",
            RepositoryRole::Transactions => "transactions",
        }
    }
}

impl fmt::Display for RepositoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Factory<H, R> = Arc<dyn Fn(&Rc<H>) -> Rc<R> + Send + Sync>;

/// Builds a repository bound to a transaction handle `H`
pub enum RepositoryFactory<H> {
    Clients(Factory<H, dyn ClientRepository>),
    Accounts(Factory<H, dyn AccountRepository>),
    Transactions(Factory<H, dyn TransactionRepository>),
}

impl<H: 'static> RepositoryFactory<H> {
    pub fn clients<F, R>(factory: F) -> Self
    where
        F: Fn(&Rc<H>) -> R + Send + Sync + 'static,
        R: ClientRepository + 'static,
    {
        Self::Clients(Arc::new(move |handle| {
            Rc::new(factory(handle)) as Rc<dyn ClientRepository>
        }))
    }

    pub fn accounts<F, R>(factory: F) -> Self
    where
        F: Fn(&Rc<H>) -> R + Send + Sync + 'static,
        R: AccountRepository + 'static,
    {
        Self::Accounts(Arc::new(move |handle| {
            Rc::new(factory(handle)) as Rc<dyn AccountRepository>
        }))
    }

    pub fn transactions<F, R>(factory: F) -> Self
    where
        F: Fn(&Rc<H>) -> R + Send + Sync + 'static,
        R: TransactionRepository + 'static,
    {
        Self::Transactions(Arc::new(move |handle| {
            Rc::new(factory(handle)) as Rc<dyn TransactionRepository>
        }))
    }
}

impl<H> RepositoryFactory<H> {
    pub fn role(&self) -> RepositoryRole {
        match self {
            RepositoryFactory::Clients(_) => RepositoryRole::Clients,
            RepositoryFactory::Accounts(_) => RepositoryRole::Accounts,
            RepositoryFactory::Transactions(_) => RepositoryRole::Transactions,
        }
    }

    fn bind(&self, handle: &Rc<H>) -> BoundRepository {
        match self {
            RepositoryFactory::Clients(f) => BoundRepository::Clients(f(handle)),
            RepositoryFactory::Accounts(f) => BoundRepository::Accounts(f(handle)),
            RepositoryFactory::Transactions(f) => BoundRepository::Transactions(f(handle)),
        }
    }
}

impl<H> Clone for RepositoryFactory<H> {
    fn clone(&self) -> Self {
        match self {
            RepositoryFactory::Clients(f) => RepositoryFactory::Clients(Arc::clone(f)),
            RepositoryFactory::Accounts(f) => RepositoryFactory::Accounts(Arc::clone(f)),
            RepositoryFactory::Transactions(f) => RepositoryFactory::Transactions(Arc::clone(f)),
        }
    }
}

/// A repository instance bound to the scope's transaction
#[derive(Clone)]
enum BoundRepository {
    Clients(Rc<dyn ClientRepository>),
    Accounts(Rc<dyn AccountRepository>),
    Transactions(Rc<dyn TransactionRepository>),
}

/// Coordinates repositories over a [`TransactionalStore`]
pub struct UnitOfWork<S: TransactionalStore> {
    store: Arc<S>,
    factories: HashMap<RepositoryRole, RepositoryFactory<S::Handle>>,
}

impl<S: TransactionalStore> UnitOfWork<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            factories: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register the factory for its role, replacing any previous one
    pub fn register(&mut self, factory: RepositoryFactory<S::Handle>) {
        let role = factory.role();
        if self.factories.insert(role, factory).is_some() {
            debug!(%role, "repository factory replaced");
        }
    }

    pub fn is_registered(&self, role: RepositoryRole) -> bool {
        self.factories.contains_key(&role)
    }

    pub fn registered_roles(&self) -> Vec<RepositoryRole> {
        let mut roles: Vec<RepositoryRole> = self.factories.keys().copied().collect();
        roles.sort();
        roles
    }

    /// Run `work` inside a new transaction
    ///
    /// - `work` fails: rollback, and its error is returned unchanged
    /// - `ctx` cancelled before commit: rollback, `Cancelled`
    /// - commit fails: `Persistence`
    /// - `work` panics: rollback while unwinding, then the panic continues
    pub fn run<T, F>(&self, ctx: &ExecutionContext, work: F) -> Result<T>
    where
        F: FnOnce(&mut UowScope<'_, S>) -> Result<T>,
    {
        ctx.check()?;

        let handle = self
            .store
            .begin()
            .map_err(|e| into_persistence("failed to begin transaction", e))?;
        let guard = RollbackGuard {
            store: self.store.as_ref(),
            handle: Rc::new(handle),
            finished: false,
        };
        debug!("unit of work started");

        let mut scope = UowScope {
            ctx,
            handle: Rc::clone(&guard.handle),
            factories: &self.factories,
            cache: HashMap::new(),
        };
        let outcome = work(&mut scope);
        drop(scope);

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "unit of work failed");
                guard.rollback();
                return Err(err);
            }
        };

        if let Err(err) = ctx.check() {
            guard.rollback();
            return Err(err);
        }

        guard.commit()?;
        Ok(value)
    }
}

/// Repository access for a single [`UnitOfWork::run`] call
pub struct UowScope<'u, S: TransactionalStore> {
    ctx: &'u ExecutionContext,
    handle: Rc<S::Handle>,
    factories: &'u HashMap<RepositoryRole, RepositoryFactory<S::Handle>>,
    cache: HashMap<RepositoryRole, BoundRepository>,
}

impl<'u, S: TransactionalStore> UowScope<'u, S> {
    pub fn context(&self) -> &ExecutionContext {
        self.ctx
    }

    pub fn clients(&mut self) -> Result<Rc<dyn ClientRepository>> {
        match self.resolve(RepositoryRole::Clients)? {
            BoundRepository::Clients(repo) => Ok(repo),
            _ => Err(role_mismatch(RepositoryRole::Clients)),
        }
    }

    pub fn accounts(&mut self) -> Result<Rc<dyn AccountRepository>> {
        match self.resolve(RepositoryRole::Accounts)? {
            BoundRepository::Accounts(repo) => Ok(repo),
            _ => Err(role_mismatch(RepositoryRole::Accounts)),
        }
    }

    pub fn transactions(&mut self) -> Result<Rc<dyn TransactionRepository>> {
        match self.resolve(RepositoryRole::Transactions)? {
            BoundRepository::Transactions(repo) => Ok(repo),
            _ => Err(role_mismatch(RepositoryRole::Transactions)),
        }
    }

    fn resolve(&mut self, role: RepositoryRole) -> Result<BoundRepository> {
        self.ctx.check()?;

        if let Some(bound) = self.cache.get(&role) {
            return Ok(bound.clone());
        }

        let factory = self.factories.get(&role).ok_or_else(|| {
            Error::configuration(format!("no repository registered for role '{}'", role))
        })?;
        let bound = factory.bind(&self.handle);
        self.cache.insert(role, bound.clone());
        Ok(bound)
    }
}

fn role_mismatch(role: RepositoryRole) -> Error {
    Error::configuration(format!("factory registered for '{}' built another repository", role))
}

fn into_persistence(context: &str, err: Error) -> Error {
    match err {
        Error::Persistence(msg) => Error::persistence(format!("{}: {}", context, msg)),
        other => Error::persistence(format!("{}: {}", context, other)),
    }
}

/// Rolls the transaction back unless it was explicitly finished
struct RollbackGuard<'s, S: TransactionalStore> {
    store: &'s S,
    handle: Rc<S::Handle>,
    finished: bool,
}

impl<S: TransactionalStore> RollbackGuard<'_, S> {
    fn commit(mut self) -> Result<()> {
        self.finished = true;
        match self.store.commit(&self.handle) {
            Ok(()) => {
                debug!("unit of work committed");
                Ok(())
            }
            Err(err) => {
                // Most stores have already aborted the transaction at this point
                if let Err(rollback_err) = self.store.rollback(&self.handle) {
                    debug!(error = %rollback_err, "rollback after failed commit");
                }
                Err(into_persistence("commit failed", err))
            }
        }
    }

    fn rollback(mut self) {
        self.finished = true;
        self.rollback_quietly();
    }

    fn rollback_quietly(&self) {
        match self.store.rollback(&self.handle) {
            Ok(()) => debug!("unit of work rolled back"),
            Err(err) => warn!(error = %err, "rollback failed"),
        }
    }
}

impl<S: TransactionalStore> Drop for RollbackGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("unit of work aborted while unwinding, rolling back");
            self.rollback_quietly();
        }
    }
}
