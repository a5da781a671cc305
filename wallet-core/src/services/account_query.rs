//! Read-side queries over clients, accounts and their transactions

use std::sync::Arc;

use super::parse_id;
use crate::context::ExecutionContext;
use crate::domain::result::Result;
use crate::domain::{Account, Client, Transaction};
use crate::ports::TransactionalStore;
use crate::uow::UnitOfWork;

/// Query service for operator-facing views
///
/// Every call runs in its own unit of work and writes nothing.
pub struct AccountQueryService<S: TransactionalStore> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStore> AccountQueryService<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    /// Current state of an account, balance included
    pub fn get_account(&self, ctx: &ExecutionContext, account_id: &str) -> Result<Account> {
        let id = parse_id(account_id, "account")?;
        self.uow.run(ctx, |scope| scope.accounts()?.find_by_id(id))
    }

    /// A client together with every account it owns
    pub fn get_client(&self, ctx: &ExecutionContext, client_id: &str) -> Result<Client> {
        let id = parse_id(client_id, "client")?;
        self.uow.run(ctx, |scope| {
            let mut client = scope.clients()?.get(id)?;
            for account in scope.accounts()?.find_by_client(id)? {
                client.add_account(account)?;
            }
            Ok(client)
        })
    }

    /// Transactions touching an account, newest first
    pub fn history(&self, ctx: &ExecutionContext, account_id: &str) -> Result<Vec<Transaction>> {
        let id = parse_id(account_id, "account")?;
        self.uow.run(ctx, |scope| {
            // NotFound for unknown accounts rather than an empty list
            scope.accounts()?.find_by_id(id)?;
            scope.transactions()?.find_by_account(id)
        })
    }
}
