//! Create-account use case - opens an account for an existing client

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::parse_id;
use crate::context::ExecutionContext;
use crate::domain::result::{Error, Result};
use crate::domain::{check_amount, Account};
use crate::ports::TransactionalStore;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccountInput {
    pub client_id: String,
    /// Opening deposit; zero when absent
    #[serde(default)]
    pub initial_balance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccountOutput {
    pub id: Uuid,
    pub client_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

pub struct CreateAccountUseCase<S: TransactionalStore> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStore> CreateAccountUseCase<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    pub fn execute(&self, ctx: &ExecutionContext, input: CreateAccountInput) -> Result<CreateAccountOutput> {
        let client_id = parse_id(&input.client_id, "client")?;
        let deposit = input.initial_balance.unwrap_or(Decimal::ZERO);
        if deposit < Decimal::ZERO {
            return Err(Error::validation("initial balance cannot be negative"));
        }
        check_amount(deposit)?;

        let account = self.uow.run(ctx, |scope| {
            let mut client = scope.clients()?.get(client_id)?;

            let mut account = Account::new(&client);
            if deposit > Decimal::ZERO {
                account.credit(deposit)?;
            }
            client.add_account(account.clone())?;

            scope.accounts()?.save(&account)?;
            Ok(account)
        })?;
        debug!(account_id = %account.id, client_id = %account.client_id, "account created");

        Ok(CreateAccountOutput {
            id: account.id,
            client_id: account.client_id,
            balance: account.balance,
            created_at: account.created_at,
        })
    }
}
