//! Create-transaction use case - moves funds between two accounts

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::parse_id;
use crate::context::ExecutionContext;
use crate::domain::result::{Error, ErrorKind, Result};
use crate::domain::{check_amount, OverdraftPolicy, Transaction};
use crate::events::{EventDispatcher, TransactionCreated};
use crate::ports::TransactionalStore;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionInput {
    pub account_id_from: String,
    pub account_id_to: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionOutput {
    pub id: Uuid,
    pub account_id_from: Uuid,
    pub account_id_to: Uuid,
    pub amount: Decimal,
}

impl From<&Transaction> for CreateTransactionOutput {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id,
            account_id_from: transaction.account_id_from,
            account_id_to: transaction.account_id_to,
            amount: transaction.amount,
        }
    }
}

/// How far a transfer got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Started,
    AccountsFetched,
    TransferComputed,
    Persisted,
    Committed,
    EventDispatched,
    Failed,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStage::Started => "started",
            TransferStage::AccountsFetched => "accounts_fetched",
            TransferStage::TransferComputed => "transfer_computed",
            TransferStage::Persisted => "persisted",
            TransferStage::Committed => "committed",
            TransferStage::EventDispatched => "event_dispatched",
            TransferStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Transfers funds atomically and announces the result
pub struct CreateTransactionUseCase<S: TransactionalStore> {
    uow: Arc<UnitOfWork<S>>,
    dispatcher: Arc<EventDispatcher>,
    policy: OverdraftPolicy,
}

impl<S: TransactionalStore> CreateTransactionUseCase<S> {
    pub fn new(
        uow: Arc<UnitOfWork<S>>,
        dispatcher: Arc<EventDispatcher>,
        policy: OverdraftPolicy,
    ) -> Self {
        Self {
            uow,
            dispatcher,
            policy,
        }
    }

    pub fn policy(&self) -> &OverdraftPolicy {
        &self.policy
    }

    /// Move `input.amount` from one account to another
    ///
    /// Both balance updates and the transaction record commit together or
    /// not at all. `TransactionCreated` is dispatched only after the commit
    /// succeeded; listener failures are logged and do not fail the call.
    pub fn execute(
        &self,
        ctx: &ExecutionContext,
        input: CreateTransactionInput,
    ) -> Result<CreateTransactionOutput> {
        let (from_id, to_id) = validate(&input).inspect_err(|err| {
            log_failure(TransferStage::Started, err);
        })?;

        let mut stage = TransferStage::Started;
        let outcome = self.uow.run(ctx, |scope| {
            let accounts = scope.accounts()?;
            let mut from = accounts.find_by_id(from_id)?;
            let mut to = accounts.find_by_id(to_id)?;
            stage = TransferStage::AccountsFetched;

            scope.context().check()?;
            let transaction = Transaction::new(&mut from, &mut to, input.amount, &self.policy)?;
            stage = TransferStage::TransferComputed;

            accounts.update_balance(&from)?;
            accounts.update_balance(&to)?;
            scope.transactions()?.create(&transaction)?;
            stage = TransferStage::Persisted;

            Ok(CreateTransactionOutput::from(&transaction))
        });

        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                log_failure(stage, &err);
                return Err(err);
            }
        };
        debug!(
            stage = %TransferStage::Committed,
            transaction_id = %output.id,
            amount = %output.amount,
            "transfer committed"
        );

        let report = self.dispatcher.dispatch(&TransactionCreated::new(output.clone()));
        for failure in &report.failures {
            warn!(transaction_id = %output.id, error = %failure, "event listener failed");
        }
        debug!(
            stage = %TransferStage::EventDispatched,
            transaction_id = %output.id,
            delivered = report.delivered,
            failed = report.failures.len(),
            "transfer announced"
        );

        Ok(output)
    }
}

/// Checks that never need storage; nothing is opened when these fail
fn validate(input: &CreateTransactionInput) -> Result<(Uuid, Uuid)> {
    let from_id = parse_id(&input.account_id_from, "source account")?;
    let to_id = parse_id(&input.account_id_to, "destination account")?;
    if from_id == to_id {
        return Err(Error::validation(
            "source and destination accounts must be different",
        ));
    }
    if input.amount <= Decimal::ZERO {
        return Err(Error::validation("amount must be greater than zero"));
    }
    check_amount(input.amount)?;
    Ok((from_id, to_id))
}

fn log_failure(failed_at: TransferStage, err: &Error) {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Cancelled => info!(
            stage = %TransferStage::Failed,
            %failed_at,
            kind = %err.kind(),
            error = %err,
            "transfer rejected"
        ),
        ErrorKind::Persistence | ErrorKind::Configuration => warn!(
            stage = %TransferStage::Failed,
            %failed_at,
            kind = %err.kind(),
            error = %err,
            "transfer failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(from: &str, to: &str, amount: Decimal) -> CreateTransactionInput {
        CreateTransactionInput {
            account_id_from: from.to_string(),
            account_id_to: to.to_string(),
            amount,
        }
    }

    #[test]
    fn test_validate_rejects_malformed_ids() {
        let good = Uuid::new_v4().to_string();
        let err = validate(&input("not-a-uuid", &good, Decimal::ONE)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("source account"));

        let err = validate(&input(&good, "", Decimal::ONE)).unwrap_err();
        assert!(err.to_string().contains("destination account"));
    }

    #[test]
    fn test_validate_rejects_same_account_and_bad_amounts() {
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();

        assert!(validate(&input(&a, &a, Decimal::ONE)).is_err());
        assert!(validate(&input(&a, &b, Decimal::ZERO)).is_err());
        assert!(validate(&input(&a, &b, Decimal::new(-1, 0))).is_err());
        assert!(validate(&input(&a, &b, Decimal::new(1, 6))).is_err());
        assert!(validate(&input(&a, &b, Decimal::new(4000, 2))).is_ok());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(TransferStage::AccountsFetched.to_string(), "accounts_fetched");
        assert_eq!(TransferStage::EventDispatched.to_string(), "event_dispatched");
    }
}
