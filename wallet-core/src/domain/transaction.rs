//! Transaction domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::{Account, OverdraftPolicy};
use super::result::{Error, Result};

/// Decimal places money is stored with
pub const MONEY_SCALE: u32 = 4;

/// Largest magnitude an amount or balance may have (fits `DECIMAL(18, 4)`)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 4);

/// Fail when `amount` carries more decimal places than [`MONEY_SCALE`]
pub fn check_scale(amount: Decimal) -> Result<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(Error::validation(format!(
            "amount {} has more than {} decimal places",
            amount, MONEY_SCALE
        )));
    }
    Ok(())
}

/// Fail when `amount` cannot be stored: too many decimal places or beyond
/// [`MAX_AMOUNT`]
pub fn check_amount(amount: Decimal) -> Result<()> {
    check_scale(amount)?;
    if amount.abs() > MAX_AMOUNT {
        return Err(Error::validation(format!(
            "amount {} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// A completed movement of funds between two accounts
///
/// Holds the two account IDs only; it records the movement and does not own
/// either account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id_from: Uuid,
    pub account_id_to: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Move `amount` from `from` to `to` and return the record of it
    ///
    /// Every check runs before either balance is touched, so on error both
    /// accounts are exactly as they were passed in.
    pub fn new(
        from: &mut Account,
        to: &mut Account,
        amount: Decimal,
        policy: &OverdraftPolicy,
    ) -> Result<Self> {
        if from.id == to.id {
            return Err(Error::validation(
                "source and destination accounts must be different",
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(Error::validation("amount must be greater than zero"));
        }
        check_amount(amount)?;
        if !policy.permits(from.balance, amount) {
            return Err(Error::InsufficientFunds {
                account_id: from.id,
                balance: from.balance,
                requested: amount,
            });
        }

        from.balance_after(-amount)?;
        to.balance_after(amount)?;
        from.debit(amount)?;
        to.credit(amount)?;

        Ok(Self {
            id: Uuid::new_v4(),
            account_id_from: from.id,
            account_id_to: to.id,
            amount,
            created_at: Utc::now(),
        })
    }

    /// Signed effect of this transaction on `account_id`
    pub fn effect_on(&self, account_id: Uuid) -> Decimal {
        if account_id == self.account_id_from {
            -self.amount
        } else if account_id == self.account_id_to {
            self.amount
        } else {
            Decimal::ZERO
        }
    }
}
