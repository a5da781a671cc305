//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::client::Client;
use super::result::{Error, Result};
use super::transaction::MAX_AMOUNT;

/// A balance held by a client
///
/// `client_id` is a back-reference to the owner; the account does not own
/// the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub client_id: Uuid,
    /// Signed balance; how far below zero it may go is decided by
    /// [`OverdraftPolicy`] at transfer time
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an empty account bound to `client`
    pub fn new(client: &Client) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id: client.id,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `amount` to the balance
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        self.balance = self.balance_after(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Subtract `amount` from the balance
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        self.balance = self.balance_after(-amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Balance once `delta` is applied; fails when the result leaves
    /// `[-MAX_AMOUNT, MAX_AMOUNT]`
    pub fn balance_after(&self, delta: Decimal) -> Result<Decimal> {
        self.balance
            .checked_add(delta)
            .filter(|balance| balance.abs() <= MAX_AMOUNT)
            .ok_or_else(|| {
                Error::validation(format!(
                    "balance of account {} would exceed the maximum of {}",
                    self.id, MAX_AMOUNT
                ))
            })
    }
}

/// How far an account may be debited below zero
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum OverdraftPolicy {
    /// Balance must stay at or above zero
    #[default]
    Disallow,
    /// No floor at all
    Allow,
    /// Balance may go down to `-limit`
    Limit { limit: Decimal },
}

impl OverdraftPolicy {
    /// Whether `balance - amount` is acceptable under this policy
    ///
    /// An overflowing subtraction is never acceptable.
    pub fn permits(&self, balance: Decimal, amount: Decimal) -> bool {
        let Some(remaining) = balance.checked_sub(amount) else {
            return false;
        };
        match self {
            OverdraftPolicy::Disallow => remaining >= Decimal::ZERO,
            OverdraftPolicy::Allow => true,
            OverdraftPolicy::Limit { limit } => remaining >= -limit.abs(),
        }
    }

    /// Parse the compact form used by environment overrides:
    /// `allow`, `disallow`, or a decimal limit such as `50.00`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "allow" | "true" | "yes" => Some(OverdraftPolicy::Allow),
            "disallow" | "false" | "no" | "none" => Some(OverdraftPolicy::Disallow),
            other => other
                .parse::<Decimal>()
                .ok()
                .map(|limit| OverdraftPolicy::Limit { limit: limit.abs() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new("John Doe", "j@j.com").unwrap()
    }

    #[test]
    fn test_new_account_starts_empty() {
        let client = client();
        let account = Account::new(&client);
        assert_eq!(account.client_id, client.id);
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_credit_and_debit() {
        let mut account = Account::new(&client());
        account.credit(Decimal::new(10000, 2)).unwrap();
        account.debit(Decimal::new(2550, 2)).unwrap();
        assert_eq!(account.balance, Decimal::new(7450, 2));
    }

    #[test]
    fn test_balance_stays_within_bounds() {
        let mut account = Account::new(&client());
        account.credit(MAX_AMOUNT).unwrap();

        let err = account.credit(Decimal::ONE).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(account.balance, MAX_AMOUNT);

        account.debit(MAX_AMOUNT * Decimal::TWO).unwrap();
        assert_eq!(account.balance, -MAX_AMOUNT);
        assert!(account.debit(Decimal::new(1, 4)).is_err());
        assert!(account.balance_after(Decimal::MAX).is_err());
    }

    #[test]
    fn test_overflowing_debit_is_not_permitted() {
        assert!(!OverdraftPolicy::Allow.permits(Decimal::MIN, Decimal::MAX));
        assert!(!OverdraftPolicy::Limit { limit: Decimal::MAX }.permits(Decimal::MIN, Decimal::ONE));
    }

    #[test]
    fn test_overdraft_policies() {
        let ten = Decimal::new(10, 0);
        let twenty = Decimal::new(20, 0);

        assert!(OverdraftPolicy::Disallow.permits(ten, ten));
        assert!(!OverdraftPolicy::Disallow.permits(ten, twenty));
        assert!(OverdraftPolicy::Allow.permits(Decimal::ZERO, twenty));

        let limit = OverdraftPolicy::Limit { limit: ten };
        assert!(limit.permits(ten, twenty));
        assert!(!limit.permits(ten, twenty + Decimal::ONE));
    }

    #[test]
    fn test_parse_overdraft_policy() {
        assert_eq!(OverdraftPolicy::parse("allow"), Some(OverdraftPolicy::Allow));
        assert_eq!(OverdraftPolicy::parse(" Disallow "), Some(OverdraftPolicy::Disallow));
        assert_eq!(
            OverdraftPolicy::parse("50.00"),
            Some(OverdraftPolicy::Limit { limit: Decimal::new(5000, 2) })
        );
        assert_eq!(OverdraftPolicy::parse("sometimes"), None);
    }

    #[test]
    fn test_overdraft_policy_serde() {
        let json = serde_json::to_string(&OverdraftPolicy::Disallow).unwrap();
        assert_eq!(json, r#"{"mode":"disallow"}"#);

        let parsed: OverdraftPolicy =
            serde_json::from_str(r#"{"mode":"limit","limit":"25.5"}"#).unwrap();
        assert_eq!(parsed, OverdraftPolicy::Limit { limit: Decimal::new(255, 1) });
    }
}
