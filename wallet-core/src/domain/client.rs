//! Client domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;
use super::result::{Error, Result};

/// A person holding one or more accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Accounts owned by this client, in the order they were added
    pub accounts: Vec<Account>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Create a new client with a fresh ID
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let email = email.into();
        Self::validate(&name, &email)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            email,
            accounts: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace name and email, re-validating both
    ///
    /// Leaves the client untouched when validation fails.
    pub fn update(&mut self, name: impl Into<String>, email: impl Into<String>) -> Result<()> {
        let name = name.into();
        let email = email.into();
        Self::validate(&name, &email)?;

        self.name = name;
        self.email = email;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Attach an account created for this client
    pub fn add_account(&mut self, account: Account) -> Result<()> {
        if account.client_id != self.id {
            return Err(Error::validation(format!(
                "account {} belongs to another client",
                account.id
            )));
        }
        if self.accounts.iter().any(|a| a.id == account.id) {
            return Err(Error::validation(format!(
                "account {} is already attached to this client",
                account.id
            )));
        }
        self.accounts.push(account);
        Ok(())
    }

    fn validate(name: &str, email: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        if email.trim().is_empty() {
            return Err(Error::validation("email is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::ErrorKind;

    #[test]
    fn test_create_new_client() {
        let client = Client::new("John Doe", "j@j.com").unwrap();
        assert_eq!(client.name, "John Doe");
        assert_eq!(client.email, "j@j.com");
        assert!(client.accounts.is_empty());
    }

    #[test]
    fn test_create_new_client_when_args_are_invalid() {
        let err = Client::new("", "j@j.com").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(Client::new("John Doe", "   ").is_err());
    }

    #[test]
    fn test_update_client() {
        let mut client = Client::new("John Doe", "j@j.con").unwrap();
        client.update("John Doe Update", "j@j.com").unwrap();
        assert_eq!(client.name, "John Doe Update");
        assert_eq!(client.email, "j@j.com");
    }

    #[test]
    fn test_update_client_with_invalid_args() {
        let mut client = Client::new("John Doe", "j@j.con").unwrap();
        let err = client.update("", "j@j.com").unwrap_err();
        assert!(err.to_string().contains("name is required"));
        // Failed update leaves the client as it was
        assert_eq!(client.name, "John Doe");
        assert_eq!(client.email, "j@j.con");
    }

    #[test]
    fn test_add_account_to_client() {
        let mut client = Client::new("John Doe", "j@j").unwrap();
        let account = Account::new(&client);
        client.add_account(account).unwrap();
        assert_eq!(client.accounts.len(), 1);
    }

    #[test]
    fn test_add_account_rejects_foreign_and_duplicate_accounts() {
        let mut client = Client::new("John Doe", "j@j").unwrap();
        let other = Client::new("Jane Doe", "jane@j").unwrap();

        let foreign = Account::new(&other);
        assert!(client.add_account(foreign).is_err());

        let account = Account::new(&client);
        client.add_account(account.clone()).unwrap();
        assert!(client.add_account(account).is_err());
        assert_eq!(client.accounts.len(), 1);
    }
}
