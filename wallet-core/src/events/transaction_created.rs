//! Event announcing a committed transfer

use chrono::{DateTime, Utc};

use super::Event;
use crate::services::CreateTransactionOutput;

/// Raised once a transfer has been committed
#[derive(Debug, Clone)]
pub struct TransactionCreated {
    output: CreateTransactionOutput,
    occurred_at: DateTime<Utc>,
}

impl TransactionCreated {
    pub const NAME: &'static str = "TransactionCreated";

    pub fn new(output: CreateTransactionOutput) -> Self {
        Self {
            output,
            occurred_at: Utc::now(),
        }
    }

    pub fn output(&self) -> &CreateTransactionOutput {
        &self.output
    }
}

impl Event for TransactionCreated {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.output).unwrap_or(serde_json::Value::Null)
    }
}
