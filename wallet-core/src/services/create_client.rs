//! Create-client use case

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::domain::result::Result;
use crate::domain::Client;
use crate::ports::TransactionalStore;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClientInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClientOutput {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

pub struct CreateClientUseCase<S: TransactionalStore> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStore> CreateClientUseCase<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    pub fn execute(&self, ctx: &ExecutionContext, input: CreateClientInput) -> Result<CreateClientOutput> {
        // Validate before touching storage
        let client = Client::new(input.name, input.email)?;

        self.uow.run(ctx, |scope| scope.clients()?.save(&client))?;
        debug!(client_id = %client.id, "client created");

        Ok(CreateClientOutput {
            id: client.id,
            name: client.name,
            email: client.email,
            created_at: client.created_at,
        })
    }
}
