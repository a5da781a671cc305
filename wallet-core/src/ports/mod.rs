//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The use cases
//! depend only on these traits, not on concrete implementations.

mod repository;
mod store;

pub use repository::{AccountRepository, ClientRepository, TransactionRepository};
pub use store::TransactionalStore;
