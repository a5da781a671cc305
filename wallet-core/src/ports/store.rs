//! Storage port - physical transaction boundaries

use crate::domain::result::Result;

/// A store able to open, commit and roll back transactions
///
/// Each `Handle` is one physical transaction. The unit of work owns a handle
/// for the duration of a single `run` and never shares it across threads.
pub trait TransactionalStore: Send + Sync {
    /// Transaction handle repositories are bound to
    type Handle: 'static;

    /// Begin a new transaction
    fn begin(&self) -> Result<Self::Handle>;

    /// Make every write done through `handle` durable and visible
    fn commit(&self, handle: &Self::Handle) -> Result<()>;

    /// Discard every write done through `handle`
    fn rollback(&self, handle: &Self::Handle) -> Result<()>;
}
