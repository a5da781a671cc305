//! Domain event notification
//!
//! Events are immutable values built right before dispatch. Handlers are
//! registered per event name on an [`EventDispatcher`] owned by the
//! composition root, and run synchronously on the dispatching thread in
//! registration order.

mod transaction_created;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::domain::result::{Error, Result};

pub use transaction_created::TransactionCreated;

/// Something that happened and has been durably recorded
pub trait Event: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
    fn payload(&self) -> serde_json::Value;
}

/// A listener for events of one or more names
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &dyn Event) -> anyhow::Result<()>;
}

/// Outcome of a single dispatch
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Handlers that returned `Ok`
    pub delivered: usize,
    /// Errors from handlers that failed, in dispatch order
    pub failures: Vec<anyhow::Error>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Routes events to the handlers registered for their name
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events called `event_name`
    ///
    /// Registering the same handler instance twice for one name is an error.
    pub fn register(&self, event_name: &str, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut handlers = self.write()?;
        let list = handlers.entry(event_name.to_string()).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return Err(Error::validation(format!(
                "handler already registered for '{}'",
                event_name
            )));
        }
        list.push(handler);
        Ok(())
    }

    /// Whether `handler` is registered for `event_name`
    pub fn has(&self, event_name: &str, handler: &Arc<dyn EventHandler>) -> bool {
        self.handlers
            .read()
            .map(|handlers| {
                handlers
                    .get(event_name)
                    .is_some_and(|list| list.iter().any(|h| Arc::ptr_eq(h, handler)))
            })
            .unwrap_or(false)
    }

    /// Unregister `handler` from `event_name`; returns whether it was registered
    pub fn remove(&self, event_name: &str, handler: &Arc<dyn EventHandler>) -> Result<bool> {
        let mut handlers = self.write()?;
        let Some(list) = handlers.get_mut(event_name) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        Ok(list.len() != before)
    }

    /// Drop every registration
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    /// Number of handlers registered for `event_name`
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers
            .read()
            .map(|handlers| handlers.get(event_name).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Deliver `event` to every handler registered for its name
    ///
    /// A failing handler does not stop the ones after it.
    pub fn dispatch(&self, event: &dyn Event) -> DispatchReport {
        // Snapshot so handlers may (un)register without deadlocking
        let handlers: Vec<Arc<dyn EventHandler>> = match self.handlers.read() {
            Ok(map) => map.get(event.name()).cloned().unwrap_or_default(),
            Err(poisoned) => poisoned.into_inner().get(event.name()).cloned().unwrap_or_default(),
        };

        let mut report = DispatchReport::default();
        for handler in handlers {
            match handler.handle(event) {
                Ok(()) => report.delivered += 1,
                Err(err) => report.failures.push(err),
            }
        }
        report
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Arc<dyn EventHandler>>>>> {
        self.handlers
            .write()
            .map_err(|e| Error::configuration(format!("Lock poisoned: {}", e)))
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .handlers
            .read()
            .map(|handlers| handlers.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("EventDispatcher").field("events", &names).finish()
    }
}
