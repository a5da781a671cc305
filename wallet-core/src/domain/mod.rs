//! Core domain entities
//!
//! Pure data structures with their invariants - no I/O or external dependencies.

mod account;
mod client;
mod transaction;
pub mod result;

pub use account::{Account, OverdraftPolicy};
pub use client::Client;
pub use transaction::{check_amount, check_scale, Transaction, MAX_AMOUNT, MONEY_SCALE};
