//! In-process transaction manager
//!
//! Callers begin a transaction, operate on registered resources under
//! transaction-long exclusive access, and finish by committing or rolling
//! back. A transaction acquires a resource on first touch; if the resource
//! is held, the caller blocks until it frees up. Circular waits are
//! detected at block time and resolved by force-aborting the newest cycle
//! member, whose only obligation afterwards is to roll back.
//!
//! The manager is a single-process coordinator: nothing is persisted and
//! all state is lost on exit.

mod access_log;
mod error;
mod manager;
mod registry;
mod transaction;

pub use access_log::AccessLog;
pub use error::{Error, Result};
pub use manager::TransactionManager;
pub use registry::{ResourceRegistry, ResourceSlot};
pub use transaction::{AbortReason, Transaction, TransactionStatus};
