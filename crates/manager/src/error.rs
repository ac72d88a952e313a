//! Error types for the transaction manager

use corral_common::{ClientId, ResourceId, TransactionId};
use thiserror::Error;

/// Result type for manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported through the manager's public contract.
///
/// None of these are fatal to the process. An `Aborted` error leaves the
/// transaction in aborted status; the caller recovers by rolling back,
/// which is always safe. An `Operation` error changes nothing about the
/// transaction and the caller decides whether to retry or roll back.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} already has an active transaction")]
    AlreadyActive(ClientId),

    #[error("no active transaction for token {0}")]
    NoActiveTransaction(TransactionId),

    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("transaction {0} has been aborted")]
    Aborted(TransactionId),

    #[error("operation failed on {rid}: {source}")]
    Operation {
        rid: ResourceId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("transaction {0} was interrupted")]
    Interrupted(TransactionId),
}
