//! Transaction entity and status machine

use crate::access_log::AccessLog;
use corral_common::{ClientId, Resource, ResourceId, ResourceOperation, Timestamp, TransactionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle status of a transaction.
///
/// Every transition out of `Active` is a one-way latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Accepting operations
    Active,
    /// Finished successfully; all effects kept
    Committed,
    /// Finished by undoing all effects
    RolledBack,
    /// Force-aborted by deadlock resolution; awaiting rollback
    Aborted,
}

/// Why a transaction was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Chosen as deadlock victim. `by` is the transaction whose blocked
    /// acquisition exposed the cycle; it is the victim itself when the
    /// victim lost on its own acquisition.
    Wounded { by: TransactionId },
}

struct StatusSlot {
    status: TransactionStatus,
    abort_reason: Option<AbortReason>,
}

/// One caller's unit of work.
///
/// Owned by the caller that began it: apart from status reads, only the
/// owning caller's thread touches a transaction. The single exception is
/// the self-abort a deadlock victim performs on its own thread after being
/// woken, which still runs on the owner side of the blocked call.
pub struct Transaction<O: ResourceOperation> {
    id: TransactionId,
    client: ClientId,
    start_time: Timestamp,
    status: Mutex<StatusSlot>,
    accessed: Mutex<Vec<AccessLog<O>>>,
}

impl<O: ResourceOperation> Transaction<O> {
    pub(crate) fn new(id: TransactionId, client: ClientId, start_time: Timestamp) -> Self {
        Self {
            id,
            client,
            start_time,
            status: Mutex::new(StatusSlot {
                status: TransactionStatus::Active,
                abort_reason: None,
            }),
            accessed: Mutex::new(Vec::new()),
        }
    }

    /// Token identifying this transaction
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Caller that owns this transaction
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Start time used for deadlock victim ordering
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status.lock().status
    }

    /// Whether the transaction has been force-aborted
    pub fn is_aborted(&self) -> bool {
        self.status() == TransactionStatus::Aborted
    }

    /// Whether the transaction has committed
    pub fn is_committed(&self) -> bool {
        self.status() == TransactionStatus::Committed
    }

    /// Why the transaction was aborted, if it was
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.status.lock().abort_reason
    }

    /// Identities of all resources acquired so far, in acquisition order
    pub fn accessed_resources(&self) -> Vec<ResourceId> {
        self.accessed.lock().iter().map(|log| log.resource_id()).collect()
    }

    /// Whether this transaction has acquired `rid`
    pub fn has_accessed(&self, rid: ResourceId) -> bool {
        self.accessed.lock().iter().any(|log| log.resource_id() == rid)
    }

    pub(crate) fn set_aborted(&self, reason: AbortReason) {
        let mut slot = self.status.lock();
        if slot.status == TransactionStatus::Active {
            slot.status = TransactionStatus::Aborted;
            slot.abort_reason = Some(reason);
        }
    }

    pub(crate) fn set_committed(&self) {
        let mut slot = self.status.lock();
        if slot.status == TransactionStatus::Active {
            slot.status = TransactionStatus::Committed;
        }
    }

    /// Latch into `RolledBack` from `Active` or `Aborted`.
    ///
    /// Returns false if the transaction is committed or a rollback already
    /// won, making double rollback a no-op.
    pub(crate) fn set_rolled_back(&self) -> bool {
        let mut slot = self.status.lock();
        match slot.status {
            TransactionStatus::Active | TransactionStatus::Aborted => {
                slot.status = TransactionStatus::RolledBack;
                true
            }
            TransactionStatus::Committed | TransactionStatus::RolledBack => false,
        }
    }

    /// Register a fresh access log for a newly acquired resource.
    ///
    /// Called exactly once per resource per transaction, at acquisition.
    pub(crate) fn add_resource(&self, resource: Arc<O::Resource>) {
        let mut accessed = self.accessed.lock();
        debug_assert!(!accessed.iter().any(|log| log.resource_id() == resource.id()));
        accessed.push(AccessLog::new(resource));
    }

    /// Apply `op` through the access log of `rid`.
    ///
    /// The resource must have been acquired first; `operate` guarantees it.
    pub(crate) fn apply(&self, rid: ResourceId, op: O) -> Result<(), O::Error> {
        let mut accessed = self.accessed.lock();
        let log = accessed
            .iter_mut()
            .find(|log| log.resource_id() == rid)
            .unwrap();
        log.apply(op)
    }

    /// Undo every logged operation on every accessed resource.
    ///
    /// Order across resources is unspecified; within one resource the log
    /// is replayed strictly newest-first.
    pub(crate) fn roll_back(&self) {
        let accessed = self.accessed.lock();
        for log in accessed.iter() {
            log.roll_back_all();
        }
    }
}
