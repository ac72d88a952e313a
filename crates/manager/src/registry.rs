//! Immutable lookup from resource identity to resource instance

use corral_common::{Resource, ResourceId};
use parking_lot::Condvar;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered resource plus the condition its waiters block on.
///
/// The condvar is bound to the manager's coordination mutex; waiters for
/// different resources park on different condvars so a release only wakes
/// the transactions that care.
pub struct ResourceSlot<R> {
    resource: Arc<R>,
    available: Condvar,
}

impl<R> ResourceSlot<R> {
    /// The registered resource instance
    pub fn resource(&self) -> &Arc<R> {
        &self.resource
    }

    pub(crate) fn available(&self) -> &Condvar {
        &self.available
    }
}

/// Registry of the resources under management, fixed at construction.
///
/// Never mutated afterwards, so concurrent reads need no synchronization.
pub struct ResourceRegistry<R> {
    slots: HashMap<ResourceId, ResourceSlot<R>>,
}

impl<R: Resource> ResourceRegistry<R> {
    /// Build the registry from the initial resource collection.
    ///
    /// Duplicate ids keep the last instance, as in a plain map build.
    pub fn new(resources: impl IntoIterator<Item = R>) -> Self {
        let slots = resources
            .into_iter()
            .map(|r| {
                (
                    r.id(),
                    ResourceSlot {
                        resource: Arc::new(r),
                        available: Condvar::new(),
                    },
                )
            })
            .collect();
        Self { slots }
    }

    /// Look up a resource slot by identity
    pub fn get(&self, rid: ResourceId) -> Option<&ResourceSlot<R>> {
        self.slots.get(&rid)
    }

    /// Check whether an identity is registered
    pub fn contains(&self, rid: ResourceId) -> bool {
        self.slots.contains_key(&rid)
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
