//! Resource and resource-operation abstractions
//!
//! Resources are opaque stateful entities owned by the embedding
//! application. The manager never locks them itself; it grants one
//! transaction at a time the right to touch a resource and relies on that
//! grant for exclusivity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

/// Opaque identity of a registered resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Create a resource identity from its numeric value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

/// A stateful entity protected by the manager.
///
/// Implementations keep their state behind interior mutability; operations
/// receive `&self` and the manager guarantees that at most one transaction
/// is applying operations to a given resource at any time.
pub trait Resource: Send + Sync + 'static {
    /// Identity under which this resource is registered
    fn id(&self) -> ResourceId;
}

/// A reversible unit of work against one resource.
///
/// Operations are value types (typically enums) cloned into the undo log
/// when they apply successfully. `undo` must exactly reverse a previously
/// successful `apply` and is assumed total: rollback never fails.
pub trait ResourceOperation: Clone + Debug + Send + Sync + 'static {
    /// Resource type this operation targets
    type Resource: Resource;

    /// Operation-specific failure reported by `apply`
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply the effect to the resource
    fn apply(&self, resource: &Self::Resource) -> Result<(), Self::Error>;

    /// Reverse a previously successful `apply`
    fn undo(&self, resource: &Self::Resource);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Counter {
        id: ResourceId,
        value: Mutex<i64>,
    }

    impl Resource for Counter {
        fn id(&self) -> ResourceId {
            self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Add(i64);

    #[derive(Debug, thiserror::Error)]
    #[error("add failed")]
    struct AddError;

    impl ResourceOperation for Add {
        type Resource = Counter;
        type Error = AddError;

        fn apply(&self, resource: &Counter) -> Result<(), AddError> {
            *resource.value.lock().unwrap() += self.0;
            Ok(())
        }

        fn undo(&self, resource: &Counter) {
            *resource.value.lock().unwrap() -= self.0;
        }
    }

    #[test]
    fn test_undo_reverses_apply() {
        let counter = Counter {
            id: ResourceId::new(1),
            value: Mutex::new(10),
        };

        let op = Add(5);
        op.apply(&counter).unwrap();
        assert_eq!(*counter.value.lock().unwrap(), 15);

        op.undo(&counter);
        assert_eq!(*counter.value.lock().unwrap(), 10);
    }

    #[test]
    fn test_resource_id_display() {
        assert_eq!(ResourceId::new(3).to_string(), "resource-3");
        assert!(ResourceId::new(1) < ResourceId::new(2));
    }
}
