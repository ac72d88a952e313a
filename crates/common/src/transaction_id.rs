//! Transaction tokens using UUIDv7

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token identifying one transaction.
///
/// Returned by `begin` and presented back on every subsequent call, which
/// keeps the manager independent of any ambient notion of "current caller".
/// The token carries identity only; deadlock victim ordering uses the
/// transaction's start time and client identity, never the token value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh token
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID (for testing/deserialization)
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_eq_consistency() {
        use std::collections::HashMap;

        let id1 = TransactionId::new();
        let id2 = id1;

        let mut map = HashMap::new();
        map.insert(id1, "value");

        assert_eq!(map.get(&id2), Some(&"value"));
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::now_v7();
        let txn_id = TransactionId::from_uuid(uuid);
        assert_eq!(txn_id.as_uuid(), &uuid);
    }
}
