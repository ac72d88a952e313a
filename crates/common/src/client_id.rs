//! Caller identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a caller.
///
/// Each caller presents its identity to `begin` and may own at most one
/// live transaction at a time. The numeric value participates in deadlock
/// victim selection: when two cycle members share a start time, the one
/// with the larger identity loses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClientId(u64);

impl ClientId {
    /// Create a client identity from its numeric value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ClientId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_numeric_value() {
        assert!(ClientId::new(2) > ClientId::new(1));
        assert_eq!(ClientId::new(7), ClientId::from(7));
    }

    #[test]
    fn test_display() {
        assert_eq!(ClientId::new(42).to_string(), "client-42");
    }
}
