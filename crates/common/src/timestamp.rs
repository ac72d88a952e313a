//! Physical timestamps (microseconds since Unix epoch)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Physical timestamp in microseconds since the Unix epoch.
///
/// Only relative order is meaningful to the manager: transactions are
/// compared by start time when a deadlock victim is chosen, never by
/// wall-clock value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time in microseconds
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        Self(micros)
    }

    /// Create from a microsecond count
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Get the microsecond count
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Timestamp advanced by the given number of microseconds
    pub fn add_micros(&self, micros: u64) -> Self {
        Self(self.0.saturating_add(micros))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}
