//! Common fixtures for integration tests

use corral_common::{ManualClock, Resource, ResourceId, ResourceOperation, Timestamp};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Integer register protected by the manager
pub struct Register {
    id: ResourceId,
    value: Mutex<i64>,
}

impl Register {
    pub fn new(id: u64, value: i64) -> Self {
        Self {
            id: ResourceId::new(id),
            value: Mutex::new(value),
        }
    }

    #[allow(dead_code)]
    pub fn value(&self) -> i64 {
        *self.value.lock()
    }
}

impl Resource for Register {
    fn id(&self) -> ResourceId {
        self.id
    }
}

/// Reversible operations on a register
#[derive(Debug, Clone)]
pub enum RegisterOp {
    /// Add to the register; undone by subtracting
    Add(i64),
    /// Fail without touching the register
    Reject,
    /// Increment the register while checking that no other transaction is
    /// inside the critical section at the same time
    Occupy {
        busy: Arc<AtomicBool>,
        hold: Duration,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("operation rejected")]
    Rejected,
    #[error("two transactions inside the critical section")]
    Overlap,
}

impl ResourceOperation for RegisterOp {
    type Resource = Register;
    type Error = RegisterError;

    fn apply(&self, resource: &Register) -> Result<(), RegisterError> {
        match self {
            RegisterOp::Add(n) => {
                *resource.value.lock() += n;
                Ok(())
            }
            RegisterOp::Reject => Err(RegisterError::Rejected),
            RegisterOp::Occupy { busy, hold } => {
                if busy.swap(true, Ordering::SeqCst) {
                    return Err(RegisterError::Overlap);
                }
                std::thread::sleep(*hold);
                *resource.value.lock() += 1;
                busy.store(false, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn undo(&self, resource: &Register) {
        match self {
            RegisterOp::Add(n) => *resource.value.lock() -= n,
            RegisterOp::Reject => {}
            RegisterOp::Occupy { .. } => *resource.value.lock() -= 1,
        }
    }
}

/// Registers with ids `1..=n`, all starting at zero
#[allow(dead_code)]
pub fn registers(n: u64) -> Vec<Register> {
    (1..=n).map(|i| Register::new(i, 0)).collect()
}

/// Clock frozen at a fixed instant; drive it with `advance` when start
/// order matters
#[allow(dead_code)]
pub fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at(Timestamp::from_micros(1)))
}

#[allow(dead_code)]
pub fn rid(n: u64) -> ResourceId {
    ResourceId::new(n)
}
