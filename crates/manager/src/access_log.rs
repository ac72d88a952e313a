//! Per-resource undo log
//!
//! Each transaction keeps one `AccessLog` per resource it has acquired:
//! the resource handle plus the operations that applied successfully, in
//! call order. Rollback replays the log newest-first.

use corral_common::{Resource, ResourceId, ResourceOperation};
use std::sync::Arc;

/// Record of one transaction's executed operations on one resource
pub struct AccessLog<O: ResourceOperation> {
    resource: Arc<O::Resource>,
    ops: Vec<O>,
}

impl<O: ResourceOperation> AccessLog<O> {
    pub(crate) fn new(resource: Arc<O::Resource>) -> Self {
        Self {
            resource,
            ops: Vec::new(),
        }
    }

    /// Identity of the logged resource
    pub fn resource_id(&self) -> ResourceId {
        self.resource.id()
    }

    /// Number of recorded operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether any operation has been recorded
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply `op` to the resource and record it.
    ///
    /// A failed apply is propagated and not recorded; only operations that
    /// actually took effect are undoable.
    pub(crate) fn apply(&mut self, op: O) -> Result<(), O::Error> {
        op.apply(&self.resource)?;
        self.ops.push(op);
        Ok(())
    }

    /// Undo every recorded operation, most recent first
    pub(crate) fn roll_back_all(&self) {
        for op in self.ops.iter().rev() {
            op.undo(&self.resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Journal {
        id: ResourceId,
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn new() -> Self {
            Self {
                id: ResourceId::new(1),
                entries: Mutex::new(Vec::new()),
            }
        }
    }

    impl Resource for Journal {
        fn id(&self) -> ResourceId {
            self.id
        }
    }

    #[derive(Debug, Clone)]
    enum JournalOp {
        Append(&'static str),
        Reject,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("rejected")]
    struct Rejected;

    impl ResourceOperation for JournalOp {
        type Resource = Journal;
        type Error = Rejected;

        fn apply(&self, resource: &Journal) -> Result<(), Rejected> {
            match self {
                JournalOp::Append(tag) => {
                    resource.entries.lock().push(format!("do:{tag}"));
                    Ok(())
                }
                JournalOp::Reject => Err(Rejected),
            }
        }

        fn undo(&self, resource: &Journal) {
            if let JournalOp::Append(tag) = self {
                resource.entries.lock().push(format!("undo:{tag}"));
            }
        }
    }

    #[test]
    fn test_only_successful_operations_are_recorded() {
        let mut log = AccessLog::new(Arc::new(Journal::new()));

        log.apply(JournalOp::Append("a")).unwrap();
        assert!(log.apply(JournalOp::Reject).is_err());
        log.apply(JournalOp::Append("b")).unwrap();

        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_roll_back_all_is_lifo() {
        let resource = Arc::new(Journal::new());
        let mut log = AccessLog::new(resource.clone());

        log.apply(JournalOp::Append("a")).unwrap();
        log.apply(JournalOp::Append("b")).unwrap();
        log.apply(JournalOp::Append("c")).unwrap();
        log.roll_back_all();

        let entries = resource.entries.lock();
        assert_eq!(
            *entries,
            vec!["do:a", "do:b", "do:c", "undo:c", "undo:b", "undo:a"]
        );
    }

    #[test]
    fn test_empty_log_rolls_back_to_nothing() {
        let resource = Arc::new(Journal::new());
        let log = AccessLog::<JournalOp>::new(resource.clone());

        assert!(log.is_empty());
        log.roll_back_all();
        assert!(resource.entries.lock().is_empty());
    }
}
