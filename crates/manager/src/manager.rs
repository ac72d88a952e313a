//! Transaction manager: holder bookkeeping, blocking, and deadlock resolution
//!
//! All coordination state lives behind one mutex. Waiters park on the
//! per-resource condvars in the registry, each bound to that mutex, so a
//! release wakes exactly the transactions queued on the freed resource.
//! Operation execution and rollback run outside the mutex: once a
//! transaction holds a resource, holdership alone guarantees exclusivity
//! until the transaction terminates.

use crate::error::{Error, Result};
use crate::registry::{ResourceRegistry, ResourceSlot};
use crate::transaction::{AbortReason, Transaction, TransactionStatus};
use corral_common::{ClientId, Clock, ResourceId, ResourceOperation, TransactionId};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A blocked transaction's wait-for edge: the resource it wants and the
/// transaction it believes is holding it.
#[derive(Debug, Clone, Copy)]
struct WaitEdge {
    on: ResourceId,
    for_txn: TransactionId,
}

/// Coordination state guarded by the manager's mutex.
struct CoordState<O: ResourceOperation> {
    /// Live transactions by token, including force-aborted ones awaiting
    /// rollback
    live: HashMap<TransactionId, Arc<Transaction<O>>>,

    /// The one live transaction of each caller
    active: HashMap<ClientId, TransactionId>,

    /// Current holder of each resource; absent means free
    holders: HashMap<ResourceId, TransactionId>,

    /// Wait-for edges, present while a transaction is blocked. A wounded
    /// victim's edge is removed by the resolver, so between any two edge
    /// insertions the graph is acyclic.
    waiting: HashMap<TransactionId, WaitEdge>,

    /// Pending forced aborts: victim to the transaction that wounded it.
    /// Set and consumed under the coordination mutex, one entry per
    /// victim, so a wound can neither be lost nor misattributed.
    wounded: HashMap<TransactionId, TransactionId>,

    /// Pending external cancellations
    interrupted: HashSet<TransactionId>,
}

impl<O: ResourceOperation> CoordState<O> {
    fn new() -> Self {
        Self {
            live: HashMap::new(),
            active: HashMap::new(),
            holders: HashMap::new(),
            waiting: HashMap::new(),
            wounded: HashMap::new(),
            interrupted: HashSet::new(),
        }
    }

    fn wait_target(&self, id: TransactionId) -> Option<TransactionId> {
        self.waiting.get(&id).map(|edge| edge.for_txn)
    }

    /// Two-pointer chase over the wait-for chain from `start`.
    ///
    /// Every node has at most one outgoing edge, so the chain either ends
    /// (no cycle reachable from `start`) or the pointers meet inside a
    /// cycle after finitely many steps.
    fn in_cycle(&self, start: TransactionId) -> bool {
        let mut slow = start;
        let mut fast = start;
        loop {
            fast = match self.wait_target(fast) {
                Some(next) => next,
                None => return false,
            };
            fast = match self.wait_target(fast) {
                Some(next) => next,
                None => return false,
            };
            slow = match self.wait_target(slow) {
                Some(next) => next,
                None => return false,
            };
            if slow == fast {
                return true;
            }
        }
    }

    /// Walk the cycle `start` is on and pick the victim: latest start
    /// time, ties broken by the larger client identity.
    fn newest_in_cycle(&self, start: &Arc<Transaction<O>>) -> TransactionId {
        let mut newest = Arc::clone(start);
        let mut cur_id = self.waiting[&start.id()].for_txn;
        while cur_id != start.id() {
            let cur = &self.live[&cur_id];
            if (cur.start_time(), cur.client()) > (newest.start_time(), newest.client()) {
                newest = Arc::clone(cur);
            }
            cur_id = self.waiting[&cur_id].for_txn;
        }
        newest.id()
    }
}

/// Coordinates mutually exclusive, rollback-capable access to a fixed set
/// of resources for concurrently executing callers.
///
/// `begin` hands out a token; `operate`, `commit`, and `rollback` take it
/// back, so the manager works the same whether callers run on threads,
/// tasks, or anything else that can block.
pub struct TransactionManager<O: ResourceOperation> {
    registry: ResourceRegistry<O::Resource>,
    clock: Arc<dyn Clock>,
    coord: Mutex<CoordState<O>>,
}

impl<O: ResourceOperation> TransactionManager<O> {
    /// Create a manager over a fixed set of resources
    pub fn new(resources: impl IntoIterator<Item = O::Resource>, clock: Arc<dyn Clock>) -> Self {
        let registry = ResourceRegistry::new(resources);
        tracing::info!(resources = registry.len(), "transaction manager ready");
        Self {
            registry,
            clock,
            coord: Mutex::new(CoordState::new()),
        }
    }

    /// Registry of managed resources
    pub fn registry(&self) -> &ResourceRegistry<O::Resource> {
        &self.registry
    }

    /// Start a transaction for `client` and return its token.
    ///
    /// Each caller owns at most one live transaction; a force-aborted
    /// transaction still counts until it is rolled back.
    pub fn begin(&self, client: ClientId) -> Result<TransactionId> {
        let mut coord = self.coord.lock();
        if coord.active.contains_key(&client) {
            return Err(Error::AlreadyActive(client));
        }

        let txn = Arc::new(Transaction::new(
            TransactionId::new(),
            client,
            self.clock.now(),
        ));
        let txn_id = txn.id();
        coord.active.insert(client, txn_id);
        coord.live.insert(txn_id, txn);

        tracing::debug!(%client, txn = %txn_id, "transaction started");
        Ok(txn_id)
    }

    /// Execute `op` against `rid` within the transaction.
    ///
    /// The first touch of a resource acquires it, blocking while another
    /// transaction holds it. A blocked call returns `Aborted` if deadlock
    /// resolution picks this transaction as victim, or `Interrupted` if an
    /// external cancellation arrives first. An operation failure is
    /// returned verbatim and changes nothing: the operation is not
    /// recorded and the transaction stays active.
    ///
    /// A pending interrupt observed after a successful operation also
    /// surfaces as `Interrupted`; the operation itself remains recorded
    /// and is undone by rollback like any other.
    pub fn operate(&self, txn_id: TransactionId, rid: ResourceId, op: O) -> Result<()> {
        let txn = {
            let mut coord = self.coord.lock();
            let txn = coord
                .live
                .get(&txn_id)
                .cloned()
                .ok_or(Error::NoActiveTransaction(txn_id))?;
            let slot = self.registry.get(rid).ok_or(Error::UnknownResource(rid))?;
            if txn.is_aborted() {
                return Err(Error::Aborted(txn_id));
            }
            if !txn.has_accessed(rid) {
                self.acquire(&mut coord, &txn, rid, slot)?;
            }
            txn
        };

        // User code runs without the coordination mutex; holdership alone
        // guarantees exclusivity.
        txn.apply(rid, op).map_err(|e| Error::Operation {
            rid,
            source: Box::new(e),
        })?;

        if self.coord.lock().interrupted.remove(&txn_id) {
            return Err(Error::Interrupted(txn_id));
        }
        Ok(())
    }

    /// Commit the transaction, keeping all its effects.
    ///
    /// Releases every held resource and wakes their waiters. Fails with
    /// `Aborted` if the transaction was force-aborted; rollback is the
    /// only way out of that state.
    pub fn commit(&self, txn_id: TransactionId) -> Result<()> {
        let mut coord = self.coord.lock();
        let txn = coord
            .live
            .get(&txn_id)
            .cloned()
            .ok_or(Error::NoActiveTransaction(txn_id))?;
        if txn.is_aborted() {
            return Err(Error::Aborted(txn_id));
        }

        txn.set_committed();
        self.finish(&mut coord, &txn);

        tracing::info!(txn = %txn_id, client = %txn.client(), "transaction committed");
        Ok(())
    }

    /// Undo the transaction's effects and release everything it holds.
    ///
    /// Silent no-op when the token maps to no live transaction or the
    /// transaction already committed. Works on force-aborted transactions;
    /// this is the universal recovery path after losing a deadlock.
    pub fn rollback(&self, txn_id: TransactionId) {
        let txn = {
            let coord = self.coord.lock();
            match coord.live.get(&txn_id) {
                Some(txn) => Arc::clone(txn),
                None => return,
            }
        };
        if !txn.set_rolled_back() {
            return;
        }

        // Undo runs while the transaction still holds every resource it
        // touched; release happens after.
        txn.roll_back();

        let mut coord = self.coord.lock();
        self.finish(&mut coord, &txn);
        tracing::info!(txn = %txn_id, client = %txn.client(), "transaction rolled back");
    }

    /// Whether the token refers to a live transaction.
    ///
    /// True for force-aborted transactions that have not rolled back yet.
    pub fn is_active(&self, txn_id: TransactionId) -> bool {
        self.coord.lock().live.contains_key(&txn_id)
    }

    /// Whether the token refers to a live, force-aborted transaction
    pub fn is_aborted(&self, txn_id: TransactionId) -> bool {
        self.coord
            .lock()
            .live
            .get(&txn_id)
            .is_some_and(|txn| txn.is_aborted())
    }

    /// Status of a live transaction
    pub fn status(&self, txn_id: TransactionId) -> Option<TransactionStatus> {
        self.coord.lock().live.get(&txn_id).map(|txn| txn.status())
    }

    /// Why a live transaction was aborted, if it was
    pub fn abort_reason(&self, txn_id: TransactionId) -> Option<AbortReason> {
        self.coord
            .lock()
            .live
            .get(&txn_id)
            .and_then(|txn| txn.abort_reason())
    }

    /// A live transaction by token (for visibility/debugging)
    pub fn transaction(&self, txn_id: TransactionId) -> Option<Arc<Transaction<O>>> {
        self.coord.lock().live.get(&txn_id).cloned()
    }

    /// Deliver an external cancellation to a transaction.
    ///
    /// Wakes the transaction if it is blocked. The pending signal surfaces
    /// as `Interrupted` from the current or next `operate` call and does
    /// not change the transaction's status. Unknown tokens are ignored.
    pub fn interrupt(&self, txn_id: TransactionId) {
        let mut coord = self.coord.lock();
        if !coord.live.contains_key(&txn_id) {
            return;
        }
        coord.interrupted.insert(txn_id);
        if let Some(edge) = coord.waiting.get(&txn_id) {
            if let Some(slot) = self.registry.get(edge.on) {
                slot.available().notify_all();
            }
        }
        tracing::debug!(txn = %txn_id, "interrupt delivered");
    }

    /// Transaction currently holding `rid`, if any (for visibility/debugging)
    pub fn holder_of(&self, rid: ResourceId) -> Option<TransactionId> {
        self.coord.lock().holders.get(&rid).copied()
    }

    /// Resources held by a live transaction (for visibility/debugging)
    pub fn held_resources(&self, txn_id: TransactionId) -> Vec<ResourceId> {
        self.coord
            .lock()
            .live
            .get(&txn_id)
            .map(|txn| txn.accessed_resources())
            .unwrap_or_default()
    }

    /// Number of live transactions
    pub fn active_count(&self) -> usize {
        self.coord.lock().live.len()
    }

    /// Acquire holdership of `rid` for `txn`, blocking if it is held.
    ///
    /// Runs under the coordination mutex; the condvar wait releases it
    /// while parked. Every wake re-checks from scratch: the resource may
    /// have been grabbed by another waiter, the holder may have changed,
    /// or the wake may be a wound or interrupt addressed to this
    /// transaction.
    fn acquire(
        &self,
        coord: &mut MutexGuard<'_, CoordState<O>>,
        txn: &Arc<Transaction<O>>,
        rid: ResourceId,
        slot: &ResourceSlot<O::Resource>,
    ) -> Result<()> {
        loop {
            let holder = match coord.holders.get(&rid).copied() {
                None => {
                    coord.holders.insert(rid, txn.id());
                    coord.waiting.remove(&txn.id());
                    txn.add_resource(Arc::clone(slot.resource()));
                    tracing::debug!(txn = %txn.id(), %rid, "resource acquired");
                    return Ok(());
                }
                Some(holder) => holder,
            };

            coord.waiting.insert(
                txn.id(),
                WaitEdge {
                    on: rid,
                    for_txn: holder,
                },
            );
            self.resolve_deadlock(coord, txn)?;

            // a cancellation delivered before we park would otherwise sit
            // unnoticed until an unrelated wake
            if coord.interrupted.remove(&txn.id()) {
                coord.waiting.remove(&txn.id());
                return Err(Error::Interrupted(txn.id()));
            }

            tracing::debug!(txn = %txn.id(), %rid, holder = %holder, "blocking on held resource");
            slot.available().wait(coord);

            if let Some(by) = coord.wounded.remove(&txn.id()) {
                txn.set_aborted(AbortReason::Wounded { by });
                tracing::warn!(txn = %txn.id(), %by, "woken as deadlock victim");
                return Err(Error::Aborted(txn.id()));
            }
            if coord.interrupted.remove(&txn.id()) {
                coord.waiting.remove(&txn.id());
                return Err(Error::Interrupted(txn.id()));
            }
        }
    }

    /// Detect a wait-for cycle through `txn` and resolve it.
    ///
    /// The caller's freshly recorded edge is the only new one in the
    /// graph, so any cycle goes through `txn` and one walk from it visits
    /// every member. A victim other than the caller is wounded and woken;
    /// the caller itself aborts in place without blocking.
    fn resolve_deadlock(
        &self,
        coord: &mut MutexGuard<'_, CoordState<O>>,
        txn: &Arc<Transaction<O>>,
    ) -> Result<()> {
        if !coord.in_cycle(txn.id()) {
            return Ok(());
        }

        let victim = coord.newest_in_cycle(txn);
        if victim == txn.id() {
            coord.waiting.remove(&txn.id());
            txn.set_aborted(AbortReason::Wounded { by: txn.id() });
            tracing::warn!(txn = %txn.id(), "deadlock: caller is newest in cycle, aborting");
            return Err(Error::Aborted(txn.id()));
        }

        // removing the victim's edge here, not when it wakes, keeps the
        // graph acyclic for every later detection
        coord.wounded.insert(victim, txn.id());
        if let Some(edge) = coord.waiting.remove(&victim) {
            if let Some(slot) = self.registry.get(edge.on) {
                slot.available().notify_all();
            }
        }
        tracing::warn!(victim = %victim, by = %txn.id(), "deadlock: wounding newest cycle member");
        Ok(())
    }

    /// Release everything a terminated transaction holds and deregister it
    fn finish(&self, coord: &mut MutexGuard<'_, CoordState<O>>, txn: &Arc<Transaction<O>>) {
        for rid in txn.accessed_resources() {
            coord.holders.remove(&rid);
            if let Some(slot) = self.registry.get(rid) {
                slot.available().notify_all();
            }
        }
        coord.waiting.remove(&txn.id());
        coord.wounded.remove(&txn.id());
        coord.interrupted.remove(&txn.id());
        coord.live.remove(&txn.id());
        coord.active.remove(&txn.client());
    }
}
