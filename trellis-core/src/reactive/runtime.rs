//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph and decides when effects run.
//!
//! # How It Works
//!
//! 1. Every signal, memo and effect registers a node in the graph and gets
//!    back a [`NodeHandle`] that removes the node when dropped.
//!
//! 2. After a memo or effect runs, the runtime replaces its edges with the
//!    dependencies collected by the [`ReactiveContext`](super::context).
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks direct dependents `Dirty` and the rest `MaybeDirty`
//!    b. Queues every affected effect
//!    c. Flushes the queue, unless a batch is open or scheduling is manual
//!    d. Leaves memos alone; they recompute on next access
//!
//! # Threading
//!
//! The graph and the effect registry are process-wide. The effect queue,
//! batch depth and configuration are per thread: an effect runs on the
//! thread whose write queued it. No lock is held while user code runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};

use crate::config::{EffectScheduling, ReactiveConfig};
use crate::error::ReactiveError;
use crate::graph::{DirtyState, Node, NodeId, NodeKind, UpdateScheduler};

/// A node other computations can depend on: signals and memos.
pub(crate) trait Source: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Bumped whenever the observable value changes.
    fn version(&self) -> u64;

    /// Bring the value up to date. A no-op for signals.
    fn refresh(&self) -> Result<(), ReactiveError>;
}

/// A node the runtime re-runs eagerly: effects.
pub(crate) trait Reactive: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Re-run if a dependency actually changed. Returns whether it ran.
    fn run_if_dirty(&self) -> bool;
}

/// Handle to a registered graph node.
///
/// Dropping this handle removes the node and its edges from the graph.
#[derive(Debug)]
pub(crate) struct NodeHandle {
    id: NodeId,
}

impl NodeHandle {
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

static GRAPH: OnceLock<Mutex<UpdateScheduler>> = OnceLock::new();
static EFFECTS: OnceLock<RwLock<HashMap<NodeId, Weak<dyn Reactive>>>> = OnceLock::new();

fn graph() -> &'static Mutex<UpdateScheduler> {
    GRAPH.get_or_init(|| Mutex::new(UpdateScheduler::new()))
}

fn effects() -> &'static RwLock<HashMap<NodeId, Weak<dyn Reactive>>> {
    EFFECTS.get_or_init(|| RwLock::new(HashMap::new()))
}

#[derive(Default)]
struct EffectQueue {
    pending: IndexSet<NodeId>,
    batch_depth: usize,
    flushing: bool,
    config: ReactiveConfig,
}

impl EffectQueue {
    fn should_flush(&self) -> bool {
        self.batch_depth == 0
            && !self.flushing
            && self.config.scheduling == EffectScheduling::Immediate
            && !self.pending.is_empty()
    }
}

thread_local! {
    static QUEUE: RefCell<EffectQueue> = RefCell::new(EffectQueue::default());
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.batch_depth = queue.batch_depth.saturating_sub(1);
        });
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        QUEUE.with(|queue| queue.borrow_mut().flushing = false);
    }
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Apply scheduling settings to the current thread.
    pub fn configure(config: ReactiveConfig) {
        tracing::debug!(?config, "reactive runtime configured");
        QUEUE.with(|queue| queue.borrow_mut().config = config);
    }

    /// The settings in effect on the current thread.
    pub fn config() -> ReactiveConfig {
        QUEUE.with(|queue| queue.borrow().config.clone())
    }

    pub(crate) fn register(kind: NodeKind) -> NodeHandle {
        let id = graph().lock().add_node(Node::new(kind));
        NodeHandle { id }
    }

    /// Make an effect reachable by the scheduler.
    pub(crate) fn register_effect<R>(effect: &Arc<R>)
    where
        R: Reactive + 'static,
    {
        let weak: Weak<dyn Reactive> = Arc::downgrade(effect) as Weak<dyn Reactive>;
        effects().write().insert(effect.node_id(), weak);
    }

    fn unregister(id: NodeId) {
        effects().write().remove(&id);
        graph().lock().remove_node(id);
    }

    /// Whether the node is still part of the graph.
    pub fn is_registered(id: NodeId) -> bool {
        graph().lock().contains(id)
    }

    pub(crate) fn dirty_state(id: NodeId) -> DirtyState {
        graph().lock().dirty_state(id).unwrap_or(DirtyState::Dirty)
    }

    pub(crate) fn mark_clean(id: NodeId) {
        if let Some(node) = graph().lock().get_node_mut(id) {
            node.mark_clean();
        }
    }

    pub(crate) fn mark_dirty(id: NodeId) {
        if let Some(node) = graph().lock().get_node_mut(id) {
            node.mark_dirty();
        }
    }

    pub(crate) fn replace_dependencies<I>(id: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        graph().lock().replace_dependencies(id, dependencies);
    }

    /// Number of memos and effects that read this node on their last run.
    pub fn dependent_count(id: NodeId) -> usize {
        graph()
            .lock()
            .get_node(id)
            .map(|node| node.dependents().len())
            .unwrap_or(0)
    }

    /// Propagate a change of `source` through the graph.
    ///
    /// This is the core update propagation mechanism.
    pub(crate) fn notify_change(source: NodeId) {
        let queued: Vec<NodeId> = {
            let mut graph = graph().lock();
            let affected = graph.mark_changed(source);
            affected
                .into_iter()
                .filter(|id| graph.kind(*id).is_some_and(|kind| kind.is_eager()))
                .collect()
        };

        if queued.is_empty() {
            return;
        }

        tracing::trace!(%source, effects = queued.len(), "change propagated");

        let flush_now = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.pending.extend(queued);
            queue.should_flush()
        });

        if flush_now {
            Self::flush_effects();
        }
    }

    /// Run queued effects until the queue is empty.
    ///
    /// Effects queued by writes made during the flush run in the same flush.
    /// Returns the number of effects that actually ran. Calling this while a
    /// flush is already in progress on this thread returns 0.
    pub fn flush_effects() -> usize {
        let limit = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            if queue.flushing {
                None
            } else {
                queue.flushing = true;
                Some(queue.config.max_effect_runs)
            }
        });
        let Some(limit) = limit else {
            return 0;
        };
        let _guard = FlushGuard;

        let mut runs = 0;
        loop {
            let next = QUEUE.with(|queue| queue.borrow_mut().pending.shift_remove_index(0));
            let Some(id) = next else {
                break;
            };

            if runs >= limit {
                let dropped = QUEUE.with(|queue| {
                    let mut queue = queue.borrow_mut();
                    let dropped = queue.pending.len() + 1;
                    queue.pending.clear();
                    dropped
                });
                tracing::error!(limit, dropped, "effect flush exceeded its run limit, abandoning queue");
                break;
            }

            let effect = effects().read().get(&id).and_then(Weak::upgrade);
            if let Some(effect) = effect {
                if effect.run_if_dirty() {
                    runs += 1;
                }
            }
        }

        runs
    }

    /// Run `f` as one settled batch.
    ///
    /// Effects affected by writes inside `f` run once, after the outermost
    /// batch returns. Memos read inside `f` already see the new values.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        QUEUE.with(|queue| queue.borrow_mut().batch_depth += 1);
        let guard = BatchGuard;

        let result = f();

        drop(guard);
        if QUEUE.with(|queue| queue.borrow().should_flush()) {
            Self::flush_effects();
        }

        result
    }

    pub fn in_batch() -> bool {
        QUEUE.with(|queue| queue.borrow().batch_depth > 0)
    }

    /// Number of effects waiting for the next flush on this thread.
    pub fn pending_effects() -> usize {
        QUEUE.with(|queue| queue.borrow().pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct MockEffect {
        node: NodeHandle,
        runs: AtomicI32,
    }

    impl MockEffect {
        fn new() -> Arc<Self> {
            let effect = Arc::new(Self {
                node: Runtime::register(NodeKind::Effect),
                runs: AtomicI32::new(0),
            });
            Runtime::register_effect(&effect);
            Runtime::mark_clean(effect.node.id());
            effect
        }
    }

    impl Reactive for MockEffect {
        fn node_id(&self) -> NodeId {
            self.node.id()
        }

        fn run_if_dirty(&self) -> bool {
            if Runtime::dirty_state(self.node_id()) == DirtyState::Clean {
                return false;
            }
            Runtime::mark_clean(self.node_id());
            self.runs.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn dropping_handle_unregisters_node() {
        let handle = Runtime::register(NodeKind::Source);
        let id = handle.id();
        assert!(Runtime::is_registered(id));

        drop(handle);
        assert!(!Runtime::is_registered(id));
    }

    #[test]
    fn manual_scheduling_queues_until_flush() {
        Runtime::configure(ReactiveConfig {
            scheduling: EffectScheduling::Manual,
            ..ReactiveConfig::default()
        });

        let source = Runtime::register(NodeKind::Source);
        let effect = MockEffect::new();
        Runtime::replace_dependencies(effect.node_id(), [source.id()]);
        assert_eq!(Runtime::dependent_count(source.id()), 1);

        Runtime::notify_change(source.id());
        Runtime::notify_change(source.id());
        assert_eq!(Runtime::pending_effects(), 1);
        assert_eq!(effect.runs.load(Ordering::SeqCst), 0);

        assert_eq!(Runtime::flush_effects(), 1);
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
        assert_eq!(Runtime::pending_effects(), 0);
    }

    #[test]
    fn batch_defers_flush_to_outermost_exit() {
        let source = Runtime::register(NodeKind::Source);
        let effect = MockEffect::new();
        Runtime::replace_dependencies(effect.node_id(), [source.id()]);

        Runtime::batch(|| {
            Runtime::notify_change(source.id());
            Runtime::batch(|| Runtime::notify_change(source.id()));
            assert!(Runtime::in_batch());
            assert_eq!(effect.runs.load(Ordering::SeqCst), 0);
        });

        assert!(!Runtime::in_batch());
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_effect_is_skipped() {
        Runtime::configure(ReactiveConfig {
            scheduling: EffectScheduling::Manual,
            ..ReactiveConfig::default()
        });

        let source = Runtime::register(NodeKind::Source);
        let effect = MockEffect::new();
        Runtime::replace_dependencies(effect.node_id(), [source.id()]);
        Runtime::notify_change(source.id());
        drop(effect);

        assert_eq!(Runtime::flush_effects(), 0);
        assert_eq!(Runtime::dependent_count(source.id()), 0);
    }
}
