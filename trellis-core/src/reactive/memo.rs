//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result,
//!    recording every signal or memo read along the way.
//!
//! 2. When accessed again with no upstream writes, it returns the cache.
//!
//! 3. A write to a direct dependency marks it `Dirty`; a write further up
//!    marks it `MaybeDirty`.
//!
//! 4. On next access, a `MaybeDirty` memo refreshes its dependencies and
//!    compares their versions with those it recorded. Only if one moved does
//!    it recompute; otherwise it is marked clean and returns the cache.
//!
//! 5. A recompute that yields a value equal to the cached one keeps the
//!    memo's version, so its own dependents stay put.
//!
//! Memos that are never read stay dirty and cost nothing.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::context::{Dependencies, ReactiveContext, RefreshGuard};
use super::runtime::{NodeHandle, Runtime, Source};
use crate::error::ReactiveError;
use crate::graph::{DirtyState, NodeId, NodeKind};

/// Dirty state for a memo.
pub type MemoState = DirtyState;

struct MemoInner<T> {
    node: NodeHandle,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    version: AtomicU64,
    dependencies: Mutex<Dependencies>,
}

/// Ends the refresh on exit and, if the computation unwound, leaves the
/// memo dirty so the next read tries again.
struct ComputeGuard {
    _refresh: RefreshGuard,
    node: NodeId,
    completed: bool,
}

impl Drop for ComputeGuard {
    fn drop(&mut self) {
        if !self.completed {
            Runtime::mark_dirty(self.node);
        }
    }
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn id(&self) -> NodeId {
        self.node.id()
    }

    fn needs_recompute(&self) -> Result<bool, ReactiveError> {
        match Runtime::dirty_state(self.id()) {
            DirtyState::Clean => Ok(self.value.read().is_none()),
            DirtyState::Dirty => Ok(true),
            DirtyState::MaybeDirty => {
                let dependencies = self.dependencies.lock().clone();
                for dependency in &dependencies {
                    if dependency.has_changed()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn recompute(&self) {
        // Clean before running, so a write that lands mid-computation
        // re-dirties the memo instead of being overwritten.
        Runtime::mark_clean(self.id());

        let ctx = ReactiveContext::enter(self.id(), NodeKind::Derived);
        let new_value = (self.compute)();
        let dependencies = ctx.finish();

        Runtime::replace_dependencies(self.id(), dependencies.iter().map(|dep| dep.node_id()));
        *self.dependencies.lock() = dependencies;

        let changed = {
            let mut value = self.value.write();
            let changed = value.as_ref() != Some(&new_value);
            *value = Some(new_value);
            changed
        };

        if changed {
            self.version.fetch_add(1, Ordering::AcqRel);
        }

        tracing::debug!(memo = %self.id(), changed, "memo recomputed");
    }
}

impl<T> Source for MemoInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn refresh(&self) -> Result<(), ReactiveError> {
        // Re-entering on the same thread means the memo is reading itself.
        let refresh = RefreshGuard::enter(self.id()).ok_or(ReactiveError::CircularDependency(self.id()))?;
        let mut guard = ComputeGuard {
            _refresh: refresh,
            node: self.id(),
            completed: false,
        };

        let result = match self.needs_recompute() {
            Ok(true) => {
                self.recompute();
                Ok(())
            }
            Ok(false) => {
                Runtime::mark_clean(self.id());
                Ok(())
            }
            Err(err) => Err(err),
        };

        guard.completed = result.is_ok();
        result
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// The `PartialEq` bound lets the memo tell whether a recompute actually
/// produced a new value.
///
/// ```rust
/// use trellis_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(0);
/// let doubled = {
///     let count = count.clone();
///     Memo::new(move || count.get() * 2)
/// };
/// count.update(|c| c + 1);
/// assert_eq!(doubled.get(), 2);
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new memo. The computation does not run until first read.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(MemoInner {
                node: Runtime::register(NodeKind::Derived),
                compute: Box::new(compute),
                value: RwLock::new(None),
                version: AtomicU64::new(0),
                dependencies: Mutex::new(Dependencies::new()),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics on a circular dependency, and propagates any panic raised by
    /// the computation itself.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, reporting circular dependencies as errors.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        self.inner.refresh()?;
        ReactiveContext::track(&self.inner);
        self.inner
            .value
            .read()
            .clone()
            .ok_or(ReactiveError::NotComputed(self.id()))
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        let _untracked = ReactiveContext::untracked();
        self.get()
    }

    pub fn state(&self) -> MemoState {
        Runtime::dirty_state(self.id())
    }

    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of memos and effects that read this memo on their last run.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.id())
    }

    /// Number of nodes read by the last computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicI32;

    fn counted<F>(f: F) -> (Memo<i32>, Arc<AtomicI32>)
    where
        F: Fn() -> i32 + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let memo = Memo::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            f()
        });
        (memo, calls)
    }

    #[test]
    fn memo_computes_on_first_access() {
        let (memo, calls) = counted(|| 42);

        assert!(!memo.has_value());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let (memo, calls) = counted(|| 42);

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn memo_recomputes_after_dependency_write() {
        let signal = Signal::new(1);
        let signal_c = signal.clone();
        let (memo, calls) = counted(move || signal_c.get() * 10);

        assert_eq!(memo.get(), 10);
        signal.set(2);
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(memo.get(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn several_writes_cause_one_recompute() {
        let signal = Signal::new(0);
        let signal_c = signal.clone();
        let (memo, calls) = counted(move || signal_c.get());

        memo.get();
        for v in 1..=5 {
            signal.set(v);
        }
        assert_eq!(memo.get(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn maybe_dirty_memo_skips_recompute_when_upstream_is_equal() {
        let count = Signal::new(2);
        let count_c = count.clone();
        let parity = Memo::new(move || count_c.get() % 2);
        let parity_c = parity.clone();
        let (label, calls) = counted(move || parity_c.get() * 100);

        assert_eq!(label.get(), 0);
        count.set(4);
        assert_eq!(label.state(), MemoState::MaybeDirty);
        assert_eq!(label.get(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(label.state(), MemoState::Clean);
    }

    #[test]
    fn memo_reading_itself_is_circular() {
        let slot: Arc<Mutex<Option<Memo<i32>>>> = Arc::new(Mutex::new(None));
        let slot_c = slot.clone();
        let memo = Memo::new(move || {
            let me = slot_c.lock().clone();
            match me {
                Some(me) => match me.try_get() {
                    Err(ReactiveError::CircularDependency(_)) => -1,
                    _ => 0,
                },
                None => 0,
            }
        });
        *slot.lock() = Some(memo.clone());

        assert_eq!(memo.get(), -1);
        *slot.lock() = None;
    }

    #[test]
    fn concurrent_reads_are_not_circular() {
        let input = Signal::new(21);
        let input_c = input.clone();
        let memo = Memo::new(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            input_c.get_untracked() * 2
        });

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let memo = memo.clone();
                    scope.spawn(move || memo.try_get())
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(results, vec![Ok(42), Ok(42)]);
    }

    #[test]
    fn panicking_computation_leaves_memo_dirty() {
        let fail = Signal::new(true);
        let fail_c = fail.clone();
        let memo = Memo::new(move || {
            if fail_c.get_untracked() {
                panic!("boom");
            }
            7
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| memo.get()));
        assert!(outcome.is_err());
        assert_eq!(memo.state(), MemoState::Dirty);

        fail.set(false);
        assert_eq!(memo.get(), 7);
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo2.get(), 42);
    }
}
