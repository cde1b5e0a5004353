//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! notifies the computations that read it when the value changes.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    read is recorded together with the signal's current version.
//!
//! 2. When a signal is written, its version is bumped and the runtime marks
//!    every dependent dirty.
//!
//! 3. Dirty memos recompute on next read; dirty effects are queued.
//!
//! Writing to a signal while a memo is computing is a programming error and
//! is rejected.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{NodeHandle, Runtime, Source};
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind};

struct SignalInner<T> {
    node: NodeHandle,
    value: RwLock<T>,
    version: AtomicU64,
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync,
{
    fn node_id(&self) -> NodeId {
        self.node.id()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn refresh(&self) -> Result<(), ReactiveError> {
        Ok(())
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value.
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// count.update(|c| c + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                node: Runtime::register(NodeKind::Source),
                value: RwLock::new(value),
                version: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.node.id()
    }

    /// Number of writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.inner);
        self.inner.value.read().clone()
    }

    /// Read the value by reference, with tracking.
    ///
    /// `f` sees a snapshot taken before it runs, so it is free to write to
    /// this signal or to anything whose effects do.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.inner);
        let current = self.inner.value.read().clone();
        f(&current)
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify dependents.
    ///
    /// # Panics
    ///
    /// Panics if called while a memo is computing. See [`Signal::try_set`].
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            panic!("{err}");
        }
    }

    /// Set a new value, rejecting writes made from inside a memo.
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        self.check_writable()?;
        *self.inner.value.write() = value;
        self.commit();
        Ok(())
    }

    /// Replace the value with one computed from the current value.
    ///
    /// # Panics
    ///
    /// Panics if called while a memo is computing.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        if let Err(err) = self.try_update(f) {
            panic!("{err}");
        }
    }

    pub fn try_update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&T) -> T,
    {
        self.check_writable()?;
        // No lock is held while `f` runs.
        let current = self.inner.value.read().clone();
        let next = f(&current);
        *self.inner.value.write() = next;
        self.commit();
        Ok(())
    }

    fn check_writable(&self) -> Result<(), ReactiveError> {
        match ReactiveContext::deriving_memo() {
            Some(memo) => Err(ReactiveError::WriteDuringDerivation {
                signal: self.id(),
                memo,
            }),
            None => Ok(()),
        }
    }

    fn commit(&self) {
        let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(signal = %self.id(), version, "signal written");
        Runtime::notify_change(self.id());
    }

    /// Number of memos and effects that read this signal on their last run.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.id())
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &*self.inner.value.read())
            .field("version", &self.version())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
