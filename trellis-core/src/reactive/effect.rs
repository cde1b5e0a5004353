//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued. It runs at most once
//!    per flush, however many of its dependencies were written.
//!
//! 3. Each run collects dependencies from scratch, so a branch not taken
//!    this time stops triggering the effect.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Failures
//!
//! A failing or panicking effect is logged and its message kept in
//! [`Effect::last_error`]. The rest of the graph is unaffected and the
//! effect runs again on its next change.
//!
//! # Lifetime
//!
//! The effect lives as long as any handle to it. Dropping the last handle,
//! calling [`Effect::dispose`], or disposing the [`Owner`](super::Owner)
//! that created it stops it for good.

use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{Dependencies, ReactiveContext};
use super::runtime::{NodeHandle, Reactive, Runtime};
use crate::error::panic_message;
use crate::graph::{DirtyState, NodeId, NodeKind};

type EffectFn = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

struct EffectInner {
    node: NodeHandle,
    run: EffectFn,
    dependencies: Mutex<Dependencies>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

impl EffectInner {
    fn id(&self) -> NodeId {
        self.node.id()
    }

    fn execute(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        // Writes made by the callback to its own dependencies re-dirty the
        // node and queue another run.
        Runtime::mark_clean(self.id());

        let ctx = ReactiveContext::enter(self.id(), NodeKind::Effect);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.run)()));
        let dependencies = ctx.finish();

        if !self.disposed.load(Ordering::Acquire) {
            Runtime::replace_dependencies(self.id(), dependencies.iter().map(|dep| dep.node_id()));
            *self.dependencies.lock() = dependencies;
        }

        let runs = self.run_count.fetch_add(1, Ordering::AcqRel) + 1;
        let error = match outcome {
            Ok(Ok(())) => {
                tracing::debug!(effect = %self.id(), runs, "effect ran");
                None
            }
            Ok(Err(message)) => {
                tracing::warn!(effect = %self.id(), error = %message, "effect failed");
                Some(message)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(effect = %self.id(), panic = %message, "effect panicked");
                Some(message)
            }
        };
        *self.last_error.lock() = error;
    }

    fn any_dependency_changed(&self) -> bool {
        let dependencies = self.dependencies.lock().clone();
        dependencies.iter().any(|dependency| {
            dependency.has_changed().unwrap_or_else(|err| {
                // Let the run itself surface the error.
                tracing::warn!(effect = %self.id(), error = %err, "dependency check failed");
                true
            })
        })
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id()
    }

    fn run_if_dirty(&self) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }

        let dirty = match Runtime::dirty_state(self.id()) {
            DirtyState::Clean => false,
            DirtyState::Dirty => true,
            DirtyState::MaybeDirty => self.any_dependency_changed(),
        };

        if dirty {
            self.execute();
        } else {
            Runtime::mark_clean(self.id());
        }
        dirty
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// ```rust
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let count_c = count.clone();
/// let effect = Effect::new(move || {
///     println!("count is {}", count_c.get());
/// });
///
/// count.set(5);
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it once to establish dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_boxed(Box::new(move || {
            run();
            Ok(())
        }))
    }

    /// Create an effect whose callback can fail.
    ///
    /// Errors are logged and kept in [`Effect::last_error`]; they never
    /// reach the code that wrote the signal.
    pub fn fallible<F, E>(run: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Display,
    {
        Self::from_boxed(Box::new(move || run().map_err(|err| err.to_string())))
    }

    fn from_boxed(run: EffectFn) -> Self {
        let inner = Arc::new(EffectInner {
            node: Runtime::register(NodeKind::Effect),
            run,
            dependencies: Mutex::new(Dependencies::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        });
        Runtime::register_effect(&inner);

        inner.execute();

        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    /// Stop the effect and unsubscribe it from all dependencies.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        Runtime::replace_dependencies(self.id(), std::iter::empty());
        self.inner.dependencies.lock().clear();
        tracing::debug!(effect = %self.id(), "effect disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Acquire)
    }

    /// Number of nodes read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Message of the last run's failure, cleared by a successful run.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
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

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_on_dependency_write() {
        let signal = Signal::new(0);
        let seen = Arc::new(AtomicI32::new(-1));
        let (signal_c, seen_c) = (signal.clone(), seen.clone());

        let effect = Effect::new(move || {
            seen_c.store(signal_c.get(), Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        signal.set(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let signal_c = signal.clone();
        let effect = Effect::new(move || {
            signal_c.get();
        });
        assert_eq!(signal.dependent_count(), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.dependent_count(), 0);

        signal.set(1);
        signal.set(2);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn dropping_last_handle_unsubscribes() {
        let signal = Signal::new(0);
        let signal_c = signal.clone();
        let effect = Effect::new(move || {
            signal_c.get();
        });
        let clone = effect.clone();

        drop(effect);
        assert_eq!(signal.dependent_count(), 1);
        drop(clone);
        assert_eq!(signal.dependent_count(), 0);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let use_a = Signal::new(true);
        let a = Signal::new(0);
        let b = Signal::new(0);

        let (use_a_c, a_c, b_c) = (use_a.clone(), a.clone(), b.clone());
        let effect = Effect::new(move || {
            if use_a_c.get() {
                a_c.get();
            } else {
                b_c.get();
            }
        });

        use_a.set(false);
        assert_eq!(effect.run_count(), 2);

        a.set(1);
        assert_eq!(effect.run_count(), 2);
        b.set(1);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn panicking_effect_is_contained() {
        let signal = Signal::new(0);
        let signal_c = signal.clone();
        let effect = Effect::new(move || {
            if signal_c.get() == 1 {
                panic!("effect exploded");
            }
        });
        assert!(effect.last_error().is_none());

        signal.set(1);
        assert_eq!(effect.last_error().as_deref(), Some("effect exploded"));

        signal.set(2);
        assert_eq!(effect.run_count(), 3);
        assert!(effect.last_error().is_none());
    }

    #[test]
    fn fallible_effect_records_error() {
        let signal = Signal::new(-1);
        let signal_c = signal.clone();
        let effect = Effect::fallible(move || {
            let value = signal_c.get();
            if value < 0 {
                Err(format!("negative value {value}"))
            } else {
                Ok(())
            }
        });

        assert_eq!(effect.last_error().as_deref(), Some("negative value -1"));
        signal.set(3);
        assert!(effect.last_error().is_none());
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
