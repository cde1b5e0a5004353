//! Deferred fragments.
//!
//! A fragment pairs a trigger with a one-shot loader. Its state lives in a
//! [`Signal`], so hosts render it from an effect like any other reactive
//! value. Loads and timers run as tokio tasks; cancelling the fragment aborts
//! them and no state write happens afterwards.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::state::{advance, FragmentEvent, FragmentState};
use super::trigger::{FragmentId, HostEvent, Trigger};
use crate::error::{panic_message, LoadError};
use crate::reactive::{Owner, Signal};

type Loader<P> = Box<dyn FnOnce() -> BoxFuture<'static, Result<P, LoadError>> + Send>;

pub(crate) fn boxed_loader<P, F, Fut>(loader: F) -> Loader<P>
where
    P: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<P, LoadError>> + Send + 'static,
{
    Box::new(move || loader().boxed())
}

struct FragmentInner<P> {
    id: FragmentId,
    name: String,
    trigger: Trigger,
    state: Signal<FragmentState>,
    payload: RwLock<Option<Arc<P>>>,
    error: RwLock<Option<LoadError>>,
    /// Taken by whichever trigger fires first.
    loader: Mutex<Option<Loader<P>>>,
    registered_at: Instant,
    tasks: Mutex<Vec<AbortHandle>>,
    cancelled: AtomicBool,
    runtime: Handle,
    load_timeout: Option<Duration>,
}

impl<P> Drop for FragmentInner<P> {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Handle to a registered fragment. Clones share the fragment.
pub struct DeferredFragment<P> {
    inner: Arc<FragmentInner<P>>,
}

impl<P> Clone for DeferredFragment<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> DeferredFragment<P>
where
    P: Send + Sync + 'static,
{
    pub(crate) fn new(
        name: String,
        trigger: Trigger,
        loader: Loader<P>,
        runtime: Handle,
        load_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(FragmentInner {
                id: FragmentId::new(),
                name,
                trigger,
                state: Signal::new(FragmentState::Placeholder),
                payload: RwLock::new(None),
                error: RwLock::new(None),
                loader: Mutex::new(Some(loader)),
                registered_at: Instant::now(),
                tasks: Mutex::new(Vec::new()),
                cancelled: AtomicBool::new(false),
                runtime,
                load_timeout,
            }),
        }
    }

    pub fn id(&self) -> FragmentId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.inner.trigger
    }

    /// Current state. Tracked, so effects reading it re-run on transitions.
    pub fn state(&self) -> FragmentState {
        self.inner.state.get()
    }

    pub fn state_signal(&self) -> Signal<FragmentState> {
        self.inner.state.clone()
    }

    /// The loaded payload, once `Ready`.
    pub fn payload(&self) -> Option<Arc<P>> {
        self.inner.payload.read().clone()
    }

    /// Why the load failed, once `Error`.
    pub fn error(&self) -> Option<LoadError> {
        self.inner.error.read().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Abort any pending timer or load. The state stays where it is.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.loader.lock().take();
        tracing::debug!(fragment = %self.id(), name = %self.name(), "fragment cancelled");
    }

    /// Cancel this fragment when `owner` is disposed.
    pub fn tie_to(&self, owner: &Owner) {
        let fragment = self.clone();
        owner.on_cleanup(move || fragment.cancel());
    }

    /// Start whatever the trigger needs right after registration.
    pub(crate) fn arm(&self) {
        match &self.inner.trigger {
            Trigger::Timer(duration) => {
                let weak = Arc::downgrade(&self.inner);
                let deadline = self.inner.registered_at + *duration;
                let task = self.inner.runtime.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    if let Some(inner) = weak.upgrade() {
                        let event = HostEvent::TimerElapsed {
                            fragment: inner.id,
                            elapsed: inner.registered_at.elapsed(),
                        };
                        DeferredFragment { inner }.fire(&event);
                    }
                });
                self.inner.tasks.lock().push(task.abort_handle());
            }
            Trigger::Immediate => {
                self.fire(&HostEvent::Mounted(self.id()));
            }
            _ => {}
        }
    }

    /// Feed a host event to the fragment. Returns whether it started loading.
    pub(crate) fn fire(&self, event: &HostEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }

        let current = self.inner.state.get_untracked();
        let host_event = FragmentEvent::Host(event.clone());
        if advance(current, &self.inner.trigger, self.id(), &host_event).is_none() {
            return false;
        }

        let Some(loader) = self.inner.loader.lock().take() else {
            return false;
        };

        tracing::debug!(
            fragment = %self.id(),
            name = %self.name(),
            trigger = %self.inner.trigger,
            "trigger fired"
        );

        // Publish Loading before the load can possibly finish.
        self.apply(host_event);
        self.spawn_load(loader);
        true
    }

    fn spawn_load(&self, loader: Loader<P>) {
        let weak = Arc::downgrade(&self.inner);
        let timeout = self.inner.load_timeout;

        let task = self.inner.runtime.spawn(async move {
            let load = AssertUnwindSafe(async move { loader().await }).catch_unwind();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, load).await {
                    Ok(result) => result,
                    Err(_) => Ok(Err(LoadError::TimedOut(limit))),
                },
                None => load.await,
            };
            let outcome = outcome.unwrap_or_else(|payload| {
                Err(LoadError::Panicked(panic_message(payload.as_ref())))
            });

            if let Some(inner) = weak.upgrade() {
                DeferredFragment { inner }.complete(outcome);
            }
        });

        self.inner.tasks.lock().push(task.abort_handle());
    }

    fn complete(&self, outcome: Result<P, LoadError>) {
        if self.is_cancelled() {
            tracing::debug!(fragment = %self.id(), "load finished after cancellation, discarded");
            return;
        }

        let event = match outcome {
            Ok(payload) => {
                *self.inner.payload.write() = Some(Arc::new(payload));
                FragmentEvent::LoadResolved
            }
            Err(err) => {
                tracing::warn!(fragment = %self.id(), name = %self.name(), error = %err, "fragment load failed");
                *self.inner.error.write() = Some(err);
                FragmentEvent::LoadFailed
            }
        };

        self.apply(event);
    }

    fn apply(&self, event: FragmentEvent) -> Option<FragmentState> {
        let current = self.inner.state.get_untracked();
        let next = advance(current, &self.inner.trigger, self.id(), &event)?;

        tracing::debug!(
            fragment = %self.id(),
            name = %self.name(),
            from = %current,
            to = %next,
            "fragment transition"
        );

        if let Err(err) = self.inner.state.try_set(next) {
            tracing::error!(fragment = %self.id(), error = %err, "fragment state not published");
        }
        Some(next)
    }
}

impl<P> std::fmt::Debug for DeferredFragment<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredFragment")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("trigger", &self.inner.trigger)
            .field("state", &self.inner.state.get_untracked())
            .finish()
    }
}

/// Type-erased view of a fragment, for the controller's registry.
pub(crate) trait ErasedFragment: Send + Sync {
    fn id(&self) -> FragmentId;
    fn state(&self) -> FragmentState;
    fn fire(&self, event: &HostEvent) -> bool;
    fn cancel(&self);
}

impl<P> ErasedFragment for DeferredFragment<P>
where
    P: Send + Sync + 'static,
{
    fn id(&self) -> FragmentId {
        DeferredFragment::id(self)
    }

    fn state(&self) -> FragmentState {
        self.inner.state.get_untracked()
    }

    fn fire(&self, event: &HostEvent) -> bool {
        DeferredFragment::fire(self, event)
    }

    fn cancel(&self) {
        DeferredFragment::cancel(self)
    }
}
