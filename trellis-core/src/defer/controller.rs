//! The deferred fragment controller.
//!
//! The controller keeps every live fragment of a view, routes host events to
//! them and cancels them when they are unregistered or when the controller
//! itself goes away.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;

use super::fragment::{boxed_loader, DeferredFragment, ErasedFragment};
use super::state::FragmentState;
use super::trigger::{FragmentId, HostEvent, Trigger};
use crate::config::DeferConfig;
use crate::error::{DeferError, LoadError};

/// Registry of deferred fragments and entry point for host events.
pub struct DeferController {
    fragments: DashMap<FragmentId, Arc<dyn ErasedFragment>>,
    runtime: Handle,
    config: DeferConfig,
}

impl DeferController {
    /// Create a controller on the current tokio runtime.
    pub fn new(config: DeferConfig) -> Result<Self, DeferError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_handle(runtime, config))
    }

    pub fn with_handle(runtime: Handle, config: DeferConfig) -> Self {
        Self {
            fragments: DashMap::new(),
            runtime,
            config,
        }
    }

    /// Register a fragment in the `Placeholder` state.
    ///
    /// `loader` runs at most once, when the trigger first fires. `Timer`
    /// triggers start counting now; `Immediate` fires before this returns.
    pub fn register<P, F, Fut>(
        &self,
        name: impl Into<String>,
        trigger: Trigger,
        loader: F,
    ) -> DeferredFragment<P>
    where
        P: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<P, LoadError>> + Send + 'static,
    {
        let fragment = DeferredFragment::new(
            name.into(),
            trigger,
            boxed_loader(loader),
            self.runtime.clone(),
            self.config.load_timeout(),
        );

        self.fragments
            .insert(fragment.id(), Arc::new(fragment.clone()) as Arc<dyn ErasedFragment>);
        tracing::debug!(
            fragment = %fragment.id(),
            name = %fragment.name(),
            trigger = %fragment.trigger(),
            "fragment registered"
        );

        fragment.arm();
        fragment
    }

    /// Deliver a host event to every fragment. Returns how many started
    /// loading because of it.
    pub fn dispatch(&self, event: HostEvent) -> usize {
        // Snapshot first: firing publishes state, which runs effects that
        // may register or unregister fragments.
        let mut candidates: Vec<Arc<dyn ErasedFragment>> = self
            .fragments
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        candidates.sort_by_key(|fragment| fragment.id());

        let fired = candidates
            .iter()
            .filter(|fragment| fragment.fire(&event))
            .count();

        tracing::trace!(?event, fired, "host event dispatched");
        fired
    }

    /// Remove a fragment and cancel its pending work.
    pub fn unregister(&self, id: FragmentId) -> bool {
        match self.fragments.remove(&id) {
            Some((_, fragment)) => {
                fragment.cancel();
                true
            }
            None => false,
        }
    }

    pub fn state(&self, id: FragmentId) -> Option<FragmentState> {
        self.fragments.get(&id).map(|fragment| fragment.state())
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn config(&self) -> &DeferConfig {
        &self.config
    }
}

impl Drop for DeferController {
    fn drop(&mut self) {
        for entry in self.fragments.iter() {
            entry.value().cancel();
        }
    }
}

impl std::fmt::Debug for DeferController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferController")
            .field("fragments", &self.fragments.len())
            .field("config", &self.config)
            .finish()
    }
}
