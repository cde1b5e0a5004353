//! Owners
//!
//! An [`Owner`] stands for the lifetime of a view. Effects created through it
//! and cleanups registered on it are torn down together when the owner is
//! disposed or dropped, so nothing keeps running against a view that is gone.

use parking_lot::Mutex;

use super::effect::Effect;

type Cleanup = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct OwnerState {
    disposed: bool,
    effects: Vec<Effect>,
    cleanups: Vec<Cleanup>,
}

/// A disposal scope for effects and cleanup callbacks.
pub struct Owner {
    name: String,
    state: Mutex<OwnerState>,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(OwnerState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create an effect tied to this owner.
    ///
    /// On a disposed owner the effect still runs once and is then disposed
    /// straight away.
    pub fn effect<F>(&self, run: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.adopt(Effect::new(run))
    }

    /// Tie an existing effect to this owner.
    pub fn adopt(&self, effect: Effect) -> Effect {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            tracing::warn!(owner = %self.name, "effect adopted by a disposed owner");
            effect.dispose();
        } else {
            state.effects.push(effect.clone());
        }
        effect
    }

    /// Run `cleanup` when the owner is disposed. Runs it at once if the
    /// owner is already gone.
    pub fn on_cleanup<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            cleanup();
        } else {
            state.cleanups.push(Box::new(cleanup));
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Dispose every owned effect, then run cleanups newest first.
    pub fn dispose(&self) {
        let (effects, cleanups) = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                std::mem::take(&mut state.effects),
                std::mem::take(&mut state.cleanups),
            )
        };

        tracing::debug!(
            owner = %self.name,
            effects = effects.len(),
            cleanups = cleanups.len(),
            "owner disposed"
        );

        for effect in &effects {
            effect.dispose();
        }
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Owner")
            .field("name", &self.name)
            .field("disposed", &state.disposed)
            .field("effects", &state.effects.len())
            .field("cleanups", &state.cleanups.len())
            .finish()
    }
}
