//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the read is recorded.
//! When the signal's value changes, all dependents are marked dirty.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and only when read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change, such as logging or pushing state to a host.
//!
//! ## Batches
//!
//! Writes inside [`batch`] settle together: every effect they affect runs
//! once, after the batch. A write outside any batch is a batch of one.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered with a thread-local stack of evaluation
//! frames. Reading a signal or memo records it, with its current version,
//! against the frame on top of the stack.

mod context;
mod effect;
mod memo;
mod owner;
mod runtime;
mod signal;

pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use owner::Owner;
pub use runtime::Runtime;
pub use signal::Signal;

use context::ReactiveContext;

/// Run `f` as one settled batch. See [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

/// Run `f` without recording any reads as dependencies.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _untracked = ReactiveContext::untracked();
    f()
}

/// Run queued effects. See [`Runtime::flush_effects`].
pub fn flush_effects() -> usize {
    Runtime::flush_effects()
}

/// Whether reads right now are recorded as dependencies.
pub fn is_tracking() -> bool {
    ReactiveContext::is_tracking()
}
