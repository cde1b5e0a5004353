//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects) and disposal scopes
//! - The dependency graph behind them
//! - Deferred fragments: content that loads once a trigger fires
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Dependency graph and dirty propagation
//! - `defer`: Trigger matching, the fragment state machine and its controller
//! - `config`: Runtime settings, loadable from JSON
//! - `error`: Error types shared by the modules above
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{Effect, Memo, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     Memo::new(move || count.get() * 2)
//! };
//!
//! // Create an effect
//! let _log = {
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     Effect::new(move || {
//!         println!("Count: {}, Doubled: {}", count.get(), doubled.get());
//!     })
//! };
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod config;
pub mod defer;
pub mod error;
pub mod graph;
pub mod reactive;
