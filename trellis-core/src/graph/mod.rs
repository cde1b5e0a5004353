//! Dependency Graph
//!
//! The dependency graph is a directed acyclic graph where:
//!
//! - Nodes represent signals, memos and effects
//! - An edge from A to B means B read A during its last run
//!
//! When a signal changes, the graph is walked to find every affected node
//! and mark it dirty. The graph holds ids and dirty flags only; the values
//! themselves live in the reactive primitives.
//!
//! Both forward (dependencies) and reverse (dependents) edges are kept so
//! that re-subscribing after a run and propagating a change are both cheap.

mod node;
mod scheduler;

pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
