//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal or memo is
//! read, it is recorded against the computation on top of the stack.
//!
//! # Implementation
//!
//! A thread-local stack of frames. Running a memo or effect pushes a
//! tracking frame; `untrack` pushes a frame that swallows reads. Nested
//! frames (a memo read inside an effect) collect their own dependencies and
//! leave the outer frame's untouched.

use std::cell::RefCell;
use std::sync::Arc;

use smallvec::SmallVec;

use super::runtime::Source;
use crate::graph::{NodeId, NodeKind};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static REFRESHING: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a memo as being refreshed on the current thread.
///
/// Only this thread's refreshes count, so another thread reading the same
/// memo at the same time is not a cycle.
pub(crate) struct RefreshGuard {
    node: NodeId,
}

impl RefreshGuard {
    /// `None` if `node` is already being refreshed further up this thread's
    /// call stack.
    pub(crate) fn enter(node: NodeId) -> Option<Self> {
        REFRESHING.with(|refreshing| {
            let mut refreshing = refreshing.borrow_mut();
            if refreshing.contains(&node) {
                return None;
            }
            refreshing.push(node);
            Some(Self { node })
        })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        REFRESHING.with(|refreshing| {
            let mut refreshing = refreshing.borrow_mut();
            if let Some(pos) = refreshing.iter().rposition(|node| *node == self.node) {
                refreshing.remove(pos);
            }
        });
    }
}

/// A node read during a computation, with the version it had at the time.
#[derive(Clone)]
pub(crate) struct Dependency {
    pub(crate) source: Arc<dyn Source>,
    pub(crate) version: u64,
}

impl Dependency {
    pub(crate) fn node_id(&self) -> NodeId {
        self.source.node_id()
    }

    /// Bring the source up to date and report whether it moved past the
    /// version recorded here.
    pub(crate) fn has_changed(&self) -> Result<bool, crate::error::ReactiveError> {
        self.source.refresh()?;
        Ok(self.source.version() != self.version)
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("node", &self.node_id())
            .field("version", &self.version)
            .finish()
    }
}

pub(crate) type Dependencies = SmallVec<[Dependency; 4]>;

#[derive(Debug, Clone, Copy)]
enum Frame {
    Tracking { node: NodeId, kind: NodeKind },
    Untracked,
}

struct ContextEntry {
    frame: Frame,
    dependencies: Dependencies,
}

/// Guard that pops its frame when dropped.
///
/// Popping on drop keeps the stack balanced when a computation panics.
pub(crate) struct ReactiveContext {
    node: Option<NodeId>,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a tracking frame for a memo or effect.
    pub(crate) fn enter(node: NodeId, kind: NodeKind) -> Self {
        Self::push(Frame::Tracking { node, kind });
        Self {
            node: Some(node),
            finished: false,
        }
    }

    /// Enter a frame in which reads register nothing.
    pub(crate) fn untracked() -> Self {
        Self::push(Frame::Untracked);
        Self {
            node: None,
            finished: false,
        }
    }

    fn push(frame: Frame) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                frame,
                dependencies: SmallVec::new(),
            });
        });
    }

    /// Whether a read right now would be recorded as a dependency.
    pub(crate) fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| {
            matches!(
                stack.borrow().last().map(|entry| entry.frame),
                Some(Frame::Tracking { .. })
            )
        })
    }

    /// The node whose frame is on top, if it is tracking.
    pub(crate) fn current_node() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| match stack.borrow().last().map(|entry| entry.frame) {
            Some(Frame::Tracking { node, .. }) => Some(node),
            _ => None,
        })
    }

    /// The innermost memo being computed, looking through untracked frames.
    pub(crate) fn deriving_memo() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| {
            stack.borrow().iter().rev().find_map(|entry| match entry.frame {
                Frame::Tracking {
                    node,
                    kind: NodeKind::Derived,
                } => Some(node),
                _ => None,
            })
        })
    }

    /// Record a read of `source` against the top frame.
    pub(crate) fn track<S>(source: &Arc<S>)
    where
        S: Source + 'static,
    {
        if !Self::is_tracking() {
            return;
        }

        let node = source.node_id();
        let version = source.version();
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                // First read wins: an older version can only cause an extra
                // re-run, never a missed one.
                if entry.dependencies.iter().any(|dep| dep.node_id() == node) {
                    return;
                }
                entry.dependencies.push(Dependency {
                    source: Arc::clone(source) as Arc<dyn Source>,
                    version,
                });
            }
        });
    }

    /// Pop the frame and return what it collected.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.finished = true;
        self.pop().map(|entry| entry.dependencies).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = &popped {
            let popped_node = match entry.frame {
                Frame::Tracking { node, .. } => Some(node),
                Frame::Untracked => None,
            };
            debug_assert_eq!(
                popped_node, self.node,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.node, popped_node
            );
        }

        popped
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            // Dropping the collected dependencies here may release the last
            // handle on a memo, so do it outside the stack borrow.
            let _ = self.pop();
        }
    }
}
