//! Update Scheduler
//!
//! The scheduler owns every node and edge of the dependency graph and works
//! out which nodes a change affects, in an order where dependencies come
//! before their dependents.
//!
//! # Algorithm
//!
//! 1. When a source node changes, its direct dependents become `Dirty`.
//! 2. Everything reachable beyond them becomes `MaybeDirty`.
//! 3. The affected nodes are sorted topologically (Kahn's algorithm).
//!
//! Nothing is recomputed here. Memos recompute when read; effects are
//! handed to the runtime's queue. A `MaybeDirty` node compares dependency
//! versions before doing any work, so an upstream memo that recomputes to an
//! equal value stops the wave ("push dirty, pull values").

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::{DirtyState, Node, NodeId, NodeKind};

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph, along with every edge touching it.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn kind(&self, node_id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node_id).map(Node::kind)
    }

    pub fn dirty_state(&self, node_id: NodeId) -> Option<DirtyState> {
        self.nodes.get(&node_id).map(Node::dirty_state)
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    ///
    /// Edges to or from unknown nodes are ignored.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if !self.contains(dependency) || !self.contains(dependent) {
            return;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Replace every dependency of `dependent` with `dependencies`.
    ///
    /// Called after each run of a memo or effect, since the set of nodes a
    /// computation reads can differ between runs.
    pub fn replace_dependencies<I>(&mut self, dependent: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        let old = match self.nodes.get_mut(&dependent) {
            Some(node) => node.take_dependencies(),
            None => return,
        };

        for dep_id in old {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(dependent);
            }
        }

        for dep_id in dependencies {
            self.add_edge(dep_id, dependent);
        }
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Returns every affected node in topological order.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            for dependent_id in source.dependents() {
                queue.push_back((*dependent_id, true));
            }
        }

        while let Some((node_id, direct)) = queue.pop_front() {
            if !visited.insert(node_id) {
                // A node reachable both directly and transitively must end
                // up Dirty, whichever path got here first.
                if direct {
                    if let Some(node) = self.nodes.get_mut(&node_id) {
                        node.mark_dirty();
                    }
                }
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                if direct {
                    node.mark_dirty();
                } else {
                    node.mark_maybe_dirty();
                }
                to_process.push(node_id);

                for dependent_id in node.dependents() {
                    queue.push_back((*dependent_id, false));
                }
            }
        }

        self.topological_sort(to_process)
    }

    /// Sort the given nodes so dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(*dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
