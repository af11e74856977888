// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Task graphs
//!
//! A [`Graph`] owns its nodes in a petgraph arena and wires them with
//! dependency edges. Edges are validated as they are added, so a graph is
//! acyclic at every point of its life.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::errors::{PlanflowError, PlanflowResult};
use crate::pipeline::{Node, NodeId, TaskStatus};

/// Status an edge is gated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Success,
    Failure,
}

impl Branch {
    /// Whether a node finishing with `status` takes this branch
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            Self::Success => status.is_success(),
            Self::Failure => !status.is_success(),
        }
    }
}

/// Outgoing edge passed to [`Graph::add_edges`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    target: NodeId,
    branch: Option<Branch>,
    raises_abort: bool,
}

impl Edge {
    /// Unconditional edge to `target`
    pub fn to(target: NodeId) -> Self {
        Self {
            target,
            branch: None,
            raises_abort: false,
        }
    }

    /// Fire only when the source succeeds
    pub fn on_success(mut self) -> Self {
        self.branch = Some(Branch::Success);
        self
    }

    /// Fire only when the source fails
    pub fn on_failure(mut self) -> Self {
        self.branch = Some(Branch::Failure);
        self
    }

    /// Taking this failure branch still aborts the run
    pub fn raising_abort(mut self) -> Self {
        self.raises_abort = true;
        self
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn branch(&self) -> Option<Branch> {
        self.branch
    }

    pub fn raises_abort(&self) -> bool {
        self.raises_abort
    }
}

/// Edge weight stored in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeData {
    pub(crate) branch: Option<Branch>,
    pub(crate) raises_abort: bool,
}

/// Read-only view of a wired edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView {
    pub from: NodeId,
    pub to: NodeId,
    pub branch: Option<Branch>,
    pub raises_abort: bool,
}

/// Directed acyclic graph of nodes
pub struct Graph {
    name: String,
    graph: DiGraph<Arc<Node>, EdgeData>,
    index: HashMap<NodeId, NodeIndex>,
    result_keys: Vec<String>,
}

impl Graph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            result_keys: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inner keys copied to the owning node's output keys after a successful run
    pub fn with_result_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.result_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn result_keys(&self) -> &[String] {
        &self.result_keys
    }

    /// Add a node, taking ownership of it
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        let index = self.graph.add_node(Arc::new(node));
        self.index.insert(id, index);
        id
    }

    /// Wire edges from `from`.
    ///
    /// The whole batch is checked before anything is inserted; on error the
    /// graph is left unchanged.
    pub fn add_edges(
        &mut self,
        from: NodeId,
        edges: impl IntoIterator<Item = Edge>,
    ) -> PlanflowResult<()> {
        let source = self.index_of(from)?;
        let edges: Vec<Edge> = edges.into_iter().collect();

        let mut resolved = Vec::with_capacity(edges.len());
        for edge in &edges {
            let target = self.index_of(edge.target)?;

            if edge.branch.is_some() && !self.graph[source].is_conditional() {
                return Err(PlanflowError::InvalidBranch {
                    node: self.graph[source].name().to_string(),
                });
            }

            // New edges all leave `source`, so only a pre-existing path back
            // to it can close a cycle.
            if source == target || has_path_connecting(&self.graph, target, source, None) {
                return Err(PlanflowError::CycleDetected {
                    graph: self.name.clone(),
                    from: self.graph[source].name().to_string(),
                    to: self.graph[target].name().to_string(),
                });
            }

            resolved.push((target, *edge));
        }

        for (target, edge) in resolved {
            self.graph.add_edge(
                source,
                target,
                EdgeData {
                    branch: edge.branch,
                    raises_abort: edge.raises_abort,
                },
            );
        }

        Ok(())
    }

    fn index_of(&self, id: NodeId) -> PlanflowResult<NodeIndex> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| PlanflowError::UnknownNode {
                graph: self.name.clone(),
                node: id.to_string(),
            })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.index.get(&id).map(|&i| &self.graph[i])
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> + '_ {
        self.graph.node_indices().map(move |i| &self.graph[i])
    }

    /// Edges in insertion order
    pub fn edges(&self) -> Vec<EdgeView> {
        self.graph
            .edge_references()
            .map(|e| EdgeView {
                from: self.graph[e.source()].id(),
                to: self.graph[e.target()].id(),
                branch: e.weight().branch,
                raises_abort: e.weight().raises_abort,
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes without incoming edges
    pub fn roots(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&i| {
                self.graph
                    .neighbors_directed(i, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|i| self.graph[i].id())
            .collect()
    }

    /// The single node without incoming edges, if there is exactly one
    pub fn start_node(&self) -> Option<NodeId> {
        match self.roots().as_slice() {
            [root] => Some(*root),
            _ => None,
        }
    }

    /// Direct predecessors of a node
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct successors of a node
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        let Some(&index) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<NodeId> = self
            .graph
            .edges_directed(index, direction)
            .map(|e| match direction {
                Direction::Incoming => self.graph[e.source()].id(),
                Direction::Outgoing => self.graph[e.target()].id(),
            })
            .collect();
        ids.dedup();
        ids
    }

    /// Check if `a` depends, directly or transitively, on `b`
    pub fn depends_on(&self, a: NodeId, b: NodeId) -> bool {
        match (self.index.get(&a), self.index.get(&b)) {
            (Some(&a), Some(&b)) => a != b && has_path_connecting(&self.graph, b, a, None),
            _ => false,
        }
    }

    /// Call `f` on every node with its nesting depth, descending into
    /// composite nodes and into subgraphs built by dynamic tasks.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize),
    {
        self.visit_at(0, f);
    }

    fn visit_at<F>(&self, depth: usize, f: &mut F)
    where
        F: FnMut(&Node, usize),
    {
        for node in self.nodes() {
            f(node, depth);
            if let Some(subgraph) = node.materialized_subgraph() {
                subgraph.visit_at(depth + 1, f);
            }
        }
    }

    pub(crate) fn inner(&self) -> &DiGraph<Arc<Node>, EdgeData> {
        &self.graph
    }
}

/// Deep copy: every node gets a fresh id and edges are remapped.
impl Clone for Graph {
    fn clone(&self) -> Self {
        let mut copy = Graph::new(self.name.clone()).with_result_keys(self.result_keys.clone());

        let mut remap = HashMap::with_capacity(self.graph.node_count());
        for index in self.graph.node_indices() {
            let node = Node::clone(&self.graph[index]);
            let id = node.id();
            let new_index = copy.graph.add_node(Arc::new(node));
            copy.index.insert(id, new_index);
            remap.insert(index, new_index);
        }

        for edge in self.graph.edge_references() {
            copy.graph
                .add_edge(remap[&edge.source()], remap[&edge.target()], *edge.weight());
        }

        copy
    }
}

/// Structural equality: children in insertion order, edges by index
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name
            || self.result_keys != other.result_keys
            || self.graph.node_count() != other.graph.node_count()
            || self.graph.edge_count() != other.graph.edge_count()
        {
            return false;
        }

        let nodes_equal = self
            .graph
            .node_indices()
            .zip(other.graph.node_indices())
            .all(|(a, b)| *self.graph[a] == *other.graph[b]);

        let edges_equal = self
            .graph
            .edge_references()
            .zip(other.graph.edge_references())
            .all(|(a, b)| {
                a.source().index() == b.source().index()
                    && a.target().index() == b.target().index()
                    && a.weight() == b.weight()
            });

        nodes_equal && edges_equal
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<&str> = self.nodes().map(|n| n.name()).collect();
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &nodes)
            .field("edges", &self.edge_count())
            .field("result_keys", &self.result_keys)
            .finish()
    }
}
