// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Graph nodes and the task contract
//!
//! A [`Node`] is either a leaf [`Task`] or a nested [`Graph`]. Both run
//! through [`Node::run`], which owns the bookkeeping every node shares:
//! the abort check, timing, turning task errors into a failure record and
//! writing exactly one [`NodeInfo`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::{NodeInfo, NodeStatus, RunContext};
use crate::errors::TaskError;
use crate::pipeline::{Executor, Graph};

/// Type name reported for composite graph nodes
pub const GRAPH_TYPE_NAME: &str = "graph";

/// Unique node identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Data key namespaced by this id
    pub fn key(&self, suffix: &str) -> String {
        format!("{}/{}", self.0, suffix)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value returned by a task body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Failure = 0,
    Success = 1,
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for TaskStatus {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Unit of work run by a leaf node
///
/// Implementations hold configuration only. Per-run data goes through the
/// [`RunContext`] storage under the node's declared keys.
#[async_trait]
pub trait Task: DynClone + fmt::Debug + Send + Sync {
    /// Stable type name, used for persistence and diagnostics
    fn type_name(&self) -> &'static str;

    /// Configuration as JSON, used for equality and persistence
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Execute the task.
    ///
    /// `executor` is the executor driving the current run. Tasks that build
    /// subgraphs use it to run them.
    async fn run(
        &self,
        node: &Node,
        ctx: &RunContext,
        executor: Option<&Executor>,
    ) -> Result<TaskStatus, TaskError>;

    /// Whether `run` builds and awaits a subgraph
    fn spawns_subgraph(&self) -> bool {
        false
    }

    /// Subgraph built by the most recent `run`, if any
    fn last_subgraph(&self) -> Option<Arc<Graph>> {
        None
    }
}

dyn_clone::clone_trait_object!(Task);

/// What a node runs
#[derive(Debug)]
pub enum NodeKind {
    Task(Box<dyn Task>),
    Graph(Arc<Graph>),
}

impl Clone for NodeKind {
    fn clone(&self) -> Self {
        match self {
            Self::Task(task) => Self::Task(dyn_clone::clone_box(&**task)),
            Self::Graph(graph) => Self::Graph(Arc::new(Graph::clone(graph))),
        }
    }
}

impl PartialEq for NodeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Task(a), Self::Task(b)) => {
                a.type_name() == b.type_name() && a.config() == b.config()
            }
            (Self::Graph(a), Self::Graph(b)) => a == b,
            _ => false,
        }
    }
}

/// Vertex of a task graph
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    conditional: bool,
    kind: NodeKind,
}

impl Node {
    /// Create a leaf node
    pub fn task(name: impl Into<String>, task: impl Task + 'static) -> Self {
        Self::with_kind(name, NodeKind::Task(Box::new(task)))
    }

    /// Create a composite node owning `graph`
    pub fn graph(name: impl Into<String>, graph: Graph) -> Self {
        Self::with_kind(name, NodeKind::Graph(Arc::new(graph)))
    }

    pub fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            conditional: false,
            kind,
        }
    }

    pub fn with_input_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the node conditional: its status selects outgoing branches
    pub fn conditional(mut self, conditional: bool) -> Self {
        self.conditional = conditional;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_keys(&self) -> &[String] {
        &self.input_keys
    }

    pub fn output_keys(&self) -> &[String] {
        &self.output_keys
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Task type name, or "graph" for composite nodes
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Task(task) => task.type_name(),
            NodeKind::Graph(_) => GRAPH_TYPE_NAME,
        }
    }

    /// Whether running this node awaits a nested run
    pub fn spawns_subgraph(&self) -> bool {
        match &self.kind {
            NodeKind::Task(task) => task.spawns_subgraph(),
            NodeKind::Graph(_) => true,
        }
    }

    /// Owned graph for composite nodes, last built subgraph for dynamic tasks
    pub fn materialized_subgraph(&self) -> Option<Arc<Graph>> {
        match &self.kind {
            NodeKind::Task(task) => task.last_subgraph(),
            NodeKind::Graph(graph) => Some(Arc::clone(graph)),
        }
    }

    /// Input key at `index`, as a validation error when missing
    pub fn input_key(&self, index: usize) -> Result<&str, TaskError> {
        self.input_keys
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                TaskError::validation(&self.name, format!("no input key at index {index}"))
            })
    }

    /// Output key at `index`, as a validation error when missing
    pub fn output_key(&self, index: usize) -> Result<&str, TaskError> {
        self.output_keys
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                TaskError::validation(&self.name, format!("no output key at index {index}"))
            })
    }

    /// Run the node and record its outcome.
    ///
    /// Never fails: task errors become a failure record and
    /// [`TaskStatus::Failure`].
    pub async fn run(&self, ctx: &RunContext, executor: Option<&Executor>) -> TaskStatus {
        if ctx.is_aborted() {
            ctx.add_info(NodeInfo::new(self.id, &self.name, self.type_name(), NodeStatus::Aborted));
            return TaskStatus::Failure;
        }

        debug!(node = %self.name, type_name = self.type_name(), "node started");
        let timer = Instant::now();

        let outcome = match &self.kind {
            NodeKind::Task(task) => task.run(self, ctx, executor).await,
            NodeKind::Graph(graph) => self.run_graph(graph, ctx, executor).await,
        };

        let elapsed = timer.elapsed();
        let (status, info) = match outcome {
            Ok(status) => {
                let node_status = if status.is_success() {
                    NodeStatus::Success
                } else {
                    NodeStatus::Failure
                };
                (status, NodeInfo::new(self.id, &self.name, self.type_name(), node_status))
            }
            Err(e) => {
                warn!(node = %self.name, error = %e, "node failed");
                (
                    TaskStatus::Failure,
                    NodeInfo::new(self.id, &self.name, self.type_name(), NodeStatus::Failure)
                        .with_message(e.to_string()),
                )
            }
        };

        debug!(
            node = %self.name,
            ?status,
            elapsed_ms = elapsed.as_millis() as u64,
            "node finished"
        );
        ctx.add_info(info.with_elapsed(elapsed));
        status
    }

    async fn run_graph(
        &self,
        graph: &Arc<Graph>,
        ctx: &RunContext,
        executor: Option<&Executor>,
    ) -> Result<TaskStatus, TaskError> {
        let executor = executor.ok_or_else(|| TaskError::MissingExecutor {
            task: self.name.clone(),
        })?;

        let mut future = executor.run(Arc::clone(graph), ctx.clone())?;
        future.wait().await;

        if ctx.is_aborted() {
            return Err(TaskError::execution(&self.name, anyhow::anyhow!("subgraph aborted")));
        }

        for (inner, outer) in graph.result_keys().iter().zip(&self.output_keys) {
            ctx.data().copy_data(inner, outer)?;
        }

        Ok(TaskStatus::Success)
    }
}

/// Deep copy with fresh identity for the node and every descendant
impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            id: NodeId::new(),
            name: self.name.clone(),
            input_keys: self.input_keys.clone(),
            output_keys: self.output_keys.clone(),
            conditional: self.conditional,
            kind: self.kind.clone(),
        }
    }
}

/// Structural equality: configuration and shape, never identity
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.input_keys == other.input_keys
            && self.output_keys == other.output_keys
            && self.conditional == other.conditional
            && self.kind == other.kind
    }
}
