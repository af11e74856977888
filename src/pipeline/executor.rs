// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Graph executor
//!
//! Runs a graph on the tokio runtime with a bounded number of concurrently
//! executing nodes. A driver task tracks edge resolution and decides, for
//! each node whose incoming edges are all resolved, whether it runs, is
//! skipped or is aborted.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, Id, JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::context::{NodeInfo, NodeStatus, RunContext};
use crate::errors::{PlanflowError, PlanflowResult};
use crate::pipeline::dag::EdgeData;
use crate::pipeline::{Branch, Graph, GraphValidator, Node, TaskStatus};

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Name used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum number of concurrently running nodes; hardware concurrency when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

fn default_name() -> String {
    "planflow".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            workers: None,
        }
    }
}

impl ExecutorConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> PlanflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> PlanflowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Resolved worker count
    pub fn worker_count(&self) -> PlanflowResult<usize> {
        match self.workers {
            Some(0) => Err(PlanflowError::InvalidConfig {
                reason: "workers must be at least 1".to_string(),
            }),
            Some(n) => Ok(n),
            None => Ok(num_cpus::get()),
        }
    }
}

/// Runs graphs with bounded parallelism.
///
/// Clones share the worker pool, so nested runs started through a clone
/// count against the same limit.
#[derive(Debug, Clone)]
pub struct Executor {
    name: String,
    workers: usize,
    permits: Arc<Semaphore>,
}

impl Executor {
    /// Create an executor sized to the hardware concurrency
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    /// Create an executor with a fixed number of workers (at least one)
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            name: default_name(),
            workers,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Create an executor from configuration
    pub fn from_config(config: &ExecutorConfig) -> PlanflowResult<Self> {
        let mut executor = Self::with_workers(config.worker_count()?);
        executor.name = config.name.clone();
        Ok(executor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured worker count
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Workers not currently running a node
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Start running `graph`.
    ///
    /// Fails if the graph does not validate or no tokio runtime is
    /// available. Otherwise the run proceeds in the background; await the
    /// returned future and inspect `ctx` for the outcome.
    pub fn run(&self, graph: Arc<Graph>, ctx: RunContext) -> PlanflowResult<TaskFuture> {
        let validation = GraphValidator::check(&graph)?;
        for warning in &validation.warnings {
            warn!(graph = %graph.name(), "{warning}");
        }

        let runtime = Handle::try_current().map_err(|_| PlanflowError::RuntimeUnavailable {
            graph: graph.name().to_string(),
        })?;

        let name = graph.name().to_string();
        let run = GraphRun::new(self.clone(), graph, ctx);
        let handle = runtime.spawn(run.drive());

        Ok(TaskFuture {
            graph: name,
            handle: Some(handle),
        })
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion handle for a graph run
#[derive(Debug)]
pub struct TaskFuture {
    graph: String,
    handle: Option<JoinHandle<()>>,
}

impl TaskFuture {
    /// Name of the graph being run
    pub fn graph_name(&self) -> &str {
        &self.graph
    }

    /// Wait for the run to finish
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(graph = %self.graph, error = %e, "graph driver stopped unexpectedly");
            }
        }
    }

    /// Wait up to `timeout`; returns whether the run finished
    pub async fn wait_for(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return true;
        };
        let finished = tokio::time::timeout(timeout, handle).await.is_ok();
        if finished {
            self.handle = None;
        }
        finished
    }

    /// Whether the run has finished
    pub fn is_ready(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Pending,
    Fired,
    Dead,
}

type NodeOutcome = (NodeIndex, Result<TaskStatus, JoinError>);

/// State of one graph run, owned by its driver task
struct GraphRun {
    executor: Executor,
    graph: Arc<Graph>,
    ctx: RunContext,
    unresolved: Vec<usize>,
    edges: Vec<EdgeState>,
    ready: VecDeque<NodeIndex>,
    running: JoinSet<NodeOutcome>,
    spawned: HashMap<Id, NodeIndex>,
}

impl GraphRun {
    fn new(executor: Executor, graph: Arc<Graph>, ctx: RunContext) -> Self {
        let inner = graph.inner();
        let unresolved: Vec<usize> = inner
            .node_indices()
            .map(|i| inner.edges_directed(i, Direction::Incoming).count())
            .collect();
        let ready = inner
            .node_indices()
            .filter(|i| unresolved[i.index()] == 0)
            .collect();
        let edges = vec![EdgeState::Pending; inner.edge_count()];

        Self {
            executor,
            graph,
            ctx,
            unresolved,
            edges,
            ready,
            running: JoinSet::new(),
            spawned: HashMap::new(),
        }
    }

    async fn drive(mut self) {
        let timer = Instant::now();
        info!(
            graph = %self.graph.name(),
            nodes = self.graph.node_count(),
            executor = %self.executor.name(),
            "graph run started"
        );

        loop {
            while let Some(index) = self.ready.pop_front() {
                self.resolve(index);
            }

            match self.running.join_next_with_id().await {
                Some(Ok((id, (index, outcome)))) => {
                    self.spawned.remove(&id);
                    self.complete(index, outcome);
                }
                Some(Err(e)) => match self.spawned.remove(&e.id()) {
                    Some(index) => self.complete(index, Err(e)),
                    None => error!(graph = %self.graph.name(), error = %e, "unknown node task"),
                },
                None => break,
            }
        }

        info!(
            graph = %self.graph.name(),
            aborted = self.ctx.is_aborted(),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "graph run finished"
        );
    }

    /// All incoming edges of `index` are resolved: run, skip or abort it
    fn resolve(&mut self, index: NodeIndex) {
        let node = Arc::clone(&self.graph.inner()[index]);

        if self.ctx.is_aborted() {
            debug!(node = %node.name(), "node aborted before start");
            self.record(&node, NodeStatus::Aborted, None);
            self.kill_outgoing(index);
            return;
        }

        if !self.is_eligible(index) {
            debug!(node = %node.name(), "node skipped, gating branch not taken");
            self.record(&node, NodeStatus::Skipped, None);
            self.kill_outgoing(index);
            return;
        }

        self.spawn(index, node);
    }

    /// Every unconditional edge fired, and at least one conditional edge if any
    fn is_eligible(&self, index: NodeIndex) -> bool {
        let mut has_conditional = false;
        let mut conditional_fired = false;

        for edge in self.graph.inner().edges_directed(index, Direction::Incoming) {
            let fired = self.edges[edge.id().index()] == EdgeState::Fired;
            match edge.weight().branch {
                None if !fired => return false,
                None => {}
                Some(_) => {
                    has_conditional = true;
                    conditional_fired |= fired;
                }
            }
        }

        !has_conditional || conditional_fired
    }

    fn spawn(&mut self, index: NodeIndex, node: Arc<Node>) {
        let ctx = self.ctx.clone();
        let executor = self.executor.clone();
        // Composite nodes only wait on their nested run; holding a permit
        // there could starve the pool.
        let needs_permit = !node.spawns_subgraph();

        let handle = self.running.spawn(async move {
            let _permit = if needs_permit {
                Arc::clone(&executor.permits).acquire_owned().await.ok()
            } else {
                None
            };

            // The body runs on its own task so a panic surfaces as a JoinError
            let body = tokio::spawn(async move { node.run(&ctx, Some(&executor)).await });
            let _guard = AbortOnDrop(body.abort_handle());
            (index, body.await)
        });
        self.spawned.insert(handle.id(), index);
    }

    fn complete(&mut self, index: NodeIndex, outcome: Result<TaskStatus, JoinError>) {
        let status = match outcome {
            Ok(status) => status,
            Err(e) => {
                let node = Arc::clone(&self.graph.inner()[index]);
                let message = panic_message(e);
                error!(node = %node.name(), "{message}");
                self.record(&node, NodeStatus::Failure, Some(message));
                TaskStatus::Failure
            }
        };

        let outgoing: Vec<(EdgeIndex, NodeIndex, EdgeData)> = self
            .graph
            .inner()
            .edges_directed(index, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), *e.weight()))
            .collect();

        if status.is_success() {
            for (edge, target, data) in outgoing {
                let fires = data.branch.map_or(true, |b| b.matches(status));
                self.resolve_edge(edge, target, fires);
            }
            return;
        }

        let has_failure_branch = outgoing
            .iter()
            .any(|(_, _, data)| data.branch == Some(Branch::Failure));

        if !has_failure_branch {
            self.ctx.abort();
            for (edge, target, _) in outgoing {
                self.resolve_edge(edge, target, false);
            }
            return;
        }

        let mut raise_abort = false;
        for (edge, target, data) in outgoing {
            let fires = data.branch == Some(Branch::Failure);
            raise_abort |= fires && data.raises_abort;
            self.resolve_edge(edge, target, fires);
        }
        if raise_abort {
            self.ctx.abort();
        }
    }

    fn kill_outgoing(&mut self, index: NodeIndex) {
        let outgoing: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .inner()
            .edges_directed(index, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        for (edge, target) in outgoing {
            self.resolve_edge(edge, target, false);
        }
    }

    fn resolve_edge(&mut self, edge: EdgeIndex, target: NodeIndex, fired: bool) {
        self.edges[edge.index()] = if fired {
            EdgeState::Fired
        } else {
            EdgeState::Dead
        };

        let remaining = &mut self.unresolved[target.index()];
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.ready.push_back(target);
        }
    }

    fn record(&self, node: &Node, status: NodeStatus, message: Option<String>) {
        let mut info = NodeInfo::new(node.id(), node.name(), node.type_name(), status);
        if let Some(message) = message {
            info = info.with_message(message);
        }
        self.ctx.add_info(info);
    }
}

/// Cancels a node body whose wrapper task is dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "node was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("node panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("node panicked: {s}")
    } else {
        "node panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::errors::TaskError;
    use crate::pipeline::{Edge, NodeId, Task};
    use crate::tasks::StartTask;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "planflow=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }

    /// Writes its name under its first output key
    #[derive(Debug, Clone)]
    struct Writer;

    #[async_trait]
    impl Task for Writer {
        fn type_name(&self) -> &'static str {
            "writer"
        }

        async fn run(
            &self,
            node: &Node,
            ctx: &RunContext,
            _executor: Option<&Executor>,
        ) -> Result<TaskStatus, TaskError> {
            ctx.data().set_data(node.output_key(0)?, node.name().to_string());
            Ok(TaskStatus::Success)
        }
    }

    #[derive(Debug, Clone)]
    struct Fixed(TaskStatus);

    #[async_trait]
    impl Task for Fixed {
        fn type_name(&self) -> &'static str {
            "fixed"
        }

        async fn run(
            &self,
            _node: &Node,
            _ctx: &RunContext,
            _executor: Option<&Executor>,
        ) -> Result<TaskStatus, TaskError> {
            Ok(self.0)
        }
    }

    #[derive(Debug, Clone)]
    struct Panics;

    #[async_trait]
    impl Task for Panics {
        fn type_name(&self) -> &'static str {
            "panics"
        }

        async fn run(
            &self,
            _node: &Node,
            _ctx: &RunContext,
            _executor: Option<&Executor>,
        ) -> Result<TaskStatus, TaskError> {
            panic!("solver exploded");
        }
    }

    /// Sleeps and tracks how many instances run at once
    #[derive(Debug, Clone)]
    struct Sleeper {
        millis: u64,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for Sleeper {
        fn type_name(&self) -> &'static str {
            "sleeper"
        }

        async fn run(
            &self,
            _node: &Node,
            _ctx: &RunContext,
            _executor: Option<&Executor>,
        ) -> Result<TaskStatus, TaskError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(TaskStatus::Success)
        }
    }

    fn status_of(ctx: &RunContext, id: NodeId) -> NodeStatus {
        ctx.infos().status(id)
    }

    async fn run_to_end(executor: &Executor, graph: Graph, ctx: &RunContext) {
        let mut future = executor.run(Arc::new(graph), ctx.clone()).unwrap();
        future.wait().await;
        assert!(future.is_ready());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_diamond_runs_every_node_once() {
        init_tracing();
        let mut graph = Graph::new("diamond");
        let a = graph.add_node(Node::task("a", StartTask));
        let b = graph.add_node(Node::task("b", Writer).with_output_keys(["b"]));
        let c = graph.add_node(Node::task("c", Writer).with_output_keys(["c"]));
        let d = graph.add_node(Node::task("d", Writer).with_output_keys(["d"]));
        graph.add_edges(a, [Edge::to(b), Edge::to(c)]).unwrap();
        graph.add_edges(b, [Edge::to(d)]).unwrap();
        graph.add_edges(c, [Edge::to(d)]).unwrap();

        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(4), graph, &ctx).await;

        assert!(!ctx.is_aborted());
        assert_eq!(ctx.infos().len(), 4);
        for id in [a, b, c, d] {
            assert_eq!(status_of(&ctx, id), NodeStatus::Success);
        }
        assert_eq!(ctx.data().get_data::<String>("d").unwrap(), "d");

        // The join runs after both of its predecessors
        let order: Vec<NodeId> = ctx.infos().snapshot().iter().map(|i| i.node_id).collect();
        let pos = |id| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(d) > pos(b) && pos(d) > pos(c));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_independent_writers() {
        let mut graph = Graph::new("fan_out");
        let start = graph.add_node(Node::task("start", StartTask));
        let writers: Vec<Edge> = (0..16)
            .map(|i| {
                let name = format!("w{i}");
                Edge::to(graph.add_node(Node::task(name.clone(), Writer).with_output_keys([name])))
            })
            .collect();
        graph.add_edges(start, writers).unwrap();

        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(3), graph, &ctx).await;

        for i in 0..16 {
            assert_eq!(ctx.data().get_data::<String>(&format!("w{i}")).unwrap(), format!("w{i}"));
        }
        assert_eq!(ctx.infos().with_status(NodeStatus::Success).len(), 17);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_aborts_downstream() {
        let mut graph = Graph::new("abort");
        let start = graph.add_node(Node::task("start", StartTask));
        let fail = graph.add_node(Node::task("fail", Fixed(TaskStatus::Failure)));
        let after = graph.add_node(Node::task("after", Writer).with_output_keys(["after"]));
        let last = graph.add_node(Node::task("last", Writer).with_output_keys(["last"]));
        graph.add_edges(start, [Edge::to(fail)]).unwrap();
        graph.add_edges(fail, [Edge::to(after)]).unwrap();
        graph.add_edges(after, [Edge::to(last)]).unwrap();

        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(2), graph, &ctx).await;

        assert!(ctx.is_aborted());
        assert_eq!(status_of(&ctx, fail), NodeStatus::Failure);
        assert_eq!(status_of(&ctx, after), NodeStatus::Aborted);
        assert_eq!(status_of(&ctx, last), NodeStatus::Aborted);
        assert!(ctx.infos().get(after).unwrap().message.is_empty());
        assert!(!ctx.data().has_key("after"));
    }

    fn branching_graph(check_status: TaskStatus, raise_abort: bool) -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("branching");
        let start = graph.add_node(Node::task("start", StartTask));
        let check = graph.add_node(Node::task("check", Fixed(check_status)).conditional(true));
        let ok = graph.add_node(Node::task("ok", Writer).with_output_keys(["ok"]));
        let fix = graph.add_node(Node::task("fix", Writer).with_output_keys(["fix"]));
        graph.add_edges(start, [Edge::to(check)]).unwrap();

        let failure = if raise_abort {
            Edge::to(fix).on_failure().raising_abort()
        } else {
            Edge::to(fix).on_failure()
        };
        graph.add_edges(check, [Edge::to(ok).on_success(), failure]).unwrap();
        (graph, ok, fix)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_success_branch() {
        let (graph, ok, fix) = branching_graph(TaskStatus::Success, false);
        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(2), graph, &ctx).await;

        assert!(!ctx.is_aborted());
        assert_eq!(status_of(&ctx, ok), NodeStatus::Success);
        assert_eq!(status_of(&ctx, fix), NodeStatus::Skipped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_branch_is_control_flow() {
        let (graph, ok, fix) = branching_graph(TaskStatus::Failure, false);
        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(2), graph, &ctx).await;

        assert!(!ctx.is_aborted());
        assert_eq!(status_of(&ctx, ok), NodeStatus::Skipped);
        assert_eq!(status_of(&ctx, fix), NodeStatus::Success);
        assert!(ctx.data().has_key("fix"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_branch_raising_abort() {
        let (graph, ok, fix) = branching_graph(TaskStatus::Failure, true);
        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(2), graph, &ctx).await;

        assert!(ctx.is_aborted());
        assert_eq!(status_of(&ctx, ok), NodeStatus::Aborted);
        assert_eq!(status_of(&ctx, fix), NodeStatus::Aborted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panic_becomes_failure() {
        let mut graph = Graph::new("panic");
        let start = graph.add_node(Node::task("start", StartTask));
        let boom = graph.add_node(Node::task("boom", Panics));
        graph.add_edges(start, [Edge::to(boom)]).unwrap();

        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(2), graph, &ctx).await;

        let info = ctx.infos().get(boom).unwrap();
        assert_eq!(info.status, NodeStatus::Failure);
        assert!(info.message.contains("solver exploded"));
        assert!(ctx.is_aborted());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_limit_is_respected() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut graph = Graph::new("bounded");
        let start = graph.add_node(Node::task("start", StartTask));
        let sleepers: Vec<Edge> = (0..6)
            .map(|i| {
                let task = Sleeper {
                    millis: 30,
                    active: Arc::clone(&active),
                    peak: Arc::clone(&peak),
                };
                Edge::to(graph.add_node(Node::task(format!("s{i}"), task)))
            })
            .collect();
        graph.add_edges(start, sleepers).unwrap();

        let executor = Executor::with_workers(2);
        let ctx = RunContext::new();
        run_to_end(&executor, graph, &ctx).await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(executor.available_workers(), 2);
        assert_eq!(ctx.infos().with_status(NodeStatus::Success).len(), 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nested_graph_copies_result_keys() {
        let mut inner = Graph::new("inner").with_result_keys(["inner_out"]);
        let inner_start = inner.add_node(Node::task("inner_start", StartTask));
        let produce = inner.add_node(Node::task("produce", Writer).with_output_keys(["inner_out"]));
        inner.add_edges(inner_start, [Edge::to(produce)]).unwrap();

        let mut outer = Graph::new("outer");
        let start = outer.add_node(Node::task("start", StartTask));
        let nested = outer.add_node(Node::graph("nested", inner).with_output_keys(["result"]));
        outer.add_edges(start, [Edge::to(nested)]).unwrap();

        // A single worker must not deadlock on the nested run
        let executor = Executor::with_workers(1);
        let ctx = RunContext::new();
        let mut future = executor.run(Arc::new(outer), ctx.clone()).unwrap();
        assert!(future.wait_for(Duration::from_secs(5)).await);

        assert_eq!(status_of(&ctx, nested), NodeStatus::Success);
        assert_eq!(ctx.data().get_data::<String>("result").unwrap(), "produce");
        assert_eq!(ctx.infos().get(nested).unwrap().type_name, "graph");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nested_abort_fails_graph_node() {
        let mut inner = Graph::new("inner");
        let inner_start = inner.add_node(Node::task("inner_start", StartTask));
        let fail = inner.add_node(Node::task("fail", Fixed(TaskStatus::Failure)));
        inner.add_edges(inner_start, [Edge::to(fail)]).unwrap();

        let mut outer = Graph::new("outer");
        let start = outer.add_node(Node::task("start", StartTask));
        let nested = outer.add_node(Node::graph("nested", inner));
        let after = outer.add_node(Node::task("after", Writer).with_output_keys(["after"]));
        outer.add_edges(start, [Edge::to(nested)]).unwrap();
        outer.add_edges(nested, [Edge::to(after)]).unwrap();

        let ctx = RunContext::new();
        run_to_end(&Executor::with_workers(2), outer, &ctx).await;

        let info = ctx.infos().get(nested).unwrap();
        assert_eq!(info.status, NodeStatus::Failure);
        assert!(info.message.contains("subgraph aborted"));
        assert_eq!(status_of(&ctx, after), NodeStatus::Aborted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_graph_is_rejected() {
        let mut graph = Graph::new("two_roots");
        graph.add_node(Node::task("a", StartTask));
        graph.add_node(Node::task("b", StartTask));

        let ctx = RunContext::new();
        let result = Executor::with_workers(1).run(Arc::new(graph), ctx.clone());
        assert!(matches!(result, Err(PlanflowError::InvalidGraph { .. })));
        assert!(ctx.infos().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_for_times_out() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new("slow");
        graph.add_node(Node::task(
            "slow",
            Sleeper {
                millis: 200,
                active,
                peak,
            },
        ));

        let mut future = Executor::with_workers(1)
            .run(Arc::new(graph), RunContext::new())
            .unwrap();
        assert!(!future.wait_for(Duration::from_millis(10)).await);
        assert!(!future.is_ready());
        assert!(future.wait_for(Duration::from_secs(5)).await);
        assert!(future.is_ready());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_node_resolves_downstream() {
        let mut graph = Graph::new("cancelled");
        let slow = graph.add_node(Node::task(
            "slow",
            Sleeper {
                millis: 100,
                active: Arc::default(),
                peak: Arc::default(),
            },
        ));
        let after = graph.add_node(Node::task("after", Writer).with_output_keys(["after"]));
        graph.add_edges(slow, [Edge::to(after)]).unwrap();

        let ctx = RunContext::new();
        let mut run = GraphRun::new(Executor::with_workers(1), Arc::new(graph), ctx.clone());
        while let Some(index) = run.ready.pop_front() {
            run.resolve(index);
        }
        run.running.abort_all();
        run.drive().await;

        let info = ctx.infos().get(slow).unwrap();
        assert_eq!(info.status, NodeStatus::Failure);
        assert!(info.message.contains("cancelled"));
        assert_eq!(status_of(&ctx, after), NodeStatus::Aborted);
        assert!(ctx.is_aborted());

        // The cancelled body never records a second entry
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ctx.infos().named("slow").len(), 1);
        assert!(!ctx.data().has_key("after"));
    }

    #[test]
    fn test_run_without_runtime() {
        let mut graph = Graph::new("no_runtime");
        graph.add_node(Node::task("a", StartTask));

        let result = Executor::with_workers(1).run(Arc::new(graph), RunContext::new());
        assert!(matches!(result, Err(PlanflowError::RuntimeUnavailable { .. })));
    }

    #[test]
    fn test_executor_config() {
        let config = ExecutorConfig::from_yaml("name: raster\nworkers: 3\n").unwrap();
        let executor = Executor::from_config(&config).unwrap();
        assert_eq!(executor.name(), "raster");
        assert_eq!(executor.worker_count(), 3);

        let config = ExecutorConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ExecutorConfig::default());
        assert_eq!(config.worker_count().unwrap(), num_cpus::get());

        let config = ExecutorConfig::from_yaml("workers: 0").unwrap();
        assert!(matches!(
            Executor::from_config(&config),
            Err(PlanflowError::InvalidConfig { .. })
        ));

        assert!(matches!(
            ExecutorConfig::from_yaml("workers: [1"),
            Err(PlanflowError::Yaml { .. })
        ));
    }
}
