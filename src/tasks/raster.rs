// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Raster motion task
//!
//! Plans a raster program: segments alternating with transitions,
//! `[seg1, trans1, seg2, ..., segk]`. At run time the task builds a subgraph
//! sized by its input:
//!
//! ```text
//!            Start
//!          /   |   \
//!     Raster1 Raster2 Raster3        (Cartesian, independent)
//!          \  /    \  /
//!         Trans1  Trans2             (each joins its two neighbours)
//! ```
//!
//! runs it through the executor it was given and splices the planned pieces
//! back into a copy of the input program.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::context::RunContext;
use crate::errors::TaskError;
use crate::pipeline::{Edge, Executor, Graph, Node, NodeId, Task, TaskStatus};
use crate::planning::{CompositeInstruction, PipelineStyle};
use crate::tasks::{MotionPipelineTask, StartTask, TransitionTask};

/// Raster motion task
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RasterMotionTask {
    /// Plan transitions with the Cartesian pipeline instead of freespace
    #[serde(default)]
    pub cartesian_transition: bool,
    #[serde(default)]
    pub run_simple_planner: bool,

    #[serde(skip)]
    last_graph: Arc<Mutex<Option<Arc<Graph>>>>,
}

impl RasterMotionTask {
    pub const TYPE_NAME: &'static str = "raster_motion";

    pub fn new(cartesian_transition: bool, run_simple_planner: bool) -> Self {
        Self {
            cartesian_transition,
            run_simple_planner,
            last_graph: Arc::default(),
        }
    }

    fn last_graph(&self) -> MutexGuard<'_, Option<Arc<Graph>>> {
        self.last_graph.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read the input and check it has the raster shape
    fn check_input(
        &self,
        node: &Node,
        ctx: &RunContext,
    ) -> Result<CompositeInstruction, TaskError> {
        let fail = |reason: String| {
            let e = TaskError::validation(node.name(), reason);
            error!("{e}");
            e
        };

        let key = node.input_key(0)?;
        let value = ctx
            .data()
            .get_any(key)
            .map_err(|_| fail(format!("input '{key}' is missing")))?;
        let program = value
            .downcast_ref::<CompositeInstruction>()
            .ok_or_else(|| fail("input is not a composite instruction".to_string()))?;

        if !program.has_start_instruction() {
            return Err(fail("input should have a start instruction".to_string()));
        }

        if program.entries.iter().any(|entry| !entry.is_composite()) {
            return Err(fail(
                "both segments and transitions should be composite instructions".to_string(),
            ));
        }

        if program.len() % 2 == 0 {
            return Err(fail(format!(
                "input should alternate segments and transitions, found {} entries",
                program.len()
            )));
        }

        Ok(program.clone())
    }

    /// Build the subgraph and seed its inputs
    fn build_subgraph(
        &self,
        node: &Node,
        ctx: &RunContext,
        program: &CompositeInstruction,
    ) -> Result<(Graph, RasterPlan), TaskError> {
        let entries: Vec<&CompositeInstruction> =
            program.entries.iter().filter_map(|e| e.as_composite()).collect();

        // Resolve every segment's start before touching the storage
        let mut segments = Vec::with_capacity(entries.len() / 2 + 1);
        for (raster_idx, idx) in (0..entries.len()).step_by(2).enumerate() {
            let start = if idx == 0 {
                program.start_instruction()
            } else {
                entries[idx - 1].last_move_instruction()
            };
            let start = start.ok_or_else(|| {
                TaskError::validation(
                    node.name(),
                    format!("transition before segment #{} has no moves", raster_idx + 1),
                )
            })?;

            let mut segment = entries[idx].clone();
            segment.manipulator = segment.manipulator.combined(&program.manipulator);
            segment.set_start_instruction(start.as_start());
            segments.push(segment);
        }

        let mut graph = Graph::new(format!("{} subgraph", node.name()));
        let mut plan = RasterPlan::default();
        let start = graph.add_node(Node::task("Start", StartTask));

        let mut producers: Vec<(NodeId, String)> = Vec::with_capacity(segments.len());
        for (raster_idx, segment) in segments.into_iter().enumerate() {
            let task = MotionPipelineTask::new(PipelineStyle::Cartesian, self.run_simple_planner);
            let producer = Node::task(
                format!("Raster #{}: {}", raster_idx + 1, segment.description),
                task,
            );
            let input = producer.id().key("input");
            let output = producer.id().key("output");
            let producer = producer
                .with_input_keys([input.clone()])
                .with_output_keys([output.clone()]);

            ctx.data().set_data(input.clone(), segment);
            plan.ephemeral.push(input);
            plan.ephemeral.push(output.clone());
            plan.segments.push(output.clone());

            let id = graph.add_node(producer);
            graph.add_edges(start, [Edge::to(id)])?;
            producers.push((id, output));
        }

        for (transition_idx, pair) in producers.windows(2).enumerate() {
            let [(prev_id, prev_out), (next_id, next_out)] = pair else {
                continue;
            };
            let mut transition = entries[2 * transition_idx + 1].clone();
            transition.manipulator = transition.manipulator.combined(&program.manipulator);

            let task = TransitionTask::new(self.cartesian_transition, self.run_simple_planner);
            let join = Node::task(
                format!("Transition #{}: {}", transition_idx + 1, transition.description),
                task,
            );
            let input = join.id().key("input");
            let output = join.id().key("output");
            let join = join
                .with_input_keys([prev_out.clone(), next_out.clone(), input.clone()])
                .with_output_keys([output.clone()]);

            ctx.data().set_data(input.clone(), transition);
            plan.ephemeral.push(input);
            plan.ephemeral.push(output.clone());
            plan.transitions.push(output);

            let id = graph.add_node(join);
            graph.add_edges(*prev_id, [Edge::to(id)])?;
            graph.add_edges(*next_id, [Edge::to(id)])?;
        }

        debug!(
            task = node.name(),
            segments = plan.segments.len(),
            transitions = plan.transitions.len(),
            "raster subgraph built"
        );
        Ok((graph, plan))
    }
}

/// Data keys owned by one subgraph run
#[derive(Debug, Default)]
struct RasterPlan {
    segments: Vec<String>,
    transitions: Vec<String>,
    ephemeral: Vec<String>,
}

impl RasterPlan {
    /// Interleave planned segments and transitions into a copy of `program`
    fn splice(
        &self,
        ctx: &RunContext,
        program: &CompositeInstruction,
    ) -> Result<CompositeInstruction, TaskError> {
        let mut result = program.clone();
        result.clear();

        for (i, segment_key) in self.segments.iter().enumerate() {
            result.push(ctx.data().get_data::<CompositeInstruction>(segment_key)?);
            if let Some(transition_key) = self.transitions.get(i) {
                result.push(ctx.data().get_data::<CompositeInstruction>(transition_key)?);
            }
        }

        Ok(result)
    }

    fn cleanup(&self, ctx: &RunContext) {
        for key in &self.ephemeral {
            ctx.data().remove_data(key);
        }
    }
}

impl Clone for RasterMotionTask {
    /// Configuration only; the copy has not run yet
    fn clone(&self) -> Self {
        Self::new(self.cartesian_transition, self.run_simple_planner)
    }
}

#[async_trait]
impl Task for RasterMotionTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    async fn run(
        &self,
        node: &Node,
        ctx: &RunContext,
        executor: Option<&Executor>,
    ) -> Result<TaskStatus, TaskError> {
        let program = self.check_input(node, ctx)?;
        let output_key = node.output_key(0)?;
        let executor = executor.ok_or_else(|| TaskError::MissingExecutor {
            task: node.name().to_string(),
        })?;

        let (graph, plan) = self.build_subgraph(node, ctx, &program)?;
        let graph = Arc::new(graph);
        *self.last_graph() = Some(Arc::clone(&graph));

        let mut future = match executor.run(graph, ctx.clone()) {
            Ok(future) => future,
            Err(e) => {
                plan.cleanup(ctx);
                return Err(e.into());
            }
        };
        future.wait().await;

        if ctx.is_aborted() {
            plan.cleanup(ctx);
            let e = TaskError::execution(node.name(), anyhow::anyhow!("raster subgraph failed"));
            error!("{e}");
            return Err(e);
        }

        let result = plan.splice(ctx, &program);
        plan.cleanup(ctx);
        ctx.data().set_data(output_key, result?);
        Ok(TaskStatus::Success)
    }

    fn spawns_subgraph(&self) -> bool {
        true
    }

    fn last_subgraph(&self) -> Option<Arc<Graph>> {
        self.last_graph().clone()
    }
}
