// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Single motion-planning stage
//!
//! Reads a program from its first input key, solves it with the planner
//! registered for its style and writes the result to its first output key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RunContext;
use crate::errors::TaskError;
use crate::pipeline::{Executor, Node, Task, TaskStatus};
use crate::planning::{CompositeInstruction, PipelineStyle, PlannerRequest};

/// Motion pipeline task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionPipelineTask {
    pub style: PipelineStyle,
    #[serde(default)]
    pub run_simple_planner: bool,
}

impl MotionPipelineTask {
    pub const TYPE_NAME: &'static str = "motion_pipeline";

    pub fn new(style: PipelineStyle, run_simple_planner: bool) -> Self {
        Self {
            style,
            run_simple_planner,
        }
    }
}

#[async_trait]
impl Task for MotionPipelineTask {
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
        _executor: Option<&Executor>,
    ) -> Result<TaskStatus, TaskError> {
        let input_key = node.input_key(0)?;
        let output_key = node.output_key(0)?;

        let program: CompositeInstruction = ctx.data().get_data(input_key)?;
        let solved = solve(ctx, node.name(), self.style, program, self.run_simple_planner).await?;

        ctx.data().set_data(output_key, solved);
        Ok(TaskStatus::Success)
    }
}

/// Solve `program` with the planner registered for `style`
///
/// Planners are synchronous and may run for a long time, so the solve runs
/// on the blocking pool. The caller keeps its worker permit meanwhile.
pub(crate) async fn solve(
    ctx: &RunContext,
    task: &str,
    style: PipelineStyle,
    program: CompositeInstruction,
    seed_with_simple_planner: bool,
) -> Result<CompositeInstruction, TaskError> {
    let planner = ctx.planners().get(style).ok_or_else(|| {
        TaskError::execution(
            task,
            anyhow::anyhow!("no planner registered for {style} pipelines"),
        )
    })?;

    debug!(task, planner = planner.name(), %style, "solving");
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || {
        planner.solve(&PlannerRequest {
            program: &program,
            profiles: ctx.profiles(),
            seed_with_simple_planner,
        })
    })
    .await
    .map_err(|e| TaskError::execution(task, anyhow::anyhow!("planner task failed: {e}")))?
    .map_err(|e| TaskError::execution(task, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeStatus;
    use crate::planning::PlannerRegistry;
    use crate::tasks::testing::{mv, tagging_planner};

    fn program() -> CompositeInstruction {
        CompositeInstruction::new("DEFAULT")
            .with_description("approach")
            .with_start(mv(0.0).as_start())
            .with_entry(mv(1.0))
    }

    #[tokio::test]
    async fn test_solves_with_registered_planner() {
        let ctx = RunContext::builder()
            .planners(
                PlannerRegistry::new()
                    .with_planner(PipelineStyle::Freespace, tagging_planner("freespace")),
            )
            .data("program", program())
            .build();
        let node = Node::task("plan", MotionPipelineTask::new(PipelineStyle::Freespace, true))
            .with_input_keys(["program"])
            .with_output_keys(["planned"]);

        assert_eq!(node.run(&ctx, None).await, TaskStatus::Success);

        let planned: CompositeInstruction = ctx.data().get_data("planned").unwrap();
        assert_eq!(planned.description, "approach [freespace]");
    }

    #[tokio::test]
    async fn test_missing_planner_is_execution_failure() {
        let ctx = RunContext::builder().data("program", program()).build();
        let node = Node::task("plan", MotionPipelineTask::new(PipelineStyle::Cartesian, false))
            .with_input_keys(["program"])
            .with_output_keys(["planned"]);

        assert_eq!(node.run(&ctx, None).await, TaskStatus::Failure);

        let info = ctx.infos().get(node.id()).unwrap();
        assert_eq!(info.status, NodeStatus::Failure);
        assert!(info.message.contains("no planner registered for cartesian pipelines"));
        assert!(!ctx.data().has_key("planned"));
    }

    #[tokio::test]
    async fn test_wrong_input_type() {
        let ctx = RunContext::builder().data("program", 42u32).build();
        let node = Node::task("plan", MotionPipelineTask::new(PipelineStyle::Global, false))
            .with_input_keys(["program"])
            .with_output_keys(["planned"]);

        assert_eq!(node.run(&ctx, None).await, TaskStatus::Failure);
        assert!(ctx.infos().get(node.id()).unwrap().message.contains("does not hold a value"));
    }
}
