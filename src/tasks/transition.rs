// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Transition join
//!
//! Connects two planned segments. Input keys are, in order: the previous
//! segment's result, the next segment's result and the unplanned
//! transition. The transition starts at the last move of the previous
//! segment and ends at the first move of the next one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::context::RunContext;
use crate::errors::TaskError;
use crate::pipeline::{Executor, Node, Task, TaskStatus};
use crate::planning::{CompositeInstruction, PipelineStyle};
use crate::tasks::motion_pipeline::solve;

/// Transition task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTask {
    /// Plan with the Cartesian pipeline instead of freespace
    #[serde(default)]
    pub cartesian_transition: bool,
    #[serde(default)]
    pub run_simple_planner: bool,
}

impl TransitionTask {
    pub const TYPE_NAME: &'static str = "transition";

    pub fn new(cartesian_transition: bool, run_simple_planner: bool) -> Self {
        Self {
            cartesian_transition,
            run_simple_planner,
        }
    }

    pub fn style(&self) -> PipelineStyle {
        if self.cartesian_transition {
            PipelineStyle::Cartesian
        } else {
            PipelineStyle::Freespace
        }
    }
}

#[async_trait]
impl Task for TransitionTask {
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
        let prev: CompositeInstruction = ctx.data().get_data(node.input_key(0)?)?;
        let next: CompositeInstruction = ctx.data().get_data(node.input_key(1)?)?;
        let mut transition: CompositeInstruction = ctx.data().get_data(node.input_key(2)?)?;
        let output_key = node.output_key(0)?;

        let start = prev.last_move_instruction().ok_or_else(|| {
            let e = TaskError::validation(node.name(), "previous segment has no moves");
            error!("{e}");
            e
        })?;
        let end = next.first_move_instruction().ok_or_else(|| {
            let e = TaskError::validation(node.name(), "next segment has no moves");
            error!("{e}");
            e
        })?;

        transition.set_start_instruction(start.as_start());
        transition.push(end.clone());

        let solved = solve(
            ctx,
            node.name(),
            self.style(),
            transition,
            self.run_simple_planner,
        )
        .await?;
        ctx.data().set_data(output_key, solved);
        Ok(TaskStatus::Success)
    }
}
