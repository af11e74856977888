// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! No-op root task

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::errors::TaskError;
use crate::pipeline::{Executor, Node, Task, TaskStatus};

/// Does nothing and succeeds. Gives fan-out graphs their single start node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTask;

impl StartTask {
    pub const TYPE_NAME: &'static str = "start";
}

#[async_trait]
impl Task for StartTask {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    async fn run(
        &self,
        _node: &Node,
        _ctx: &RunContext,
        _executor: Option<&Executor>,
    ) -> Result<TaskStatus, TaskError> {
        Ok(TaskStatus::Success)
    }
}
