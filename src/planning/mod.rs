// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Planning data and the planner contract

mod planner;
mod program;

pub use planner::{FnPlanner, MotionPlanner, PipelineStyle, PlannerRegistry, PlannerRequest};
pub use program::{
    CompositeInstruction, Instruction, ManipulatorInfo, MoveInstruction, MoveType, Waypoint,
};
