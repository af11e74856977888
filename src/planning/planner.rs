// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Planner contract
//!
//! planflow carries no planning numerics. A planning algorithm joins a graph
//! by implementing [`MotionPlanner`] and being registered for a
//! [`PipelineStyle`] in the [`PlannerRegistry`] handed to the run context.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ProfileDictionary;
use crate::planning::CompositeInstruction;

/// Which kind of motion pipeline a task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStyle {
    /// Whole-program global planner
    Global,
    /// Constrained straight-line segments
    Cartesian,
    /// Unconstrained moves between segments
    Freespace,
}

impl std::fmt::Display for PipelineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Cartesian => write!(f, "cartesian"),
            Self::Freespace => write!(f, "freespace"),
        }
    }
}

/// Everything a planner gets to see
#[derive(Debug, Clone, Copy)]
pub struct PlannerRequest<'a> {
    /// Program to solve, with its start instruction set
    pub program: &'a CompositeInstruction,
    /// Caller-supplied profiles
    pub profiles: &'a ProfileDictionary,
    /// Seed the solve with a simple interpolation first
    pub seed_with_simple_planner: bool,
}

/// A planning algorithm
pub trait MotionPlanner: Send + Sync {
    /// Planner name, used in logs and error messages
    fn name(&self) -> &str;

    /// Solve a program, returning the planned program
    fn solve(&self, request: &PlannerRequest<'_>) -> anyhow::Result<CompositeInstruction>;
}

/// Adapter turning a closure into a [`MotionPlanner`]
pub struct FnPlanner<F> {
    name: String,
    solve: F,
}

impl<F> FnPlanner<F>
where
    F: Fn(&PlannerRequest<'_>) -> anyhow::Result<CompositeInstruction> + Send + Sync,
{
    pub fn new(name: impl Into<String>, solve: F) -> Self {
        Self {
            name: name.into(),
            solve,
        }
    }
}

impl<F> MotionPlanner for FnPlanner<F>
where
    F: Fn(&PlannerRequest<'_>) -> anyhow::Result<CompositeInstruction> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn solve(&self, request: &PlannerRequest<'_>) -> anyhow::Result<CompositeInstruction> {
        (self.solve)(request)
    }
}

/// Planners keyed by pipeline style
#[derive(Clone, Default)]
pub struct PlannerRegistry {
    planners: HashMap<PipelineStyle, Arc<dyn MotionPlanner>>,
}

impl PlannerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a planner, replacing any previous one for the style
    pub fn register(&mut self, style: PipelineStyle, planner: impl MotionPlanner + 'static) {
        self.planners.insert(style, Arc::new(planner));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_planner(
        mut self,
        style: PipelineStyle,
        planner: impl MotionPlanner + 'static,
    ) -> Self {
        self.register(style, planner);
        self
    }

    /// Planner for a style
    pub fn get(&self, style: PipelineStyle) -> Option<Arc<dyn MotionPlanner>> {
        self.planners.get(&style).cloned()
    }

    pub fn contains(&self, style: PipelineStyle) -> bool {
        self.planners.contains_key(&style)
    }

    pub fn is_empty(&self) -> bool {
        self.planners.is_empty()
    }
}

impl std::fmt::Debug for PlannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<(String, &str)> = self
            .planners
            .iter()
            .map(|(style, planner)| (style.to_string(), planner.name()))
            .collect();
        entries.sort();
        f.debug_map().entries(entries).finish()
    }
}
