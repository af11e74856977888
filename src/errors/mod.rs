// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Error types
//!
//! Two layers of errors exist in planflow:
//!
//! - [`PlanflowError`] covers everything that can go wrong while *building*
//!   a pipeline (structural problems, persistence, configuration) and while
//!   accessing the shared data storage.
//! - [`TaskError`] is the task-boundary taxonomy. A task body returns it, the
//!   node wrapper turns it into a failure record and a `0` status. It never
//!   reaches the executor.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for planflow operations
pub type PlanflowResult<T> = Result<T, PlanflowError>;

/// Main error type for planflow
#[derive(Error, Debug, Diagnostic)]
pub enum PlanflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Structural Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Node '{node}' is not part of graph '{graph}'")]
    #[diagnostic(
        code(planflow::unknown_node),
        help("Add the node with Graph::add_node before wiring edges to it")
    )]
    UnknownNode { graph: String, node: String },

    #[error("Edge {from} -> {to} would create a cycle in graph '{graph}'")]
    #[diagnostic(
        code(planflow::cycle_detected),
        help("Task graphs must stay acyclic; review the edge direction")
    )]
    CycleDetected {
        graph: String,
        from: String,
        to: String,
    },

    #[error("Node '{node}' is not conditional but an edge from it carries a branch")]
    #[diagnostic(
        code(planflow::invalid_branch),
        help("Mark the node conditional or drop the branch from the edge")
    )]
    InvalidBranch { node: String },

    #[error("Graph '{graph}' is invalid: {}", errors.join("; "))]
    #[diagnostic(code(planflow::invalid_graph))]
    InvalidGraph { graph: String, errors: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // Data Storage Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Data key '{key}' not found")]
    #[diagnostic(code(planflow::data_key_not_found))]
    DataKeyNotFound { key: String },

    #[error("Data key '{key}' does not hold a value of type {expected}")]
    #[diagnostic(
        code(planflow::data_type_mismatch),
        help("The storage has no schema; check which task wrote '{key}'")
    )]
    DataTypeMismatch { key: String, expected: &'static str },

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Unknown task type '{type_name}'")]
    #[diagnostic(
        code(planflow::unknown_task_type),
        help("Register a constructor for '{type_name}' in the TaskRegistry")
    )]
    UnknownTaskType { type_name: String },

    #[error("Invalid node definition '{node}': {reason}")]
    #[diagnostic(code(planflow::invalid_definition))]
    InvalidDefinition { node: String, reason: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(planflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(planflow::json_error))]
    Json { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / Runtime Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid executor configuration: {reason}")]
    #[diagnostic(code(planflow::invalid_config))]
    InvalidConfig { reason: String },

    #[error("No tokio runtime available to execute graph '{graph}'")]
    #[diagnostic(
        code(planflow::runtime_unavailable),
        help("Call Executor::run from within a tokio runtime")
    )]
    RuntimeUnavailable { graph: String },
}

impl From<serde_yaml::Error> for PlanflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PlanflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl PlanflowError {
    /// Create an invalid definition error
    pub fn invalid_definition(node: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            node: node.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised while building graph structure
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownNode { .. }
                | Self::CycleDetected { .. }
                | Self::InvalidBranch { .. }
                | Self::InvalidGraph { .. }
        )
    }
}

/// Errors raised inside a task body
#[derive(Error, Debug, Diagnostic)]
pub enum TaskError {
    /// Malformed input shape, detected before any work is scheduled
    #[error("{task}: {reason}")]
    #[diagnostic(code(planflow::task_validation))]
    Validation { task: String, reason: String },

    /// Failure inside the algorithmic body of a task
    #[error("{task} failed: {source}")]
    #[diagnostic(code(planflow::task_execution))]
    Execution {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// A composite task was run without an executor to drive its subgraph
    #[error("{task} requires an executor to run its subgraph")]
    #[diagnostic(code(planflow::missing_executor))]
    MissingExecutor { task: String },

    /// Data storage access failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Data(#[from] PlanflowError),
}

impl TaskError {
    /// Create a validation error
    pub fn validation(task: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            task: task.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an execution error from any error source
    pub fn execution(task: &str, source: impl Into<anyhow::Error>) -> Self {
        Self::Execution {
            task: task.to_string(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        let err = PlanflowError::CycleDetected {
            graph: "g".into(),
            from: "a".into(),
            to: "b".into(),
        };
        assert!(err.is_structural());

        let err = PlanflowError::DataKeyNotFound { key: "k".into() };
        assert!(!err.is_structural());
    }

    #[test]
    fn test_task_error_messages() {
        let err =
            TaskError::validation("RasterMotionTask", "input should have a start instruction");
        assert_eq!(
            err.to_string(),
            "RasterMotionTask: input should have a start instruction"
        );

        let err = TaskError::execution("MotionPipelineTask", anyhow::anyhow!("no solution"));
        assert!(err.to_string().contains("no solution"));

        let err: TaskError = PlanflowError::DataKeyNotFound { key: "program".into() }.into();
        assert_eq!(err.to_string(), "Data key 'program' not found");
    }

    #[test]
    fn test_invalid_graph_lists_errors() {
        let err = PlanflowError::InvalidGraph {
            graph: "raster".into(),
            errors: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "Graph 'raster' is invalid: first; second");
    }
}
