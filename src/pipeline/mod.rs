// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Task graphs and their execution
//!
//! This module defines the node and graph model, graph validation,
//! structural persistence and the executor that runs graphs.

mod dag;
mod definition;
mod executor;
mod node;
mod validation;

pub use dag::{Branch, Edge, EdgeView, Graph};
pub use definition::{
    EdgeDefinition, GraphDefinition, NodeDefinition, TaskConstructor, TaskRegistry,
};
pub use executor::{Executor, ExecutorConfig, TaskFuture};
pub use node::{Node, NodeId, NodeKind, Task, TaskStatus, GRAPH_TYPE_NAME};
pub use validation::{GraphValidator, ValidationResult};
