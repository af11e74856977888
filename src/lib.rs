// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! # planflow - Task Composition for Motion Planning
//!
//! `planflow` composes planning stages into directed acyclic graphs and runs
//! them with bounded parallelism, passing intermediate results between
//! nodes through a shared keyed store.
//!
//! ## Features
//!
//! - **Task graphs** - Leaf tasks and nested graphs behind one node type
//! - **Conditional branches** - Route on success or failure of a node
//! - **Dynamic subgraphs** - Tasks that size their own fan-out/fan-in at run time
//! - **Cooperative abort** - A failing node stops everything not yet started
//! - **Structural persistence** - Save and rebuild graphs as YAML or JSON
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use planflow::planning::{CompositeInstruction, PlannerRegistry};
//! use planflow::tasks::raster_global_pipeline;
//! use planflow::{Executor, Graph, RunContext};
//!
//! # async fn example(
//! #     program: CompositeInstruction,
//! #     planners: PlannerRegistry,
//! # ) -> planflow::PlanflowResult<()> {
//! let mut graph = Graph::new("raster");
//! graph.add_node(raster_global_pipeline("program", "planned", false)?);
//!
//! let ctx = RunContext::builder()
//!     .planners(planners)
//!     .data("program", program)
//!     .build();
//!
//! let mut future = Executor::new().run(Arc::new(graph), ctx.clone())?;
//! future.wait().await;
//!
//! if !ctx.is_aborted() {
//!     let planned: CompositeInstruction = ctx.data().get_data("planned")?;
//!     println!("{} entries", planned.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod errors;
pub mod pipeline;
pub mod planning;
pub mod tasks;

// Re-export commonly used types
pub use context::{DataStorage, NodeInfo, NodeStatus, RunContext};
pub use errors::{PlanflowError, PlanflowResult, TaskError};
pub use pipeline::{
    Edge, Executor, ExecutorConfig, Graph, Node, NodeId, Task, TaskFuture, TaskStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
