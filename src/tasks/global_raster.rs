// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Global planner followed by raster planning

use crate::errors::PlanflowResult;
use crate::pipeline::{Edge, Graph, Node};
use crate::planning::PipelineStyle;
use crate::tasks::{MotionPipelineTask, RasterMotionTask};

/// Name given to the composite node and its graph
pub const RASTER_GLOBAL_PIPELINE: &str = "RasterGlobalPipeline";

/// Build a composite node that solves the whole program with the global
/// planner, then refines it segment by segment with [`RasterMotionTask`].
///
/// Reads `input_key`, writes `output_key`.
pub fn raster_global_pipeline(
    input_key: &str,
    output_key: &str,
    cartesian_transition: bool,
) -> PlanflowResult<Node> {
    let mut graph = Graph::new(RASTER_GLOBAL_PIPELINE).with_result_keys([output_key]);

    let global = graph.add_node(
        Node::task(
            "Global Planner",
            MotionPipelineTask::new(PipelineStyle::Global, false),
        )
        .with_input_keys([input_key])
        .with_output_keys([output_key]),
    );
    let raster = graph.add_node(
        Node::task(
            "Raster Motion",
            RasterMotionTask::new(cartesian_transition, true),
        )
        .with_input_keys([output_key])
        .with_output_keys([output_key]),
    );
    graph.add_edges(global, [Edge::to(raster)])?;

    Ok(Node::graph(RASTER_GLOBAL_PIPELINE, graph)
        .with_input_keys([input_key])
        .with_output_keys([output_key]))
}
