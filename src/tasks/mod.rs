// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Built-in tasks
//!
//! This module provides the tasks planflow ships with and a registry that
//! knows how to rebuild them from persisted definitions.

mod global_raster;
mod motion_pipeline;
mod raster;
mod start;
mod transition;

pub use global_raster::{raster_global_pipeline, RASTER_GLOBAL_PIPELINE};
pub use motion_pipeline::MotionPipelineTask;
pub use raster::RasterMotionTask;
pub use start::StartTask;
pub use transition::TransitionTask;

use crate::pipeline::TaskRegistry;

/// Create a task registry with all built-in tasks
pub fn default_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    registry.register_serde::<StartTask>(StartTask::TYPE_NAME);
    registry.register_serde::<MotionPipelineTask>(MotionPipelineTask::TYPE_NAME);
    registry.register_serde::<TransitionTask>(TransitionTask::TYPE_NAME);
    registry.register_serde::<RasterMotionTask>(RasterMotionTask::TYPE_NAME);

    registry
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_knows_builtins() {
        let registry = default_registry();
        assert_eq!(
            registry.type_names(),
            vec!["motion_pipeline", "raster_motion", "start", "transition"]
        );
    }
}
