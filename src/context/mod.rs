// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Per-run state
//!
//! A [`RunContext`] bundles everything that lives exactly as long as one run:
//! the keyed data storage, the abort flag and the diagnostics list, plus
//! read-only references to external configuration. Nested subgraph runs
//! share the same context.

mod info;
mod profiles;
mod storage;

pub use info::{NodeInfo, NodeStatus, TaskInfos};
pub use profiles::ProfileDictionary;
pub use storage::{DataStorage, DataValue};

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::planning::PlannerRegistry;

/// Shared state for one run.
///
/// Cloning yields another handle to the same run.
#[derive(Clone)]
pub struct RunContext {
    data: DataStorage,
    aborted: Arc<AtomicBool>,
    infos: TaskInfos,
    profiles: Arc<ProfileDictionary>,
    planners: Arc<PlannerRegistry>,
    environment: Option<Arc<dyn Any + Send + Sync>>,
}

impl RunContext {
    /// Create a context with empty storage and no external references
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a context
    pub fn builder() -> RunContextBuilder {
        RunContextBuilder::default()
    }

    /// Shared data storage
    pub fn data(&self) -> &DataStorage {
        &self.data
    }

    /// Diagnostics list
    pub fn infos(&self) -> &TaskInfos {
        &self.infos
    }

    /// Append a node record
    pub fn add_info(&self, info: NodeInfo) {
        self.infos.push(info);
    }

    /// Profiles supplied by the caller
    pub fn profiles(&self) -> &ProfileDictionary {
        &self.profiles
    }

    /// Planners supplied by the caller
    pub fn planners(&self) -> &PlannerRegistry {
        &self.planners
    }

    /// Opaque environment supplied by the caller, if it has type `T`
    pub fn environment<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.environment
            .as_ref()
            .and_then(|env| Arc::clone(env).downcast::<T>().ok())
    }

    /// Whether the run has been aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Abort the run. Not-yet-started nodes will never start.
    ///
    /// The flag is never cleared for the lifetime of the context.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            warn!("run aborted");
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("data", &self.data)
            .field("aborted", &self.is_aborted())
            .field("infos", &self.infos.len())
            .field("profiles", &self.profiles)
            .field("planners", &self.planners)
            .finish()
    }
}

/// Builder for [`RunContext`]
#[derive(Default)]
pub struct RunContextBuilder {
    data: DataStorage,
    profiles: ProfileDictionary,
    planners: PlannerRegistry,
    environment: Option<Arc<dyn Any + Send + Sync>>,
}

impl RunContextBuilder {
    /// Seed an initial data entry
    pub fn data<T: Any + Send + Sync>(self, key: impl Into<String>, value: T) -> Self {
        self.data.set_data(key, value);
        self
    }

    /// Use an existing storage
    pub fn storage(mut self, data: DataStorage) -> Self {
        self.data = data;
        self
    }

    /// Set the profile dictionary
    pub fn profiles(mut self, profiles: ProfileDictionary) -> Self {
        self.profiles = profiles;
        self
    }

    /// Set the planner registry
    pub fn planners(mut self, planners: PlannerRegistry) -> Self {
        self.planners = planners;
        self
    }

    /// Attach an opaque environment
    pub fn environment<T: Any + Send + Sync>(mut self, environment: T) -> Self {
        self.environment = Some(Arc::new(environment));
        self
    }

    /// Build the context
    pub fn build(self) -> RunContext {
        RunContext {
            data: self.data,
            aborted: Arc::new(AtomicBool::new(false)),
            infos: TaskInfos::new(),
            profiles: Arc::new(self.profiles),
            planners: Arc::new(self.planners),
            environment: self.environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Scene {
        links: usize,
    }

    #[test]
    fn test_builder_seeds_data() {
        let ctx = RunContext::builder()
            .data("input_program", 7u32)
            .environment(Scene { links: 6 })
            .build();

        assert_eq!(ctx.data().get_data::<u32>("input_program").unwrap(), 7);
        assert_eq!(ctx.environment::<Scene>().unwrap().links, 6);
        assert!(ctx.environment::<String>().is_none());
        assert!(!ctx.is_aborted());
        assert!(ctx.infos().is_empty());
    }

    #[test]
    fn test_abort_is_shared_and_sticky() {
        let ctx = RunContext::new();
        let nested = ctx.clone();

        nested.abort();
        nested.abort();

        assert!(ctx.is_aborted());
        assert!(nested.is_aborted());
    }

    #[test]
    fn test_fresh_contexts_do_not_share_state() {
        let first = RunContext::new();
        first.data().set_data("k", 1u8);
        first.abort();

        let second = RunContext::new();
        assert!(!second.data().has_key("k"));
        assert!(!second.is_aborted());
    }
}
