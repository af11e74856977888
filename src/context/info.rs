// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Per-node execution records

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::NodeId;

/// Terminal (or pending) state of a node within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Not decided yet
    Pending,
    /// run() returned 1
    Success,
    /// run() returned 0
    Failure,
    /// Never started because the run was aborted
    Aborted,
    /// Never started because its gating branch was not taken
    Skipped,
}

impl NodeStatus {
    /// Whether the node actually executed
    pub fn was_executed(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Aborted => write!(f, "aborted"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Immutable execution record for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node that produced this record
    pub node_id: NodeId,
    /// Node name at the time of the run
    pub name: String,
    /// Task type, or "graph" for composite nodes
    pub type_name: String,
    /// Final status
    pub status: NodeStatus,
    /// Wall time spent in run()
    pub elapsed: Duration,
    /// Failure message, empty on success
    pub message: String,
}

impl NodeInfo {
    /// Create a record with no elapsed time and no message
    pub fn new(
        node_id: NodeId,
        name: impl Into<String>,
        type_name: impl Into<String>,
        status: NodeStatus,
    ) -> Self {
        Self {
            node_id,
            name: name.into(),
            type_name: type_name.into(),
            status,
            elapsed: Duration::ZERO,
            message: String::new(),
        }
    }

    /// Set elapsed time
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Set message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Append-only, ordered list of node records.
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct TaskInfos {
    infos: Arc<Mutex<Vec<NodeInfo>>>,
}

impl TaskInfos {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NodeInfo>> {
        // A poisoned lock only means another appender panicked; the list
        // itself is still consistent.
        self.infos.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record
    pub fn push(&self, info: NodeInfo) {
        self.lock().push(info);
    }

    /// Copy of all records in append order
    pub fn snapshot(&self) -> Vec<NodeInfo> {
        self.lock().clone()
    }

    /// Record for a node, if one was written
    pub fn get(&self, node_id: NodeId) -> Option<NodeInfo> {
        self.lock().iter().find(|i| i.node_id == node_id).cloned()
    }

    /// Status for a node, `Pending` if nothing was recorded
    pub fn status(&self, node_id: NodeId) -> NodeStatus {
        self.get(node_id)
            .map(|i| i.status)
            .unwrap_or(NodeStatus::Pending)
    }

    /// All records with a given status
    pub fn with_status(&self, status: NodeStatus) -> Vec<NodeInfo> {
        self.lock()
            .iter()
            .filter(|i| i.status == status)
            .cloned()
            .collect()
    }

    /// Records whose node name matches
    pub fn named(&self, name: &str) -> Vec<NodeInfo> {
        self.lock()
            .iter()
            .filter(|i| i.name == name)
            .cloned()
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no records have been written
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
