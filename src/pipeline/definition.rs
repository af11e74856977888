// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Structural persistence
//!
//! A [`NodeDefinition`] captures what a node *is*: its name, keys, task type
//! and configuration, and for composite nodes the child definitions and
//! edges by index. Ids and run-time data are never part of a definition.
//! [`TaskRegistry`] turns definitions back into nodes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{PlanflowError, PlanflowResult};
use crate::pipeline::node::GRAPH_TYPE_NAME;
use crate::pipeline::{Branch, Edge, Graph, Node, NodeKind, Task};

/// Serializable description of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Node name
    pub name: String,

    /// Task type name, or "graph"
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub conditional: bool,

    /// Task configuration
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,

    /// Owned graph, for composite nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphDefinition>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Serializable description of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub name: String,

    /// Children in insertion order
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,

    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result_keys: Vec<String>,
}

/// Edge between two children, by index into `nodes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: usize,
    pub to: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub raises_abort: bool,
}

impl NodeDefinition {
    /// Parse a definition from YAML
    pub fn from_yaml(yaml: &str) -> PlanflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> PlanflowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Parse a definition from JSON
    pub fn from_json(json: &str) -> PlanflowResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> PlanflowResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }
}

impl Node {
    /// Capture this node's structure
    pub fn to_definition(&self) -> NodeDefinition {
        let (config, graph) = match self.kind() {
            NodeKind::Task(task) => (task.config(), None),
            NodeKind::Graph(graph) => (serde_json::Value::Null, Some(graph.to_definition())),
        };

        NodeDefinition {
            name: self.name().to_string(),
            type_name: self.type_name().to_string(),
            input_keys: self.input_keys().to_vec(),
            output_keys: self.output_keys().to_vec(),
            conditional: self.is_conditional(),
            config,
            graph,
        }
    }
}

impl Graph {
    /// Capture this graph's structure
    pub fn to_definition(&self) -> GraphDefinition {
        let inner = self.inner();
        let edges = inner
            .raw_edges()
            .iter()
            .map(|e| EdgeDefinition {
                from: e.source().index(),
                to: e.target().index(),
                branch: e.weight.branch,
                raises_abort: e.weight.raises_abort,
            })
            .collect();

        GraphDefinition {
            name: self.name().to_string(),
            nodes: self.nodes().map(|n| n.to_definition()).collect(),
            edges,
            result_keys: self.result_keys().to_vec(),
        }
    }
}

/// Builds a task from its persisted configuration
pub type TaskConstructor =
    Arc<dyn Fn(&serde_json::Value) -> PlanflowResult<Box<dyn Task>> + Send + Sync>;

/// Maps task type names to constructors
#[derive(Clone, Default)]
pub struct TaskRegistry {
    constructors: HashMap<String, TaskConstructor>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a task type
    pub fn register<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn(&serde_json::Value) -> PlanflowResult<Box<dyn Task>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_name.to_string(), Arc::new(constructor));
    }

    /// Register a task whose configuration is its serde representation
    pub fn register_serde<T>(&mut self, type_name: &str)
    where
        T: Task + DeserializeOwned + 'static,
    {
        self.register(type_name, |config| {
            let task: T = serde_json::from_value(config.clone())?;
            Ok(Box::new(task) as Box<dyn Task>)
        });
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a node from its definition
    pub fn build(&self, definition: &NodeDefinition) -> PlanflowResult<Node> {
        let kind = if definition.type_name == GRAPH_TYPE_NAME {
            let graph = definition.graph.as_ref().ok_or_else(|| {
                PlanflowError::invalid_definition(&definition.name, "graph node without a graph")
            })?;
            NodeKind::Graph(Arc::new(self.build_graph(graph)?))
        } else {
            if definition.graph.is_some() {
                return Err(PlanflowError::invalid_definition(
                    &definition.name,
                    format!("task type '{}' cannot own a graph", definition.type_name),
                ));
            }
            let constructor = self.constructors.get(&definition.type_name).ok_or_else(|| {
                PlanflowError::UnknownTaskType {
                    type_name: definition.type_name.clone(),
                }
            })?;
            NodeKind::Task(constructor(&definition.config)?)
        };

        Ok(Node::with_kind(definition.name.clone(), kind)
            .with_input_keys(definition.input_keys.iter().cloned())
            .with_output_keys(definition.output_keys.iter().cloned())
            .conditional(definition.conditional))
    }

    /// Build a graph from its definition
    pub fn build_graph(&self, definition: &GraphDefinition) -> PlanflowResult<Graph> {
        let mut graph = Graph::new(definition.name.clone())
            .with_result_keys(definition.result_keys.iter().cloned());

        let ids = definition
            .nodes
            .iter()
            .map(|node| self.build(node).map(|node| graph.add_node(node)))
            .collect::<PlanflowResult<Vec<_>>>()?;

        for edge in &definition.edges {
            let (Some(&from), Some(&to)) = (ids.get(edge.from), ids.get(edge.to)) else {
                return Err(PlanflowError::invalid_definition(
                    &definition.name,
                    format!(
                        "edge {} -> {} is out of range for {} node(s)",
                        edge.from,
                        edge.to,
                        ids.len()
                    ),
                ));
            };

            let mut wired = Edge::to(to);
            match edge.branch {
                Some(Branch::Success) => wired = wired.on_success(),
                Some(Branch::Failure) => wired = wired.on_failure(),
                None => {}
            }
            if edge.raises_abort {
                wired = wired.raising_abort();
            }
            graph.add_edges(from, [wired])?;
        }

        Ok(graph)
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
