// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Graph validation
//!
//! Validates graph structure before it is handed to the executor.

use std::collections::HashSet;

use petgraph::algo::is_cyclic_directed;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::errors::PlanflowError;
use crate::pipeline::{Branch, Graph, NodeKind};

/// Graph validator
pub struct GraphValidator;

impl GraphValidator {
    /// Validate a graph
    pub fn validate(graph: &Graph) -> ValidationResult {
        let mut result = ValidationResult::new();

        if graph.is_empty() {
            result.add_error("Graph has no nodes");
            return result;
        }

        let roots = graph.roots();
        if roots.len() != 1 {
            let names: Vec<&str> = roots
                .iter()
                .filter_map(|id| graph.node(*id))
                .map(|n| n.name())
                .collect();
            result.add_error(&format!(
                "Graph must have exactly one start node, found {}: [{}]",
                roots.len(),
                names.join(", ")
            ));
        }

        if is_cyclic_directed(graph.inner()) {
            result.add_error("Graph contains a cycle");
        }

        let mut seen_names = HashSet::new();
        for node in graph.nodes() {
            if !seen_names.insert(node.name()) {
                result.add_warning(&format!("Duplicate node name: '{}'", node.name()));
            }
        }

        Self::validate_branches(graph, &mut result);
        Self::validate_result_keys(graph, &mut result);

        result
    }

    /// Check branch edges against the conditional flag of their source
    fn validate_branches(graph: &Graph, result: &mut ValidationResult) {
        let inner = graph.inner();

        for index in inner.node_indices() {
            let node = &inner[index];
            let branches: Vec<Option<Branch>> = inner
                .edges_directed(index, Direction::Outgoing)
                .map(|e| e.weight().branch)
                .collect();

            if !node.is_conditional() {
                if branches.iter().any(Option::is_some) {
                    result.add_error(&format!(
                        "Node '{}': branch edges leave a node that is not conditional",
                        node.name()
                    ));
                }
                continue;
            }

            for (branch, label) in [(Branch::Success, "success"), (Branch::Failure, "failure")] {
                if !branches.contains(&Some(branch)) {
                    result.add_warning(&format!(
                        "Node '{}': {} branch is not wired and ends the path there",
                        node.name(),
                        label
                    ));
                }
            }
        }
    }

    /// Composite nodes must be able to map every result key to an output key
    fn validate_result_keys(graph: &Graph, result: &mut ValidationResult) {
        for node in graph.nodes() {
            if let NodeKind::Graph(subgraph) = node.kind() {
                let results = subgraph.result_keys().len();
                let outputs = node.output_keys().len();
                if results != outputs {
                    result.add_error(&format!(
                        "Node '{}': {} result key(s) but {} output key(s)",
                        node.name(),
                        results,
                        outputs
                    ));
                }
            }
        }
    }

    /// Validate and turn errors into a [`PlanflowError::InvalidGraph`]
    pub fn check(graph: &Graph) -> Result<ValidationResult, PlanflowError> {
        let result = Self::validate(graph);
        if result.is_valid() {
            Ok(result)
        } else {
            Err(PlanflowError::InvalidGraph {
                graph: graph.name().to_string(),
                errors: result.errors,
            })
        }
    }
}

/// Result of graph validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
