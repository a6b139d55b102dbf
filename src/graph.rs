//! Graph Parser (C1): validates a [`WorkflowDefinition`] and produces a
//! layered [`ExecutionPlan`].
//!
//! The adjacency/in-degree bookkeeping and node/edge walking style is
//! grounded on `execution/workflow_engine.rs::parse_definition`, but that
//! function stops at building a flat node/edge index — it never layers
//! or validates terminals/reachability/cycles. Those are added here
//! wholesale to cover a single-start, single-end DAG's full validation
//! surface and topological layering.

use crate::error::{OrchestratorError, Result};
use crate::model::{ExecutionPlan, NodeKind, WorkflowDefinition};
use std::collections::{HashMap, HashSet, VecDeque};

/// Parses and validates a workflow definition into an [`ExecutionPlan`].
pub struct GraphParser<'a> {
    definition: &'a WorkflowDefinition,
}

impl<'a> GraphParser<'a> {
    pub fn new(definition: &'a WorkflowDefinition) -> Self {
        Self { definition }
    }

    pub fn parse(&self) -> Result<ExecutionPlan> {
        let node_ids: HashSet<&str> = self.definition.nodes.iter().map(|n| n.id.as_str()).collect();

        // Validate every edge names known nodes.
        for edge in &self.definition.edges {
            if !node_ids.contains(edge.source.as_str()) {
                return Err(OrchestratorError::EdgeRefsUnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: edge.source.clone(),
                });
            }
            if !node_ids.contains(edge.target.as_str()) {
                return Err(OrchestratorError::EdgeRefsUnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: edge.target.clone(),
                });
            }
        }

        self.validate_terminals()?;

        // Adjacency (successors, in order of edge insertion) and in-degree.
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = node_ids.iter().map(|id| (*id, 0usize)).collect();
        for node in &self.definition.nodes {
            adjacency.entry(node.id.as_str()).or_default();
        }
        for edge in &self.definition.edges {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
        }

        let start_id = self.start_node_id()?;
        self.validate_reachability(&adjacency, start_id)?;

        let layers = self.topological_layers(&adjacency, in_degree)?;

        // Only checked once the graph shape itself is known sound, so a
        // malformed-but-also-cyclic (or unreachable) graph is reported for
        // its structural defect rather than its missing field.
        self.validate_required_fields()?;

        let parallel_branches = adjacency
            .iter()
            .filter(|(_, succ)| succ.len() > 1)
            .map(|(id, succ)| {
                (
                    id.to_string(),
                    succ.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();

        let mut convergence_in_degree: HashMap<&str, usize> =
            node_ids.iter().map(|id| (*id, 0usize)).collect();
        for edge in &self.definition.edges {
            *convergence_in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
        }
        let convergence_points = convergence_in_degree
            .into_iter()
            .filter(|(_, deg)| *deg > 1)
            .map(|(id, _)| id.to_string())
            .collect();

        Ok(ExecutionPlan {
            layers,
            parallel_branches,
            convergence_points,
        })
    }

    fn validate_terminals(&self) -> Result<()> {
        let starts: Vec<&str> = self
            .definition
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Start)
            .map(|n| n.id.as_str())
            .collect();
        let ends: Vec<&str> = self
            .definition
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::End)
            .map(|n| n.id.as_str())
            .collect();

        match starts.len() {
            0 => return Err(OrchestratorError::MissingStart),
            1 => {}
            n => return Err(OrchestratorError::DuplicateStart { count: n }),
        }
        match ends.len() {
            0 => return Err(OrchestratorError::MissingEnd),
            1 => {}
            n => return Err(OrchestratorError::DuplicateEnd { count: n }),
        }
        Ok(())
    }

    /// Per §7: a `task` without `taskType`, a `script` without `scriptCode`,
    /// or an `http` node without `httpConfig` is a validation error, not a
    /// runtime one — caught here before any layer is ever dispatched.
    fn validate_required_fields(&self) -> Result<()> {
        for node in &self.definition.nodes {
            let missing = match node.kind {
                NodeKind::Task if node.data.task_type.is_none() => Some("taskType"),
                NodeKind::Script if node.data.script_code.is_none() => Some("scriptCode"),
                NodeKind::Http if node.data.http_config.is_none() => Some("httpConfig"),
                _ => None,
            };
            if let Some(field) = missing {
                return Err(OrchestratorError::MissingRequiredNodeField {
                    node_id: node.id.clone(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    fn start_node_id(&self) -> Result<&str> {
        self.definition
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Start)
            .map(|n| n.id.as_str())
            .ok_or(OrchestratorError::MissingStart)
    }

    fn validate_reachability(&self, adjacency: &HashMap<&str, Vec<&str>>, start: &str) -> Result<()> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);

        while let Some(node) = queue.pop_front() {
            if let Some(successors) = adjacency.get(node) {
                for succ in successors {
                    if visited.insert(succ) {
                        queue.push_back(succ);
                    }
                }
            }
        }

        for node in &self.definition.nodes {
            if !visited.contains(node.id.as_str()) {
                return Err(OrchestratorError::Unreachable(node.id.clone()));
            }
        }
        Ok(())
    }

    /// Kahn's algorithm. Within a layer, nodes are ordered by their
    /// insertion order in `self.definition.nodes` (determinism requirement
    /// of §4.1), not discovery order.
    fn topological_layers(
        &self,
        adjacency: &HashMap<&str, Vec<&str>>,
        mut in_degree: HashMap<&str, usize>,
    ) -> Result<Vec<Vec<String>>> {
        let insertion_order: Vec<&str> = self.definition.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut layers = Vec::new();
        let mut remaining: HashSet<&str> = insertion_order.iter().copied().collect();

        while !remaining.is_empty() {
            let mut layer: Vec<&str> = insertion_order
                .iter()
                .copied()
                .filter(|id| remaining.contains(id) && in_degree.get(id).copied().unwrap_or(0) == 0)
                .collect();

            if layer.is_empty() {
                let cyclic: Vec<String> = remaining.iter().map(|s| s.to_string()).collect();
                return Err(OrchestratorError::Cycle(cyclic));
            }

            for id in &layer {
                remaining.remove(id);
            }
            for id in &mut layer {
                if let Some(successors) = adjacency.get(id) {
                    for succ in successors {
                        if let Some(deg) = in_degree.get_mut(succ) {
                            *deg = deg.saturating_sub(1);
                        }
                    }
                }
            }

            layers.push(layer.into_iter().map(|s| s.to_string()).collect());
        }

        Ok(layers)
    }
}
