//! Stage graph validation and ordering.
//!
//! Builds a directed graph from a [`PipelineSpec`]'s bindings and checks the
//! structural contract before anything runs: names are unique, every binding
//! points at declared ports of matching kind, every input is fed exactly once,
//! and there are no cycles.

use super::spec::{Binding, PipelineSpec, StageSpec};
use crate::error::{PipelineError, PipelineResult};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// Validated stage graph.
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    spec: PipelineSpec,
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    order: Vec<String>,
}

impl PipelineGraph {
    /// Validate `spec` and compute a topological order.
    ///
    /// # Errors
    /// Returns `PipelineError::Graph` if:
    /// - two stages share a name
    /// - a binding names an unknown stage or port, or connects ports of different kinds
    /// - an input is bound zero times or more than once
    /// - the bindings form a cycle
    pub fn build(spec: PipelineSpec) -> PipelineResult<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for stage in &spec.stages {
            if node_map.contains_key(&stage.name) {
                return Err(PipelineError::Graph(format!("duplicate stage name: {}", stage.name)));
            }
            let node = graph.add_node(stage.name.clone());
            node_map.insert(stage.name.clone(), node);
        }

        let stages: HashMap<&str, &StageSpec> =
            spec.stages.iter().map(|s| (s.name.as_str(), s)).collect();
        let mut bound: HashMap<(String, String), usize> = HashMap::new();
        let mut edges = HashSet::new();

        for binding in &spec.bindings {
            Self::check_binding(&stages, binding)?;
            *bound.entry((binding.to_stage.clone(), binding.to_input.clone())).or_default() += 1;

            let from = node_map[&binding.from_stage];
            let to = node_map[&binding.to_stage];
            // Several bindings between the same two stages are one dependency edge.
            if edges.insert((from, to)) {
                graph.add_edge(from, to, ());
            }
        }

        for stage in &spec.stages {
            for input in &stage.inputs {
                match bound.get(&(stage.name.clone(), input.name.clone())).copied().unwrap_or(0) {
                    1 => {}
                    0 => {
                        return Err(PipelineError::Graph(format!(
                            "input {}.{} is not bound",
                            stage.name, input.name
                        )));
                    }
                    n => {
                        return Err(PipelineError::Graph(format!(
                            "input {}.{} is bound {n} times",
                            stage.name, input.name
                        )));
                    }
                }
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(PipelineError::Graph(format!(
                "cycle detected: {}",
                Self::find_cycle_path(&graph)
            )));
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| {
                PipelineError::Graph(format!("cycle detected at stage {}", graph[cycle.node_id()]))
            })?
            .into_iter()
            .map(|idx| graph[idx].clone())
            .collect();

        Ok(Self { spec, graph, node_map, order })
    }

    fn check_binding(stages: &HashMap<&str, &StageSpec>, binding: &Binding) -> PipelineResult<()> {
        let from_stage = stages.get(binding.from_stage.as_str()).ok_or_else(|| {
            PipelineError::Graph(format!(
                "binding references unknown stage: {}",
                binding.from_stage
            ))
        })?;
        let to_stage = stages.get(binding.to_stage.as_str()).ok_or_else(|| {
            PipelineError::Graph(format!("binding references unknown stage: {}", binding.to_stage))
        })?;
        let output = from_stage.find_output(&binding.from_output).ok_or_else(|| {
            PipelineError::Graph(format!(
                "stage {} has no output named {}",
                binding.from_stage, binding.from_output
            ))
        })?;
        let input = to_stage.find_input(&binding.to_input).ok_or_else(|| {
            PipelineError::Graph(format!(
                "stage {} has no input named {}",
                binding.to_stage, binding.to_input
            ))
        })?;
        if output.kind != input.kind {
            return Err(PipelineError::Graph(format!(
                "kind mismatch: {}.{} is {} but {}.{} expects {}",
                binding.from_stage,
                binding.from_output,
                output.kind,
                binding.to_stage,
                binding.to_input,
                input.kind
            )));
        }
        Ok(())
    }

    /// One cycle as `a -> b -> a`, for error reporting.
    fn find_cycle_path(graph: &DiGraph<String, ()>) -> String {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for node in graph.node_indices() {
            if !visited.contains(&node)
                && Self::dfs_cycle(graph, node, &mut visited, &mut on_stack, &mut path)
            {
                return path.iter().map(|idx| graph[*idx].as_str()).collect::<Vec<_>>().join(" -> ");
            }
        }
        "unknown cycle".to_string()
    }

    fn dfs_cycle(
        graph: &DiGraph<String, ()>,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> bool {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if on_stack.contains(&next) {
                let start = path.iter().position(|n| *n == next).unwrap_or(0);
                path.drain(..start);
                path.push(next);
                return true;
            }
            if !visited.contains(&next) && Self::dfs_cycle(graph, next, visited, on_stack, path) {
                return true;
            }
        }

        on_stack.remove(&node);
        path.pop();
        false
    }

    #[must_use]
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Stages that must finish before `stage` starts.
    #[must_use]
    pub fn upstream(&self, stage: &str) -> Vec<String> {
        let Some(&node) = self.node_map.get(stage) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|idx| self.graph[idx].clone())
            .collect();
        names.sort();
        names
    }

    /// Text rendering: one line per stage in order, with its inputs and resources.
    #[must_use]
    pub fn render_ascii(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.spec.name);
        for (i, name) in self.order.iter().enumerate() {
            let Some(stage) = self.spec.stage(name) else { continue };
            let connector = if i + 1 == self.order.len() { "└─" } else { "├─" };
            let _ = write!(out, "{connector} [{}] {}", i + 1, stage.display_name);

            let feeds: Vec<String> = self
                .spec
                .bindings
                .iter()
                .filter(|b| b.to_stage == *name)
                .map(|b| format!("{}.{}", b.from_stage, b.from_output))
                .collect();
            if !feeds.is_empty() {
                let _ = write!(out, " <- {}", feeds.join(", "));
            }

            let r = &stage.resources;
            let mut hints = Vec::new();
            if let Some(cpu) = &r.cpu_limit {
                hints.push(format!("cpu {cpu}"));
            }
            if let Some(mem) = &r.memory_limit {
                hints.push(format!("mem {mem}"));
            }
            if let Some(acc) = &r.accelerator {
                hints.push(acc.clone());
            }
            if !hints.is_empty() {
                let _ = write!(out, " ({})", hints.join(", "));
            }
            out.push('\n');
        }
        out
    }
}
