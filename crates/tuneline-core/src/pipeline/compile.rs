//! Orchestrator-facing pipeline document.

use super::graph::PipelineGraph;
use super::spec::{ParameterSpec, PortSpec, ResourceHints};
use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const COMPILED_SCHEMA_VERSION: &str = "tuneline.pipeline/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStage {
    pub name: String,
    pub display_name: String,
    /// Upstream stage names.
    pub depends_on: Vec<String>,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub resources: ResourceHints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledEdge {
    pub from: String,
    pub to: String,
}

/// JSON document handed to an external orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPipeline {
    pub schema_version: String,
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    /// Stages in execution order.
    pub stages: Vec<CompiledStage>,
    /// `stage.port` to `stage.port`.
    pub edges: Vec<CompiledEdge>,
}

impl CompiledPipeline {
    #[must_use]
    pub fn from_graph(graph: &PipelineGraph) -> Self {
        let spec = graph.spec();
        let stages = graph
            .order()
            .iter()
            .filter_map(|name| spec.stage(name))
            .map(|stage| CompiledStage {
                name: stage.name.clone(),
                display_name: stage.display_name.clone(),
                depends_on: graph.upstream(&stage.name),
                inputs: stage.inputs.clone(),
                outputs: stage.outputs.clone(),
                resources: stage.resources.clone(),
            })
            .collect();

        let edges = spec
            .bindings
            .iter()
            .map(|b| CompiledEdge {
                from: format!("{}.{}", b.from_stage, b.from_output),
                to: format!("{}.{}", b.to_stage, b.to_input),
            })
            .collect();

        Self {
            schema_version: COMPILED_SCHEMA_VERSION.to_string(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
            stages,
            edges,
        }
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
