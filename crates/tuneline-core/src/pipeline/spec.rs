//! Declarative stage graph.
//!
//! A [`PipelineSpec`] names each stage, its typed input and output ports, its
//! resource hints and the bindings that feed one stage's outputs into another's
//! inputs. It carries no behavior; [`super::graph::PipelineGraph`] validates it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DATA_TRANSFORMATION: &str = "data-transformation";
pub const FINE_TUNING: &str = "fine-tuning";
pub const INFERENCE: &str = "inference";
pub const EVALUATION: &str = "evaluation";

/// What flows along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Dataset,
    Model,
    Metrics,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dataset => write!(f, "dataset"),
            Self::Model => write!(f, "model"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub kind: ArtifactKind,
}

impl PortSpec {
    #[must_use]
    pub fn new(name: &str, kind: ArtifactKind) -> Self {
        Self { name: name.to_string(), kind }
    }
}

/// Scheduling hints handed to the orchestrator. Quantities use Kubernetes notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResourceHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<String>,
}

impl ResourceHints {
    #[must_use]
    pub fn new(
        cpu_request: &str,
        cpu_limit: &str,
        memory_request: &str,
        memory_limit: &str,
    ) -> Self {
        Self {
            cpu_request: Some(cpu_request.to_string()),
            cpu_limit: Some(cpu_limit.to_string()),
            memory_request: Some(memory_request.to_string()),
            memory_limit: Some(memory_limit.to_string()),
            accelerator: None,
        }
    }

    #[must_use]
    pub fn with_accelerator(mut self, accelerator: &str) -> Self {
        self.accelerator = Some(accelerator.to_string());
        self
    }

    /// Fields set in `other` replace ours.
    pub fn merge(&mut self, other: &Self) {
        let fields = [
            (&mut self.cpu_request, &other.cpu_request),
            (&mut self.cpu_limit, &other.cpu_limit),
            (&mut self.memory_request, &other.memory_request),
            (&mut self.memory_limit, &other.memory_limit),
            (&mut self.accelerator, &other.accelerator),
        ];
        for (ours, theirs) in fields {
            if theirs.is_some() {
                ours.clone_from(theirs);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub display_name: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub resources: ResourceHints,
}

impl StageSpec {
    #[must_use]
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            resources: ResourceHints::default(),
        }
    }

    #[must_use]
    pub fn input(mut self, name: &str, kind: ArtifactKind) -> Self {
        self.inputs.push(PortSpec::new(name, kind));
        self
    }

    #[must_use]
    pub fn output(mut self, name: &str, kind: ArtifactKind) -> Self {
        self.outputs.push(PortSpec::new(name, kind));
        self
    }

    #[must_use]
    pub fn resources(mut self, resources: ResourceHints) -> Self {
        self.resources = resources;
        self
    }

    #[must_use]
    pub fn find_input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn find_output(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// One stage output feeding one stage input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub from_stage: String,
    pub from_output: String,
    pub to_stage: String,
    pub to_input: String,
}

impl Binding {
    #[must_use]
    pub fn new(from: (&str, &str), to: (&str, &str)) -> Self {
        Self {
            from_stage: from.0.to_string(),
            from_output: from.1.to_string(),
            to_stage: to.0.to_string(),
            to_input: to.1.to_string(),
        }
    }
}

/// A typed pipeline parameter exposed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub default: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    pub stages: Vec<StageSpec>,
    pub bindings: Vec<Binding>,
}

impl PipelineSpec {
    /// The four-stage transform → fine-tune → infer → evaluate graph.
    #[must_use]
    pub fn standard() -> Self {
        use ArtifactKind::{Dataset, Metrics, Model};
        let accelerated =
            ResourceHints::new("4", "8", "16Gi", "32Gi").with_accelerator("NVIDIA_L4");

        let stages = vec![
            StageSpec::new(DATA_TRANSFORMATION, "Data Transformation")
                .output("train_dataset", Dataset)
                .output("test_dataset", Dataset)
                .resources(ResourceHints::new("1", "2", "2Gi", "4Gi")),
            StageSpec::new(FINE_TUNING, "Fine-Tuning")
                .input("train_dataset", Dataset)
                .output("fine_tuned_model", Model)
                .output("training_metrics", Metrics)
                .resources(accelerated.clone()),
            StageSpec::new(INFERENCE, "Inference")
                .input("fine_tuned_model", Model)
                .input("test_dataset", Dataset)
                .output("predictions", Dataset)
                .resources(accelerated),
            StageSpec::new(EVALUATION, "Evaluation")
                .input("predictions", Dataset)
                .output("evaluation_results", Dataset)
                .output("aggregated_metrics", Metrics)
                .resources(ResourceHints::new("1", "2", "2Gi", "4Gi")),
        ];

        let bindings = vec![
            Binding::new((DATA_TRANSFORMATION, "train_dataset"), (FINE_TUNING, "train_dataset")),
            Binding::new((FINE_TUNING, "fine_tuned_model"), (INFERENCE, "fine_tuned_model")),
            Binding::new((DATA_TRANSFORMATION, "test_dataset"), (INFERENCE, "test_dataset")),
            Binding::new((INFERENCE, "predictions"), (EVALUATION, "predictions")),
        ];

        let parameters = vec![
            parameter("input_uri", "string", serde_json::json!("")),
            parameter("output_uri", "string", serde_json::json!("")),
            parameter("test_size", "float", serde_json::json!(0.2)),
            parameter("random_state", "integer", serde_json::json!(42)),
            parameter("use_extra_translation", "boolean", serde_json::json!(true)),
            parameter("max_samples", "integer", serde_json::json!(100)),
        ];

        Self {
            name: crate::config::DEFAULT_PIPELINE_NAME.to_string(),
            description: crate::config::DEFAULT_PIPELINE_DESCRIPTION.to_string(),
            parameters,
            stages,
            bindings,
        }
    }

    /// [`Self::standard`] renamed and re-resourced from the `[pipeline]` and
    /// `[resources]` sections of `config`.
    #[must_use]
    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        let mut spec = Self::standard();
        spec.name.clone_from(&config.pipeline.name);
        spec.description.clone_from(&config.pipeline.description);
        spec.apply_resource_overrides(&config.resources);
        spec
    }

    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Apply `[resources.<stage>]` overrides. Unknown stage names are ignored.
    pub fn apply_resource_overrides(&mut self, overrides: &BTreeMap<String, ResourceHints>) {
        for stage in &mut self.stages {
            if let Some(hints) = overrides.get(&stage.name) {
                stage.resources.merge(hints);
            }
        }
    }
}

fn parameter(name: &str, kind: &str, default: serde_json::Value) -> ParameterSpec {
    ParameterSpec { name: name.to_string(), kind: kind.to_string(), default }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_transform_resources() {
        let spec = PipelineSpec::standard();
        let transform = spec.stage(DATA_TRANSFORMATION).unwrap();
        assert_eq!(transform.display_name, "Data Transformation");
        assert_eq!(transform.resources.cpu_request.as_deref(), Some("1"));
        assert_eq!(transform.resources.cpu_limit.as_deref(), Some("2"));
        assert_eq!(transform.resources.memory_request.as_deref(), Some("2Gi"));
        assert_eq!(transform.resources.memory_limit.as_deref(), Some("4Gi"));
        assert!(transform.inputs.is_empty());
    }

    #[test]
    fn test_resource_overrides_merge_fieldwise() {
        let mut spec = PipelineSpec::standard();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            FINE_TUNING.to_string(),
            ResourceHints {
                accelerator: Some("NVIDIA_TESLA_A100".to_string()),
                ..ResourceHints::default()
            },
        );
        overrides.insert("missing".to_string(), ResourceHints::default());
        spec.apply_resource_overrides(&overrides);

        let fine_tuning = spec.stage(FINE_TUNING).unwrap();
        assert_eq!(fine_tuning.resources.accelerator.as_deref(), Some("NVIDIA_TESLA_A100"));
        assert_eq!(fine_tuning.resources.cpu_request.as_deref(), Some("4"));
    }

    #[test]
    fn test_ports_lookup() {
        let spec = PipelineSpec::standard();
        let inference = spec.stage(INFERENCE).unwrap();
        assert_eq!(inference.find_input("fine_tuned_model").unwrap().kind, ArtifactKind::Model);
        assert_eq!(inference.find_output("predictions").unwrap().kind, ArtifactKind::Dataset);
        assert!(inference.find_output("train_dataset").is_none());
    }

    #[test]
    fn test_from_config_renames() {
        let mut config = crate::config::PipelineConfig::default();
        config.pipeline.name = "yoda-translator".to_string();
        config.resources.insert(EVALUATION.to_string(), ResourceHints::new("2", "4", "4Gi", "8Gi"));

        let spec = PipelineSpec::from_config(&config);
        assert_eq!(spec.name, "yoda-translator");
        assert_eq!(spec.stage(EVALUATION).unwrap().resources.memory_limit.as_deref(), Some("8Gi"));
        assert_eq!(spec.stages.len(), 4);
    }
}
