//! Pipeline assembly and local execution.
//!
//! - [`spec`]: declarative stages, ports, bindings and resource hints
//! - [`graph`]: validation and topological ordering
//! - [`compile`]: the JSON document handed to an external orchestrator
//! - [`runner`]: sequential in-process execution

pub mod compile;
pub mod graph;
pub mod runner;
pub mod spec;

pub use compile::{CompiledEdge, CompiledPipeline, CompiledStage, COMPILED_SCHEMA_VERSION};
pub use graph::PipelineGraph;
pub use runner::{PipelineRunner, RunStatus, RunSummary, StageRecord, StageStatus};
pub use spec::{
    ArtifactKind, Binding, ParameterSpec, PipelineSpec, PortSpec, ResourceHints, StageSpec,
    DATA_TRANSFORMATION, EVALUATION, FINE_TUNING, INFERENCE,
};
