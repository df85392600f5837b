//! Structural contract of the standard pipeline graph.

use tuneline_core::pipeline::{
    ArtifactKind, CompiledPipeline, PipelineGraph, PipelineSpec, DATA_TRANSFORMATION, EVALUATION,
    FINE_TUNING, INFERENCE,
};

fn ports(names: &[(&str, ArtifactKind)]) -> Vec<(String, ArtifactKind)> {
    names.iter().map(|(n, k)| ((*n).to_string(), *k)).collect()
}

#[test]
fn test_standard_stages_and_ports() {
    use ArtifactKind::{Dataset, Metrics, Model};

    let spec = PipelineSpec::standard();
    let graph = PipelineGraph::build(spec.clone()).unwrap();
    assert_eq!(graph.order(), [DATA_TRANSFORMATION, FINE_TUNING, INFERENCE, EVALUATION]);

    let io = |name: &str| {
        let stage = spec.stage(name).unwrap();
        (
            stage.inputs.iter().map(|p| (p.name.clone(), p.kind)).collect::<Vec<_>>(),
            stage.outputs.iter().map(|p| (p.name.clone(), p.kind)).collect::<Vec<_>>(),
        )
    };

    assert_eq!(
        io(DATA_TRANSFORMATION),
        (vec![], ports(&[("train_dataset", Dataset), ("test_dataset", Dataset)]))
    );
    assert_eq!(
        io(FINE_TUNING),
        (
            ports(&[("train_dataset", Dataset)]),
            ports(&[("fine_tuned_model", Model), ("training_metrics", Metrics)])
        )
    );
    assert_eq!(
        io(INFERENCE),
        (
            ports(&[("fine_tuned_model", Model), ("test_dataset", Dataset)]),
            ports(&[("predictions", Dataset)])
        )
    );
    assert_eq!(
        io(EVALUATION),
        (
            ports(&[("predictions", Dataset)]),
            ports(&[("evaluation_results", Dataset), ("aggregated_metrics", Metrics)])
        )
    );
}

#[test]
fn test_upstream_dependencies() {
    let graph = PipelineGraph::build(PipelineSpec::standard()).unwrap();
    assert!(graph.upstream(DATA_TRANSFORMATION).is_empty());
    assert_eq!(graph.upstream(FINE_TUNING), [DATA_TRANSFORMATION]);
    assert_eq!(graph.upstream(INFERENCE), [DATA_TRANSFORMATION, FINE_TUNING]);
    assert_eq!(graph.upstream(EVALUATION), [INFERENCE]);
}

#[test]
fn test_compiled_document_shape() {
    let graph = PipelineGraph::build(PipelineSpec::standard()).unwrap();
    let compiled = CompiledPipeline::from_graph(&graph);
    let json: serde_json::Value = serde_json::from_str(&compiled.to_json().unwrap()).unwrap();

    assert_eq!(json["name"], "nutrition-assistant-training-pipeline");
    assert_eq!(json["stages"].as_array().unwrap().len(), 4);
    assert_eq!(json["stages"][0]["resources"]["cpu_limit"], "2");
    assert_eq!(json["stages"][0]["resources"]["memory_request"], "2Gi");
    assert!(json["stages"][0]["resources"].get("accelerator").is_none());
    assert_eq!(json["edges"].as_array().unwrap().len(), 4);
    assert_eq!(json["parameters"][2]["name"], "test_size");
}
