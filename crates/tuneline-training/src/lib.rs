//! Tuneline Training
//!
//! Data preparation and adapter fine-tuning primitives for:
//! - Loading tabular datasets and formatting them as two-turn conversations
//! - Seeded train/test splitting and JSONL serialization
//! - Describing fine-tuning jobs (LoRA, quantization, training arguments)
//! - Driving a `TrainingBackend` through the optimizer schedule
//! - Writing adapter artifacts + manifests and discovering them later

pub mod architecture;
pub mod artifacts;
pub mod builders;
pub mod dataset;
pub mod error;
pub mod finetune;
pub mod formatter;
pub mod job;
pub mod layout;
pub mod loader;
pub mod progress;
pub mod registry;
pub mod splitter;

pub use architecture::{ModelArchitecture, ParameterCounts};
pub use artifacts::{
    AdapterConfig, ArtifactKind, FineTuneMetrics, LogEntry, TrainerState, TrainingArtifact,
    TrainingManifest,
};
pub use builders::{parse_jsonl_dataset, read_jsonl_dataset, to_jsonl_string, write_jsonl_dataset};
pub use dataset::{ConversationExample, Dataset, DatasetId, Message, Role};
pub use error::{TrainingError, TrainingResult};
pub use finetune::{FineTuneOutcome, FineTuner, TrainingBackend};
pub use formatter::{
    format_table, DatasetFormat, FormatReport, FormatterOptions, FormattingDegradation,
};
pub use job::{
    ComputeDtype, FineTuneJobId, FineTuneJobSpec, LoraBias, LoraConfig, ModelSpec, QuantType,
    QuantizationConfig, TaskType, TrainingArguments,
};
pub use layout::{new_run_id, RunLayout};
pub use loader::{load_csv_bytes, load_csv_path, RawRecord, RawTable};
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink, TracingProgressSink};
pub use registry::{
    discover_trained_adapters, resolve_trained_adapter, trained_model_id_for_run,
    TrainedAdapterEntry,
};
pub use splitter::{split_dataset, split_indices, DatasetSplit};
