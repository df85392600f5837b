use crate::job::FineTuneJobId;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { job_id: FineTuneJobId },
    Message { job_id: FineTuneJobId, message: String },
    Step { job_id: FineTuneJobId, step: u64, total: Option<u64>, loss: f64, learning_rate: f64 },
    Evaluation { job_id: FineTuneJobId, step: u64, eval_loss: f64 },
    Finished { job_id: FineTuneJobId },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { job_id } => println!("[train:{job_id}] started"),
            ProgressEvent::Message { job_id, message } => println!("[train:{job_id}] {message}"),
            ProgressEvent::Step { job_id, step, total, loss, learning_rate } => {
                let position = total.map_or_else(|| step.to_string(), |t| format!("{step}/{t}"));
                println!("[train:{job_id}] step {position} loss={loss:.4} lr={learning_rate:.2e}");
            }
            ProgressEvent::Evaluation { job_id, step, eval_loss } => {
                println!("[train:{job_id}] eval @ step {step}: eval_loss={eval_loss:.4}");
            }
            ProgressEvent::Finished { job_id } => println!("[train:{job_id}] finished"),
        }
    }
}

/// Forwards progress to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { job_id } => info!(%job_id, "fine-tuning started"),
            ProgressEvent::Message { job_id, message } => info!(%job_id, "{message}"),
            ProgressEvent::Step { job_id, step, total, loss, learning_rate } => {
                info!(%job_id, step, total, loss, learning_rate, "training step");
            }
            ProgressEvent::Evaluation { job_id, step, eval_loss } => {
                info!(%job_id, step, eval_loss, "evaluation");
            }
            ProgressEvent::Finished { job_id } => info!(%job_id, "fine-tuning finished"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ProgressEvent, ProgressSink};
    use std::sync::Mutex;

    /// Records every event for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: ProgressEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }
}
