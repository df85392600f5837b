//! Generator factory for creating generator instances from configuration.

use crate::{BigramModel, EndpointModel, MockGenerator};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use tuneline_abstraction::{ModelError, TextGenerator};

/// Generator backend enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Canned responses for tests.
    Mock,
    /// Bigram adapter trained in-process.
    Local,
    /// Remote prediction endpoint.
    Endpoint,
}

impl FromStr for GeneratorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "local" | "bigram" => Ok(Self::Local),
            "endpoint" | "remote" => Ok(Self::Endpoint),
            _ => Err(()),
        }
    }
}

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    pub model_id: String,
    /// Directory holding a trained adapter (required for `Local`).
    pub adapter_dir: Option<PathBuf>,
    /// Prediction URL (required for `Endpoint`).
    pub endpoint_url: Option<String>,
}

impl GeneratorConfig {
    #[must_use]
    pub fn new(kind: GeneratorKind, model_id: String) -> Self {
        Self { kind, model_id, adapter_dir: None, endpoint_url: None }
    }

    #[must_use]
    pub fn with_adapter_dir(mut self, dir: PathBuf) -> Self {
        self.adapter_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, url: String) -> Self {
        self.endpoint_url = Some(url);
        self
    }
}

/// Factory for creating generator instances.
pub struct GeneratorFactory;

impl GeneratorFactory {
    /// # Errors
    /// Returns a `ModelError` if a required location is missing or the adapter fails to load.
    pub fn create(config: GeneratorConfig) -> Result<Arc<dyn TextGenerator>, ModelError> {
        debug!(kind = ?config.kind, model_id = %config.model_id, "Creating generator instance");

        match config.kind {
            GeneratorKind::Mock => Ok(Arc::new(MockGenerator::new(config.model_id))),
            GeneratorKind::Local => {
                let dir = config.adapter_dir.ok_or_else(|| {
                    ModelError::Other("local generator requires an adapter directory".to_string())
                })?;
                Ok(Arc::new(BigramModel::from_dir(&dir)?))
            }
            GeneratorKind::Endpoint => {
                let url = config.endpoint_url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
                    ModelError::Other("endpoint generator requires an endpoint URL".to_string())
                })?;
                Ok(Arc::new(EndpointModel::new(config.model_id, url)))
            }
        }
    }
}
