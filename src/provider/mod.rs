//! Script generation backends.

pub mod openai;

pub use openai::OpenAiGenerator;

use crate::error::ApiError;
use async_trait::async_trait;
use serde::Deserialize;

/// A generated script with the metadata the registry stores alongside it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedScript {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Turns a natural-language prompt into a script.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedScript, ApiError>;
}
