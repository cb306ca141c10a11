//! Language model access for answer synthesis

mod ollama;

pub use ollama::*;

use crate::config::GenerationConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A text completion model
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`; the returned text is the model's answer verbatim
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Create the configured generator
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    Ok(Arc::new(OllamaGenerator::new(config)?))
}
