//! Ollama completion backend (`POST /api/generate`, non-streaming)

use super::Generator;
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::http::ServiceClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaGenerator {
    client: ServiceClient,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = ServiceClient::new(
            &config.url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Requesting completion");

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response: GenerateResponse = self
            .client
            .post_json("api/generate", &request)
            .await
            .map_err(|e| Error::Generation(e.message))?;

        Ok(response.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: String) -> GenerationConfig {
        GenerationConfig {
            url,
            max_retries: 0,
            ..GenerationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_non_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": "llama3.2:1b", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2:1b",
                "response": "Paris.",
                "done": true
            })))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(&config_for(server.uri())).unwrap();
        assert_eq!(generator.generate("Capital of France?").await.unwrap(), "Paris.");
    }

    #[tokio::test]
    async fn test_unknown_model_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model not found"})),
            )
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(&config_for(server.uri())).unwrap();
        let err = generator.generate("hi").await.unwrap_err();
        assert!(matches!(err, Error::Generation(ref m) if m.contains("model not found")));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let generator = OllamaGenerator::new(&config_for("http://127.0.0.1:9".to_string())).unwrap();
        assert!(matches!(
            generator.generate("hi").await,
            Err(Error::Generation(_))
        ));
    }
}
