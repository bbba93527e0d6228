//! Text generation over an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use leadenrich_shared::{GenerationConfig, LeadEnrichError, Result};

/// Characters of an upstream error kept in [`LeadEnrichError::Generation`].
const ERROR_CHARS: usize = 100;

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions client (OpenRouter, OpenAI and compatible servers).
pub struct ChatCompletionsClient {
    config: GenerationConfig,
    client: Client,
}

impl ChatCompletionsClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LeadEnrichError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        debug!(model = %self.config.model, "requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| generation_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(generation_error(format!("HTTP {status}: {text}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| generation_error(format!("malformed response: {e}")))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| generation_error("response has no completion text"))
    }
}

fn generation_error(message: impl AsRef<str>) -> LeadEnrichError {
    LeadEnrichError::Generation(message.as_ref().chars().take(ERROR_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ChatCompletionsClient {
        ChatCompletionsClient::new(GenerationConfig {
            api_key: "sk-test".into(),
            base_url: server.uri(),
            model: "test/model".into(),
            max_tokens: 500,
            temperature: 0.5,
            timeout: Duration::from_secs(5),
            delay: Duration::ZERO,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_prompt_and_returns_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test/model",
                "messages": [{"role": "user", "content": "Write to Alpha Dental"}],
                "max_tokens": 500,
                "temperature": 0.5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  Hi Alpha Dental!\n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server).generate("Write to Alpha Dental").await.unwrap();
        assert_eq!(text, "Hi Alpha Dental!");
    }

    #[tokio::test]
    async fn error_status_is_a_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("x".repeat(300)))
            .mount(&server)
            .await;

        let err = client(&server).generate("hello").await.unwrap_err();
        let LeadEnrichError::Generation(message) = &err else {
            panic!("expected a generation error, got {err:?}");
        };
        assert!(message.starts_with("HTTP 401"), "{message}");
        assert_eq!(message.chars().count(), ERROR_CHARS);
        assert!(err.to_string().starts_with("LLM error: HTTP 401"));
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server).generate("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "LLM error: response has no completion text");
    }
}
