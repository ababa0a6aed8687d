//! Generation capability: the external `complete(prompt) → text` service.
//!
//! [`HttpGenerator`] calls an OpenAI-compatible chat-completions endpoint
//! under the same bounded retry/backoff/timeout discipline as the
//! embedding adapter. Failures propagate as
//! [`Error::GenerationService`]; they are never retried unboundedly and
//! never masked as success.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

/// The external text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
}

/// Generation provider backed by an OpenAI-compatible
/// `/v1/chat/completions` endpoint. Requires `OPENAI_API_KEY` in the
/// environment.
pub struct HttpGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
    api_key: String,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::GenerationService(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0.1,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::GenerationService(format!("invalid response body: {}", e))
                        })?;
                        return parse_completion_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("completions API {}: {}", status, body_text));
                        continue;
                    }

                    return Err(Error::GenerationService(format!(
                        "completions API {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(Error::GenerationService(
            last_err.unwrap_or_else(|| "generation failed after retries".to_string()),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::GenerationService("response missing message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "The entry point is main()." } }
            ]
        });
        assert_eq!(
            parse_completion_response(&json).unwrap(),
            "The entry point is main()."
        );
    }

    #[test]
    fn test_parse_completion_missing_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion_response(&json).is_err());
    }
}
