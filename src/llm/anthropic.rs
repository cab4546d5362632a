//! Native Anthropic Messages API provider.
//!
//! Single-shot requests only: each extraction is one user-role message, and
//! the retry loop lives at the call sites so the extractor can layer its
//! fallback semantics on top of exhausted retries.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::AnthropicConfig;
use crate::error::LlmError;
use crate::llm::Oracle;

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "anthropic";

/// Native Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(config: AnthropicConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: config.api_key,
            model: config.model,
            max_tokens: config.max_tokens,
        }
    }

    async fn send_request(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse, LlmError> {
        let url = format!("{}/v1/messages", API_BASE);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("anthropic-version", API_VERSION)
            .header("x-api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let status_code = status.as_u16();
        let response_text = response.text().await.unwrap_or_default();

        tracing::debug!("Anthropic response status: {}", status);
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!("Anthropic response body: {}", response_text);
        }

        if !status.is_success() {
            if status_code == 401 || status_code == 403 {
                return Err(LlmError::AuthFailed {
                    provider: PROVIDER_NAME.to_string(),
                });
            }
            if status_code == 429 {
                return Err(LlmError::RateLimited {
                    provider: PROVIDER_NAME.to_string(),
                    retry_after: None,
                });
            }
            if status.is_server_error() {
                return Err(LlmError::ServerError {
                    provider: PROVIDER_NAME.to_string(),
                    status: status_code,
                    reason: response_text,
                });
            }
            return Err(LlmError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("HTTP {}: {}", status, response_text),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER_NAME.to_string(),
            reason: format!("JSON parse error: {}. Raw: {}", e, response_text),
        })
    }

    /// Cheap connectivity probe: a one-token request that only checks the
    /// API accepts our credentials.
    pub async fn check_connection(&self) -> Result<(), LlmError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: 16,
            messages: vec![ApiMessage {
                role: "user",
                content: "Hello, please respond with 'Connection successful'".to_string(),
            }],
        };
        self.send_request(&request).await.map(|_| ())
    }
}

#[async_trait]
impl Oracle for AnthropicProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = self.send_request(&request).await?;
        Ok(extract_text(&response.content))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// -- Anthropic Messages API request/response types --

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Concatenate the text blocks of a response, skipping anything else.
fn extract_text(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        if let ContentBlock::Text { text } = block {
            out.push_str(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_request_serialization() {
        let request = MessagesRequest {
            model: "claude-3-7-sonnet-20250219",
            max_tokens: 1000,
            messages: vec![ApiMessage {
                role: "user",
                content: "Hello".to_string(),
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "claude-3-7-sonnet-20250219");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
    }

    #[test]
    fn messages_response_deserialization() {
        let json = serde_json::json!({
            "content": [
                {"type": "text", "text": "{\"workout\": \"5k run\"}"}
            ],
            "stop_reason": "end_turn",
            "usage": {
                "input_tokens": 10,
                "output_tokens": 5
            }
        });

        let resp: MessagesResponse = serde_json::from_value(json).unwrap();
        assert_eq!(extract_text(&resp.content), "{\"workout\": \"5k run\"}");
    }

    #[test]
    fn extract_text_joins_blocks_and_skips_unknown() {
        let json = serde_json::json!({
            "content": [
                {"type": "text", "text": "part one "},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "part two"}
            ]
        });

        let resp: MessagesResponse = serde_json::from_value(json).unwrap();
        assert_eq!(extract_text(&resp.content), "part one part two");
    }
}
