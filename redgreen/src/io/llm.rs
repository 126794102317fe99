//! Language model backends.
//!
//! The [`Llm`] trait decouples the pipeline from the HTTP backend. Tests use
//! scripted models that return predetermined completions without touching
//! the network. Calls are blocking; the pipeline has no async runtime.

use serde_json::Value;
use tracing::debug;

use crate::io::config::LlmConfig;

/// Errors from model backend calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("empty response from model")]
    EmptyResponse,
}

/// A completed model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Prompt tokens, when the backend reports them.
    pub input_tokens: Option<u64>,
    /// Completion tokens, when the backend reports them.
    pub output_tokens: Option<u64>,
}

/// Abstraction over model backends.
pub trait Llm {
    /// Send a single-turn prompt and wait for the completion.
    fn complete(&self, prompt: &str) -> Result<Completion, LlmError>;

    /// The model name, for logs and usage accounting.
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiLlm {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
    agent: ureq::Agent,
}

impl OpenAiLlm {
    pub fn new(settings: &LlmConfig, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: settings.base_url.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            agent: ureq::Agent::new_with_config(
                ureq::config::Config::builder()
                    .timeout_global(Some(settings.request_timeout()))
                    .http_status_as_error(false)
                    .build(),
            ),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl Llm for OpenAiLlm {
    fn complete(&self, prompt: &str) -> Result<Completion, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        debug!(model = %self.model, prompt_bytes = prompt.len(), "sending completion request");
        let mut response = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let raw = response.body_mut().read_to_string().unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: api_error_message(&raw),
            });
        }

        let json: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        parse_completion(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract text and token usage from a chat completions response body.
pub fn parse_completion(json: &Value) -> Result<Completion, LlmError> {
    if let Some(err) = json.get("error") {
        return Err(LlmError::Api {
            status: 400,
            message: err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let text = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)?
        .to_string();

    let usage = json.get("usage");
    let input_tokens = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(|t| t.as_u64());
    let output_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(|t| t.as_u64());

    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
    })
}

fn api_error_message(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_and_usage() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "def f():\n    pass"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8}
        });
        let completion = parse_completion(&body).expect("parse");

        assert_eq!(completion.text, "def f():\n    pass");
        assert_eq!(completion.input_tokens, Some(120));
        assert_eq!(completion.output_tokens, Some(8));
    }

    #[test]
    fn missing_usage_leaves_token_counts_empty() {
        let body = json!({"choices": [{"message": {"content": "x = 1"}}]});
        let completion = parse_completion(&body).expect("parse");
        assert_eq!(completion.input_tokens, None);
        assert_eq!(completion.output_tokens, None);
    }

    #[test]
    fn error_body_maps_to_api_error() {
        let body = json!({"error": {"message": "invalid api key"}});
        let err = parse_completion(&body).expect_err("api error");
        assert!(matches!(err, LlmError::Api { ref message, .. } if message == "invalid api key"));
    }

    #[test]
    fn blank_content_is_empty_response() {
        let body = json!({"choices": [{"message": {"content": "  "}}]});
        assert!(matches!(
            parse_completion(&body),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(
            parse_completion(&json!({"choices": []})),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn api_error_message_prefers_json_message() {
        assert_eq!(
            api_error_message(r#"{"error":{"message":"rate limited"}}"#),
            "rate limited"
        );
        assert_eq!(api_error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut settings = LlmConfig::default();
        settings.base_url = "http://localhost:8080/".to_string();
        let llm = OpenAiLlm::new(&settings, "gpt-4", "key");
        assert_eq!(llm.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(llm.model_name(), "gpt-4");
    }
}
