//! Shared types for the inference client.
//!
//! These mirror the OpenAI Chat Completions API types, used for both
//! request building and response parsing.

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Per-call overrides for a single model call.
///
/// When a field is `None` the model config default applies.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CallOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        }
    }
}

// ─── Response Types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the assistant text from a non-streaming completion body.
///
/// Missing choices, missing content and whitespace-only content are all
/// reported as `EmptyResponse`; a body that is not JSON of the expected
/// shape is `MalformedResponse`.
pub fn parse_completion_body(body: &str) -> Result<String, InferenceError> {
    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse completion: {e}"),
        })?;

    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(InferenceError::EmptyResponse)?;

    Ok(content)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_roles_lowercase() {
        let req = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 1000,
            stream: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"stream\":false"));
    }

    #[test]
    fn test_parse_completion_with_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"1. Use the Cube tool"},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_completion_body(body).unwrap(), "1. Use the Cube tool");
    }

    #[test]
    fn test_parse_completion_empty_choices() {
        let body = r#"{"choices":[]}"#;
        assert!(matches!(
            parse_completion_body(body),
            Err(InferenceError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_completion_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(
            parse_completion_body(body),
            Err(InferenceError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_completion_blank_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  \n "}}]}"#;
        assert!(matches!(
            parse_completion_body(body),
            Err(InferenceError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_completion_not_json() {
        assert!(matches!(
            parse_completion_body("<html>bad gateway</html>"),
            Err(InferenceError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_call_options_default_is_empty() {
        let opts = CallOptions::default();
        assert!(opts.max_tokens.is_none());
        assert!(opts.temperature.is_none());
    }
}
