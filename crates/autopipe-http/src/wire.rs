//! Chat-completions wire format

use autopipe_core::{CompletionRequest, ExecutorError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: [ChatMessage<'a>; 2],
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Request body for a completion request
pub(crate) fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: &request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_prompt,
            },
        ],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

/// Text of the first choice
///
/// Blank or null content is still a response; the stage succeeds and its
/// artifacts simply fail to decode.
pub(crate) fn parse_response(body: &str) -> Result<String, ExecutorError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ExecutorError::InvalidResponse(format!("malformed body: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ExecutorError::InvalidResponse("response has no choices".to_string()))
}

/// Human-readable message from an error response body
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.chars().take(512).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn body_carries_both_prompts_and_policy() {
        let request = CompletionRequest {
            system_prompt: "You are a QA Engineer.".to_string(),
            user_prompt: "Task: build a login form".to_string(),
            max_tokens: 4096,
            temperature: 0.5,
        };

        let body = serde_json::to_value(build_body("gpt-4o-mini", &request)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You are a QA Engineer."},
                    {"role": "user", "content": "Task: build a login form"}
                ],
                "max_tokens": 4096,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn first_choice_content_is_returned() {
        let body = r#"{"id": "x", "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "{\"apis\": []}"}},
            {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
        ]}"#;
        assert_eq!(parse_response(body).unwrap(), r#"{"apis": []}"#);
    }

    #[test]
    fn blank_content_is_still_a_response() {
        assert_eq!(
            parse_response(r#"{"choices": [{"message": {"content": "  "}}]}"#).unwrap(),
            "  "
        );
        assert_eq!(
            parse_response(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap(),
            ""
        );
    }

    #[test]
    fn missing_choices_are_invalid() {
        for body in [r#"{"choices": []}"#, r#"{}"#, "not json"] {
            assert!(
                matches!(parse_response(body), Err(ExecutorError::InvalidResponse(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn error_messages_are_extracted() {
        assert_eq!(
            error_message(r#"{"error": {"message": "Rate limit reached", "type": "requests"}}"#),
            "Rate limit reached"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(""), "empty response body");
        assert_eq!(error_message(&"x".repeat(2000)).len(), 512);
    }
}
