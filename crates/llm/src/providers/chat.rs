//! Chat-completions wire format shared by OpenAI and Azure OpenAI.

use crate::client::{LlmRequest, LlmResponse, LlmUsage};
use serde::{Deserialize, Serialize};
use tally_core::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl ChatRequest {
    /// Build the message list: optional system message, then the user message.
    pub fn from_request(request: &LlmRequest, include_model: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        Self {
            model: include_model.then(|| request.model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

impl ChatResponse {
    /// Take the first choice's text. A response with no text is an error.
    pub fn into_llm_response(self, fallback_model: &str) -> AppResult<LlmResponse> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Llm("No response generated from the model".to_string()))?;

        let usage = self
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: self.model.unwrap_or_else(|| fallback_model.to_string()),
            usage,
        })
    }
}

/// Send a prepared chat request and decode the response.
///
/// Network failures map to `Transient`; non-success statuses go through
/// [`AppError::from_status`].
pub(crate) async fn send_chat(
    builder: reqwest::RequestBuilder,
    body: &ChatRequest,
    provider: &str,
    fallback_model: &str,
) -> AppResult<LlmResponse> {
    let response = builder.json(body).send().await.map_err(|e| {
        AppError::Transient(format!("Failed to send request to {}: {}", provider, e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::from_status(
            status.as_u16(),
            &format!("{} completion", provider),
            &error_text,
        ));
    }

    let chat: ChatResponse = response
        .json()
        .await
        .map_err(|e| AppError::Llm(format!("Failed to parse {} response: {}", provider, e)))?;

    chat.into_llm_response(fallback_model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_comes_first() {
        let request = LlmRequest::new("What is the total?", "gpt-4")
            .with_system("Answer from context")
            .with_temperature(0.2)
            .with_max_tokens(500);

        let chat = ChatRequest::from_request(&request, false);
        assert!(chat.model.is_none());
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[1].role, "user");
        assert_eq!(chat.max_tokens, Some(500));

        let json = serde_json::to_value(&chat).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["messages"][1]["content"], "What is the total?");
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "model": "gpt-4",
            "choices": [{"message": {"role": "assistant", "content": "  42 \n"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let chat: ChatResponse = serde_json::from_str(raw).unwrap();
        let response = chat.into_llm_response("fallback").unwrap();
        assert_eq!(response.content, "42");
        assert_eq!(response.usage.total_tokens, 12);
    }

    #[test]
    fn test_empty_choices_is_error() {
        let chat: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(chat.into_llm_response("gpt-4").is_err());
    }
}
