use super::{api_error, ChatMessage, GenerationParams, Role, TextCompletion};
use crate::error::{AnalyticsError, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    params: GenerationParams,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: String, params: GenerationParams) -> Self {
        Self {
            api_key,
            base_url,
            model,
            params,
            http: reqwest::Client::new(),
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::Human => "user",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_new_tokens,
        })
    }
}

#[async_trait]
impl TextCompletion for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Calling {} with {} messages", self.model, messages.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| AnalyticsError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AnalyticsError::Llm(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(err) = api_error(&response_json) {
            return Err(err);
        }
        extract_content(&response_json)
    }
}

fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| AnalyticsError::Llm("No choices in LLM response".to_string()))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(AnalyticsError::Llm(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        _ => {}
    }

    choice["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AnalyticsError::Llm("No content in LLM response".to_string()))
}
