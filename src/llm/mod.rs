//! Text-completion boundary
//!
//! Every stage that talks to a language model goes through [`TextCompletion`]. Providers
//! live in submodules and are picked by [`build_client`].

pub mod openai;
pub mod watsonx;

use crate::config::{Provider, Settings};
use crate::error::{AnalyticsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use openai::OpenAiClient;
pub use watsonx::WatsonxClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::Human => "Human",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub decoding_method: String,
    pub temperature: f64,
    pub min_new_tokens: u32,
    pub max_new_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            decoding_method: "greedy".to_string(),
            temperature: 0.7,
            min_new_tokens: 5,
            max_new_tokens: 1000,
        }
    }
}

/// Opaque text-completion capability: role-tagged turns in, response text out.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Flatten turns into a single prompt for plain text-generation endpoints.
pub fn render_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the client selected by `settings.provider`.
pub fn build_client(settings: &Settings) -> Result<Arc<dyn TextCompletion>> {
    settings.validate()?;
    let api_key = settings
        .api_key
        .clone()
        .ok_or_else(|| AnalyticsError::Config("API_KEY is not set".to_string()))?;

    let client: Arc<dyn TextCompletion> = match settings.provider {
        Provider::Watsonx => {
            let project_id = settings
                .project_id
                .clone()
                .ok_or_else(|| AnalyticsError::Config("PROJECT_ID is not set".to_string()))?;
            Arc::new(WatsonxClient::new(
                api_key,
                project_id,
                settings.model_id.clone(),
                settings.base_url(),
                settings.generation.clone(),
            ))
        }
        Provider::Openai => Arc::new(OpenAiClient::new(
            api_key,
            settings.model_id.clone(),
            settings.base_url(),
            settings.generation.clone(),
        )),
    };
    Ok(client)
}

/// Map an `error` object in a provider response body to an `Llm` error.
pub(crate) fn api_error(response_json: &serde_json::Value) -> Option<AnalyticsError> {
    response_json.get("error").map(|error| {
        AnalyticsError::Llm(format!(
            "LLM API error: {}",
            serde_json::to_string(error).unwrap_or_else(|_| "Unknown error".to_string())
        ))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt() {
        let messages = vec![
            ChatMessage::system("You are an analyst."),
            ChatMessage::human("Total revenue for PROD001"),
        ];
        assert_eq!(
            render_prompt(&messages),
            "System: You are an analyst.\nHuman: Total revenue for PROD001"
        );
    }

    #[test]
    fn test_api_error_detection() {
        let body = serde_json::json!({"error": {"message": "quota exceeded"}});
        let err = api_error(&body).unwrap();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(api_error(&serde_json::json!({"choices": []})).is_none());
    }
}
