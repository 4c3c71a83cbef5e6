use super::{api_error, render_prompt, ChatMessage, GenerationParams, TextCompletion};
use crate::error::{AnalyticsError, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
const API_VERSION: &str = "2023-05-29";
/// Refresh the bearer token this long before IAM says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

struct BearerToken {
    value: String,
    expires_at: Instant,
}

/// watsonx.ai text-generation client.
pub struct WatsonxClient {
    api_key: String,
    project_id: String,
    model_id: String,
    base_url: String,
    params: GenerationParams,
    http: reqwest::Client,
    token: Mutex<Option<BearerToken>>,
}

impl WatsonxClient {
    pub fn new(
        api_key: String,
        project_id: String,
        model_id: String,
        base_url: String,
        params: GenerationParams,
    ) -> Self {
        Self {
            api_key,
            project_id,
            model_id,
            base_url,
            params,
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        info!("Requesting IAM token for watsonx");
        let response = self
            .http
            .post(IAM_TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalyticsError::Llm(format!("IAM token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AnalyticsError::Llm(format!(
                "IAM token error ({}): {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Llm(format!("Failed to parse IAM response: {}", e)))?;
        let value = body["access_token"]
            .as_str()
            .ok_or_else(|| AnalyticsError::Llm("No access_token in IAM response".to_string()))?
            .to_string();
        let lifetime = Duration::from_secs(body["expires_in"].as_u64().unwrap_or(3600));

        *guard = Some(BearerToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_SLACK),
        });
        Ok(value)
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "input": render_prompt(messages),
            "model_id": self.model_id,
            "project_id": self.project_id,
            "parameters": {
                "decoding_method": self.params.decoding_method,
                "temperature": self.params.temperature,
                "min_new_tokens": self.params.min_new_tokens,
                "max_new_tokens": self.params.max_new_tokens,
            },
        })
    }
}

#[async_trait]
impl TextCompletion for WatsonxClient {
    fn name(&self) -> &str {
        "watsonx"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let token = self.bearer_token().await?;
        debug!("Calling {} with {} messages", self.model_id, messages.len());

        let response = self
            .http
            .post(format!(
                "{}/ml/v1/text/generation?version={}",
                self.base_url, API_VERSION
            ))
            .bearer_auth(token)
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
        extract_generated_text(&response_json)
    }
}

fn extract_generated_text(response_json: &serde_json::Value) -> Result<String> {
    if let Some(err) = api_error(response_json) {
        return Err(err);
    }
    if let Some(errors) = response_json.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| e["message"].as_str().unwrap_or("unknown").to_string())
                .collect();
            return Err(AnalyticsError::Llm(format!(
                "LLM API error: {}",
                messages.join("; ")
            )));
        }
    }

    response_json["results"]
        .as_array()
        .and_then(|r| r.first())
        .and_then(|r| r["generated_text"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AnalyticsError::Llm("No generated_text in LLM response".to_string()))
}
