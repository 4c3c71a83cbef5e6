//! Runtime settings
//!
//! Defaults, then process environment (after `.env` is loaded), then CLI overrides applied by
//! the binary.

use crate::error::{AnalyticsError, Result};
use crate::llm::GenerationParams;
use crate::report::ReportStyle;
use clap::ValueEnum;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_WATSONX_MODEL: &str = "ibm/granite-3-8b-instruct";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Which text-completion backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Watsonx,
    Openai,
}

impl FromStr for Provider {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "watsonx" | "ibm" => Ok(Provider::Watsonx),
            "openai" => Ok(Provider::Openai),
            other => Err(AnalyticsError::Config(format!("Unknown LLM provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub model_id: String,
    pub url: Option<String>,
    pub generation: GenerationParams,
    pub data_dir: PathBuf,
    pub report_style: ReportStyle,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("LLM_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => Provider::Watsonx,
        };

        let model_id = get("MODEL_ID").unwrap_or_else(|| match provider {
            Provider::Watsonx => DEFAULT_WATSONX_MODEL.to_string(),
            Provider::Openai => DEFAULT_OPENAI_MODEL.to_string(),
        });

        let defaults = GenerationParams::default();
        let generation = GenerationParams {
            decoding_method: get("DECODING_METHOD").unwrap_or(defaults.decoding_method),
            temperature: parse_var(&get, "TEMPERATURE", defaults.temperature)?,
            min_new_tokens: parse_var(&get, "MIN_NEW_TOKENS", defaults.min_new_tokens)?,
            max_new_tokens: parse_var(&get, "MAX_NEW_TOKENS", defaults.max_new_tokens)?,
        };

        let report_style = match get("REPORT_STYLE") {
            Some(raw) => <ReportStyle as ValueEnum>::from_str(&raw, true)
                .map_err(|_| AnalyticsError::Config(format!("Unknown report style: {}", raw)))?,
            None => ReportStyle::Sections,
        };

        Ok(Self {
            provider,
            api_key: get("API_KEY"),
            project_id: get("PROJECT_ID"),
            model_id,
            url: get("URL"),
            generation,
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            report_style,
        })
    }

    /// Check that the selected provider has the credentials it needs.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push("API_KEY");
        }
        if self.provider == Provider::Watsonx {
            if self.project_id.is_none() {
                missing.push("PROJECT_ID");
            }
            if self.url.is_none() {
                missing.push("URL");
            }
        }
        if !missing.is_empty() {
            return Err(AnalyticsError::Config(format!(
                "Missing settings for {:?}: {}",
                self.provider,
                missing.join(", ")
            )));
        }
        if self.generation.min_new_tokens > self.generation.max_new_tokens {
            return Err(AnalyticsError::Config(format!(
                "MIN_NEW_TOKENS ({}) exceeds MAX_NEW_TOKENS ({})",
                self.generation.min_new_tokens, self.generation.max_new_tokens
            )));
        }
        Ok(())
    }

    /// Base URL for the selected provider.
    pub fn base_url(&self) -> String {
        match (&self.url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Provider::Openai) => DEFAULT_OPENAI_URL.to_string(),
            (None, Provider::Watsonx) => String::new(),
        }
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AnalyticsError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
