//! Report Composer
//!
//! Narrates resolved results through the language model. The prompt layout is a
//! [`ReportStrategy`]; the composer owns the primary → fallback control flow shared by all
//! strategies.

pub mod reasoned;
pub mod sectioned;

use crate::error::{AnalyticsError, PipelineError, Result};
use crate::llm::{ChatMessage, TextCompletion};
use crate::resolver::DepartmentResult;
use chrono::Local;
use clap::ValueEnum;
use std::sync::Arc;
use tracing::{info, warn};

pub use reasoned::ReasonedReport;
pub use sectioned::SectionedReport;

/// Prompt templates for one report layout.
pub trait ReportStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prompt used when there are results to narrate. `data` is the pretty-printed JSON of
    /// the resolved results.
    fn primary_messages(&self, query: &str, data: &str, current_date: &str) -> Vec<ChatMessage>;

    /// Data-free prompt used when there are no results or the primary prompt failed.
    fn fallback_messages(&self, query: &str) -> Vec<ChatMessage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportStyle {
    /// Key findings, insights, recommendations, conclusion.
    Sections,
    /// Chain-of-thought followed by a final answer.
    Reasoned,
}

impl ReportStyle {
    pub fn strategy(&self) -> Box<dyn ReportStrategy> {
        match self {
            ReportStyle::Sections => Box::new(SectionedReport),
            ReportStyle::Reasoned => Box::new(ReasonedReport),
        }
    }
}

pub fn fallback_failure_message(cause: &str) -> String {
    format!("An error occurred during fallback response generation: {}", cause)
}

pub struct ReportComposer {
    llm: Arc<dyn TextCompletion>,
    strategy: Box<dyn ReportStrategy>,
}

impl ReportComposer {
    pub fn new(llm: Arc<dyn TextCompletion>, strategy: Box<dyn ReportStrategy>) -> Self {
        Self { llm, strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Compose the report for `query`.
    ///
    /// Empty or absent results go straight to the fallback prompt. A failed primary prompt
    /// also falls back; only a failed fallback is returned as an error.
    pub async fn compose(
        &self,
        query: &str,
        results: Option<&DepartmentResult>,
    ) -> std::result::Result<String, PipelineError> {
        let Some(results) = results.filter(|r| !r.is_empty()) else {
            info!("No department results, using fallback report");
            return self.fallback(query).await;
        };

        match self.primary(query, results).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!("Primary report generation failed, falling back: {}", e);
                self.fallback(query).await
            }
        }
    }

    async fn primary(&self, query: &str, results: &DepartmentResult) -> Result<String> {
        let data = serde_json::to_string_pretty(results)?;
        let current_date = Local::now().format("%Y-%m-%d").to_string();
        let messages = self.strategy.primary_messages(query, &data, &current_date);

        let report = self.llm.complete(&messages).await?;
        if report.trim().is_empty() {
            return Err(AnalyticsError::Llm("Empty report from language model".to_string()));
        }
        Ok(report)
    }

    async fn fallback(&self, query: &str) -> std::result::Result<String, PipelineError> {
        let messages = self.strategy.fallback_messages(query);
        self.llm.complete(&messages).await.map_err(|e| {
            let cause = e.to_string();
            PipelineError::Response {
                report: fallback_failure_message(&cause),
                cause,
            }
        })
    }
}
