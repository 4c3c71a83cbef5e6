use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("{0}")]
    Interpretation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Pipeline stage that produced a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Interpretation,
    Processing,
    Response,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Interpretation => "interpretation",
            Stage::Processing => "processing",
            Stage::Response => "response",
        };
        f.write_str(name)
    }
}

/// Terminal, stage-tagged failure of a single query.
///
/// The `Display` form is the line shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Error in query interpretation: {0}")]
    Interpretation(String),

    #[error("Error in processing departments: {0}")]
    Processing(String),

    /// Fallback composition failed. `report` is the descriptive text handed back in place of a
    /// report, `cause` is the message of the underlying fault.
    #[error("Error in generating response: {cause}")]
    Response { cause: String, report: String },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Interpretation(_) => Stage::Interpretation,
            PipelineError::Processing(_) => Stage::Processing,
            PipelineError::Response { .. } => Stage::Response,
        }
    }

    /// Message without the stage prefix.
    pub fn message(&self) -> &str {
        match self {
            PipelineError::Interpretation(msg) | PipelineError::Processing(msg) => msg,
            PipelineError::Response { cause, .. } => cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_stage_prefixed() {
        let err = PipelineError::Interpretation("Interpretation failed: boom".to_string());
        assert_eq!(
            err.to_string(),
            "Error in query interpretation: Interpretation failed: boom"
        );
        assert_eq!(err.stage(), Stage::Interpretation);

        let err = PipelineError::Processing("No interpretation provided".to_string());
        assert_eq!(
            err.to_string(),
            "Error in processing departments: No interpretation provided"
        );

        let err = PipelineError::Response {
            cause: "timeout".to_string(),
            report: "An error occurred during fallback response generation: timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Error in generating response: timeout");
        assert_eq!(err.message(), "timeout");
        assert_eq!(err.stage().to_string(), "response");
    }
}
