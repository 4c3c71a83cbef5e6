use async_trait::async_trait;
use biznova::error::{AnalyticsError, Result};
use biznova::llm::{ChatMessage, TextCompletion};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Replays canned model outputs in order and records the prompts it was given.
pub struct ScriptedLlm {
    outcomes: Mutex<Vec<Result<String>>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(mut outcomes: Vec<Result<String>>) -> Self {
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextCompletion for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(AnalyticsError::Llm("script exhausted".to_string())))
    }
}

/// Temp directory with department CSVs written the way the raw exports look.
pub fn write_fixture_data() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("biznova-fixture-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();

    fs::write(
        dir.join("sales_data.csv"),
        "Sale ID,Product ID,Net Revenue,Units Sold,Sale Date\n\
         S1,prod001,100,2,2024-01-05\n\
         S2,PROD001,150,3,2024-01-09\n\
         S3,PROD002,999,9,not-a-date\n",
    )
    .unwrap();
    fs::write(
        dir.join("Complaints_Data.csv"),
        "Complaint ID,Product ID,Issue Description\n\
         C1,PROD006, battery drains fast \n\
         C2,PROD006,screen flickers\n\
         C3,PROD003,late delivery\n",
    )
    .unwrap();
    fs::write(
        dir.join("Teams_data.csv"),
        "Team Name,Headcount\nAlpha,4\nBeta,6\n",
    )
    .unwrap();

    dir
}
