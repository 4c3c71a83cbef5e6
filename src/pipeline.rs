//! Query pipeline: interpret → resolve → compose, stopping at the first failed stage.

use crate::datasets::DatasetStore;
use crate::error::PipelineError;
use crate::interpreter::QueryInterpreter;
use crate::llm::TextCompletion;
use crate::report::{ReportComposer, ReportStrategy, ReportStyle};
use crate::resolver::DepartmentResolver;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub struct Pipeline {
    interpreter: QueryInterpreter,
    resolver: DepartmentResolver,
    composer: ReportComposer,
}

impl Pipeline {
    pub fn new(store: Arc<DatasetStore>, llm: Arc<dyn TextCompletion>, style: ReportStyle) -> Self {
        Self::with_strategy(store, llm, style.strategy())
    }

    pub fn with_strategy(
        store: Arc<DatasetStore>,
        llm: Arc<dyn TextCompletion>,
        strategy: Box<dyn ReportStrategy>,
    ) -> Self {
        Self {
            interpreter: QueryInterpreter::new(llm.clone()),
            resolver: DepartmentResolver::new(store),
            composer: ReportComposer::new(llm, strategy),
        }
    }

    /// Run the query and return the report or the stage-prefixed error line. Never fails.
    pub async fn run(&self, query: &str) -> String {
        match self.execute(query).await {
            Ok(report) => report,
            Err(e) => e.to_string(),
        }
    }

    pub async fn execute(&self, query: &str) -> Result<String, PipelineError> {
        let span = info_span!("query", id = %Uuid::new_v4());
        self.execute_stages(query).instrument(span).await
    }

    async fn execute_stages(&self, query: &str) -> Result<String, PipelineError> {
        info!("Query Interpreter is thinking...");
        let intent = self.interpreter.interpret(query).await.map_err(log_failure)?;
        info!("Query Interpreter completed.");

        info!("Department Processor is processing data...");
        let results = self.resolver.resolve(Some(&intent)).map_err(log_failure)?;
        info!(
            "Department Processor completed ({} department(s) with data).",
            results.len()
        );

        info!(
            "Response Generator is generating response ({} strategy)...",
            self.composer.strategy_name()
        );
        let report = self
            .composer
            .compose(query, Some(&results))
            .await
            .map_err(log_failure)?;
        info!("Response Generator completed.");

        Ok(report)
    }
}

fn log_failure(e: PipelineError) -> PipelineError {
    error!(stage = %e.stage(), "{}", e);
    e
}
