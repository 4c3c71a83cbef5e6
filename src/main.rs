use anyhow::{Context, Result};
use biznova::config::{Provider, Settings};
use biznova::llm::build_client;
use biznova::{DatasetStore, Pipeline, ReportStyle};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "biznova")]
#[command(about = "Answer business questions from departmental datasets with an LLM-written report")]
struct Args {
    /// The question in natural language (read from stdin when omitted)
    query: Option<String>,

    /// Directory holding the department CSV files (overrides DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// LLM provider (overrides LLM_PROVIDER)
    #[arg(long, value_enum)]
    provider: Option<Provider>,

    /// Report layout (overrides REPORT_STYLE)
    #[arg(long, value_enum)]
    report_style: Option<ReportStyle>,

    /// Model identifier (overrides MODEL_ID)
    #[arg(long)]
    model_id: Option<String>,

    /// Sampling temperature (overrides TEMPERATURE)
    #[arg(long)]
    temperature: Option<f64>,

    /// Generation length cap (overrides MAX_NEW_TOKENS)
    #[arg(long)]
    max_new_tokens: Option<u32>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.data_dir {
            settings.data_dir = dir.clone();
        }
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if let Some(style) = self.report_style {
            settings.report_style = style;
        }
        if let Some(model_id) = &self.model_id {
            settings.model_id = model_id.clone();
        }
        if let Some(temperature) = self.temperature {
            settings.generation.temperature = temperature;
        }
        if let Some(max_new_tokens) = self.max_new_tokens {
            settings.generation.max_new_tokens = max_new_tokens;
        }
    }
}

fn read_query() -> Result<Option<String>> {
    println!("{}", "=".repeat(60));
    println!("BUSINESS ANALYTICS REPORTING SYSTEM");
    println!("{}", "=".repeat(60));
    print!("Please enter your query: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let query = line.trim().to_string();
    Ok((!query.is_empty()).then_some(query))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("biznova=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env().context("Failed to read settings")?;
    args.apply(&mut settings);

    info!("Loading datasets from {:?}", settings.data_dir);
    let store = DatasetStore::load(&settings.data_dir).context("Failed to load datasets")?;
    info!("Loaded {} dataset(s): {}", store.len(), store.names().join(", "));

    let llm = build_client(&settings).context("Failed to create LLM client")?;
    let pipeline = Pipeline::new(Arc::new(store), llm, settings.report_style);

    let query = match args.query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()) {
        Some(query) => query,
        None => match read_query()? {
            Some(query) => query,
            None => {
                println!("No query provided. Exiting.");
                return Ok(());
            }
        },
    };

    println!("\n{}", "-".repeat(60));
    println!("QUERY: {}", query);
    println!("{}", "-".repeat(60));

    let response = pipeline.run(&query).await;

    println!("\nFINAL RESPONSE:");
    println!("{}", response);
    println!("{}", "-".repeat(60));

    Ok(())
}
