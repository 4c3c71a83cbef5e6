//! Intent Interpreter
//!
//! Turns a free-text question into a [`QueryIntent`] by asking the model for JSON and then
//! recovering the last well-formed JSON object from whatever text comes back.

use crate::datasets::Department;
use crate::error::{AnalyticsError, PipelineError, Result};
use crate::llm::{ChatMessage, TextCompletion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const REQUIRED_FIELDS: [&str; 4] = ["departments", "products", "metrics", "aggregation"];

/// Reduction applied to a filtered column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Count,
    List,
    /// Also used for any unrecognized aggregation name.
    First,
}

impl Aggregation {
    /// Lenient parse: unknown names select [`Aggregation::First`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sum" => Aggregation::Sum,
            "avg" | "mean" => Aggregation::Mean,
            "count" => Aggregation::Count,
            "list" => Aggregation::List,
            _ => Aggregation::First,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "avg",
            Aggregation::Count => "count",
            Aggregation::List => "list",
            Aggregation::First => "first",
        };
        f.write_str(name)
    }
}

/// Which products a query asks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductFilter {
    /// Every product in the table, or the whole table when it has no `product_id`.
    All,
    Only(Vec<String>),
}

impl ProductFilter {
    fn from_json(value: &Value) -> Self {
        match value {
            _ if is_falsy(value) => ProductFilter::All,
            Value::Array(items) => ProductFilter::Only(items.iter().map(json_text).collect()),
            _ => ProductFilter::Only(Vec::new()),
        }
    }
}

/// `null`, `false`, zero, and empty strings, arrays or objects.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub departments: Vec<String>,
    pub products: ProductFilter,
    pub metrics: Vec<String>,
    pub aggregation: Aggregation,
}

impl QueryIntent {
    pub fn new<D, P, M>(departments: D, products: P, metrics: M, aggregation: Aggregation) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        let products: Vec<String> = products.into_iter().map(Into::into).collect();
        Self {
            departments: departments.into_iter().map(Into::into).collect(),
            products: if products.is_empty() {
                ProductFilter::All
            } else {
                ProductFilter::Only(products)
            },
            metrics: metrics.into_iter().map(Into::into).collect(),
            aggregation,
        }
    }

    /// Build an intent from the model's JSON object.
    ///
    /// Only presence of the four fields is checked. Wrongly typed fields are coerced into
    /// values that resolve to nothing instead of failing here.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            AnalyticsError::Interpretation("Interpretation is not a JSON object".to_string())
        })?;
        if !REQUIRED_FIELDS.iter().all(|f| object.contains_key(*f)) {
            return Err(AnalyticsError::Interpretation(
                "Missing required fields in interpretation".to_string(),
            ));
        }

        Ok(Self {
            departments: string_list(&object["departments"]),
            products: ProductFilter::from_json(&object["products"]),
            metrics: string_list(&object["metrics"]),
            aggregation: object["aggregation"]
                .as_str()
                .map(Aggregation::parse)
                .unwrap_or(Aggregation::First),
        })
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(json_text).collect(),
        _ => Vec::new(),
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every brace-delimited substring of `text` that parses as JSON, in document order.
///
/// From each opening brace the shortest closing brace that yields valid JSON wins and the
/// scan resumes after it; when nothing parses the scan moves on one character.
pub fn extract_json_blocks(text: &str) -> Vec<&str> {
    let closes: Vec<usize> = text.match_indices('}').map(|(i, _)| i).collect();
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        let first_close = closes.partition_point(|&end| end < start);
        let end = closes[first_close..].iter().copied().find(|&end| {
            serde_json::from_str::<Value>(&text[start..=end]).is_ok()
        });

        match end {
            Some(end) => {
                blocks.push(&text[start..=end]);
                cursor = end + 1;
            }
            None => cursor = start + 1,
        }
    }

    blocks
}

/// Recover an intent from raw model output, preferring the last valid JSON block.
pub fn parse_intent(response_text: &str) -> Result<QueryIntent> {
    let blocks = extract_json_blocks(response_text);
    let last = blocks.last().ok_or_else(|| {
        AnalyticsError::Interpretation("No valid JSON block found in the response.".to_string())
    })?;
    let value: Value = serde_json::from_str(last)?;
    QueryIntent::from_json(&value)
}

pub fn system_prompt() -> String {
    let departments: Vec<&str> = Department::ALL.iter().map(|d| d.as_str()).collect();
    format!(
        r#"You are an expert query interpreter. Convert the user's query into JSON format specifying:

1. departments: Which datasets to query ({})
2. products: List of product IDs (e.g., PROD001-PROD007) if specified
3. metrics: Specific columns to retrieve
4. aggregation: How to process the data (sum, avg, count, list)

Return only the JSON and nothing else.

Example outputs:
For query "Total revenue for PROD001":
{{
  "departments": ["sales"],
  "products": ["PROD001"],
  "metrics": ["net_revenue"],
  "aggregation": "sum"
}}

For query "Complaints about PROD006":
{{
  "departments": ["complaints"],
  "products": ["PROD006"],
  "metrics": ["issue_description"],
  "aggregation": "list"
}}"#,
        departments.join(", ")
    )
}

pub struct QueryInterpreter {
    llm: Arc<dyn TextCompletion>,
}

impl QueryInterpreter {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm }
    }

    /// Interpret `query`; every failure is reported as an interpretation-stage error.
    pub async fn interpret(&self, query: &str) -> std::result::Result<QueryIntent, PipelineError> {
        self.try_interpret(query)
            .await
            .map_err(|e| PipelineError::Interpretation(format!("Interpretation failed: {}", e)))
    }

    async fn try_interpret(&self, query: &str) -> Result<QueryIntent> {
        let messages = vec![ChatMessage::system(system_prompt()), ChatMessage::human(query)];
        let response = self.llm.complete(&messages).await?;
        let response_text = response.trim();
        debug!("Raw interpreter response from {}: {}", self.llm.name(), response_text);

        let intent = parse_intent(response_text)?;
        debug!("Interpreted intent: {:?}", intent);
        Ok(intent)
    }
}
