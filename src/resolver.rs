//! Department Resolver
//!
//! Deterministic department → product → metric aggregation over the dataset store.
//! Combinations that produce nothing are pruned at every level instead of being reported
//! as empty.

use crate::datasets::{any_value_to_json, float_to_json, DatasetStore};
use crate::error::PipelineError;
use crate::interpreter::{Aggregation, ProductFilter, QueryIntent};
use polars::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use strsim::jaro_winkler;
use tracing::{debug, warn};

/// Product key used when a table has no `product_id` column.
pub const ALL_PRODUCTS: &str = "ALL";
pub const PRODUCT_COLUMN: &str = "product_id";

/// Minimum similarity for a "did you mean" hint on unknown departments.
const SUGGESTION_THRESHOLD: f64 = 0.8;

pub type MetricValues = BTreeMap<String, Value>;
pub type ProductResults = BTreeMap<String, MetricValues>;
pub type DepartmentResult = BTreeMap<String, ProductResults>;

pub struct DepartmentResolver {
    store: Arc<DatasetStore>,
}

impl DepartmentResolver {
    pub fn new(store: Arc<DatasetStore>) -> Self {
        Self { store }
    }

    /// Resolve an intent. Only a missing intent is an error; everything else yields a
    /// (possibly empty) result.
    pub fn resolve(
        &self,
        intent: Option<&QueryIntent>,
    ) -> std::result::Result<DepartmentResult, PipelineError> {
        let intent = intent
            .ok_or_else(|| PipelineError::Processing("No interpretation provided".to_string()))?;

        let mut results = DepartmentResult::new();
        for department in &intent.departments {
            let Some(df) = self.store.get(department) else {
                self.warn_unknown(department);
                continue;
            };

            let products = resolve_department(df, intent);
            if products.is_empty() {
                debug!("No matching data in {}", department);
                continue;
            }
            results.insert(department.clone(), products);
        }

        Ok(results)
    }

    fn warn_unknown(&self, department: &str) {
        let suggestion = self
            .store
            .names()
            .into_iter()
            .map(|name| (name, jaro_winkler(name, &department.to_lowercase())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match suggestion {
            Some((name, _)) => warn!("Skipping unknown department '{}' (did you mean '{}'?)", department, name),
            None => warn!("Skipping unknown department '{}'", department),
        }
    }
}

fn resolve_department(df: &DataFrame, intent: &QueryIntent) -> ProductResults {
    let has_products = df.column(PRODUCT_COLUMN).is_ok();
    let products = match &intent.products {
        ProductFilter::Only(products) => products.clone(),
        ProductFilter::All if has_products => match distinct_products(df) {
            Ok(products) => products,
            Err(e) => {
                warn!("Failed to list products: {}", e);
                return ProductResults::new();
            }
        },
        ProductFilter::All => vec![ALL_PRODUCTS.to_string()],
    };

    let mut results = ProductResults::new();
    for product in products {
        let rows = match rows_for_product(df, &product) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to filter rows for product {}: {}", product, e);
                continue;
            }
        };
        if rows.height() == 0 {
            continue;
        }

        let mut metrics = MetricValues::new();
        for metric in &intent.metrics {
            if rows.column(metric).is_err() {
                continue;
            }
            match aggregate(&rows, metric, intent.aggregation) {
                Ok(value) => {
                    metrics.insert(metric.clone(), value);
                }
                Err(e) => warn!("Failed to aggregate {} for {}: {}", metric, product, e),
            }
        }

        if !metrics.is_empty() {
            results.insert(product, metrics);
        }
    }
    results
}

/// Distinct non-null product identifiers in first-appearance order.
fn distinct_products(df: &DataFrame) -> PolarsResult<Vec<String>> {
    let ids = df
        .column(PRODUCT_COLUMN)?
        .drop_nulls()
        .unique_stable()?
        .cast(&DataType::String)?;
    Ok(ids.str()?.into_iter().flatten().map(str::to_string).collect())
}

/// Rows whose `product_id` matches case-insensitively; the whole table when there is no
/// `product_id` column.
fn rows_for_product(df: &DataFrame, product: &str) -> PolarsResult<DataFrame> {
    if df.column(PRODUCT_COLUMN).is_err() {
        return Ok(df.clone());
    }

    df.clone()
        .lazy()
        .filter(
            col(PRODUCT_COLUMN)
                .cast(DataType::String)
                .str()
                .to_uppercase()
                .eq(lit(product.to_uppercase())),
        )
        .collect()
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Evaluate a single-row reduction over `rows`.
fn reduce(rows: &DataFrame, expr: Expr) -> PolarsResult<Series> {
    let out = rows.clone().lazy().select([expr.alias("value")]).collect()?;
    Ok(out.column("value")?.clone())
}

fn float_sum(rows: &DataFrame, metric: &str) -> PolarsResult<Option<f64>> {
    let total = reduce(rows, col(metric).cast(DataType::Float64).sum())?;
    Ok(total.f64()?.get(0))
}

fn scalar_f64(frame: &DataFrame, name: &str) -> PolarsResult<f64> {
    Ok(frame.column(name)?.f64()?.get(0).unwrap_or(0.0))
}

/// Exact `i64` total; a total outside the `i64` range is reported as a float.
fn integer_sum(rows: &DataFrame, metric: &str) -> PolarsResult<Value> {
    let values = col(metric).cast(DataType::Float64);
    let bounds = rows
        .clone()
        .lazy()
        .select([
            values.clone().min().alias("min"),
            values.clone().max().alias("max"),
            values.sum().alias("sum"),
        ])
        .collect()?;
    let largest = scalar_f64(&bounds, "min")?.abs().max(scalar_f64(&bounds, "max")?.abs());

    if largest * (rows.height() as f64) < i64::MAX as f64 {
        let total = reduce(rows, col(metric).cast(DataType::Int64).sum())?;
        return Ok(Value::from(total.i64()?.get(0).unwrap_or(0)));
    }

    let casted = rows.column(metric)?.cast(&DataType::Int64)?;
    let exact = casted
        .i64()?
        .into_iter()
        .flatten()
        .try_fold(0i64, |acc, v| acc.checked_add(v));
    Ok(match exact {
        Some(total) => Value::from(total),
        None => float_to_json(scalar_f64(&bounds, "sum")?),
    })
}

/// Apply `aggregation` to the `metric` column of the filtered rows.
pub fn aggregate(rows: &DataFrame, metric: &str, aggregation: Aggregation) -> PolarsResult<Value> {
    let column = rows.column(metric)?;
    let dtype = column.dtype();
    let value = match aggregation {
        Aggregation::Sum if dtype.is_integer() => integer_sum(rows, metric)?,
        Aggregation::Sum if dtype.is_numeric() => {
            float_to_json(float_sum(rows, metric)?.unwrap_or(0.0))
        }
        Aggregation::Mean if dtype.is_numeric() => {
            let mean = reduce(rows, col(metric).cast(DataType::Float64).mean())?;
            match mean.f64()?.get(0) {
                Some(mean) => float_to_json(round2(mean)),
                None => Value::Null,
            }
        }
        Aggregation::Sum | Aggregation::Mean => Value::Null,
        Aggregation::Count => {
            let count = reduce(rows, col(metric).count().cast(DataType::Int64))?;
            Value::from(count.i64()?.get(0).unwrap_or(0))
        }
        Aggregation::List => {
            let mut values = Vec::with_capacity(column.len());
            for i in 0..column.len() {
                values.push(any_value_to_json(&column.get(i)?));
            }
            Value::Array(values)
        }
        Aggregation::First => {
            if column.is_empty() {
                Value::Null
            } else {
                any_value_to_json(&column.get(0)?)
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Arc<DatasetStore> {
        let sales = df![
            "product_id" => ["PROD001", "PROD001", "PROD002"],
            "net_revenue" => [100i64, 150, 999],
            "discount" => [0.5, 1.25, 3.0],
            "region" => ["NORTH", "SOUTH", "EAST"]
        ]
        .unwrap();
        let teams = df![
            "team_name" => ["ALPHA", "BETA"],
            "headcount" => [4i64, 6]
        ]
        .unwrap();
        Arc::new(DatasetStore::from_tables(vec![("sales", sales), ("teams", teams)]))
    }

    fn resolve(intent: &QueryIntent) -> DepartmentResult {
        DepartmentResolver::new(store()).resolve(Some(intent)).unwrap()
    }

    #[test]
    fn test_sum_filters_by_product() {
        let intent = QueryIntent::new(["sales"], ["PROD001"], ["net_revenue"], Aggregation::Sum);
        let result = resolve(&intent);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"sales": {"PROD001": {"net_revenue": 250}}})
        );
    }

    #[test]
    fn test_product_match_ignores_case() {
        let intent = QueryIntent::new(["sales"], ["prod001"], ["net_revenue"], Aggregation::Sum);
        let result = resolve(&intent);
        assert_eq!(result["sales"]["prod001"]["net_revenue"], json!(250));
    }

    #[test]
    fn test_avg_rounds_to_two_decimals() {
        let intent = QueryIntent::new(["sales"], ["PROD001"], ["discount"], Aggregation::Mean);
        let result = resolve(&intent);
        assert_eq!(result["sales"]["PROD001"]["discount"], json!(0.88));

        let forward = df!["v" => [1.0, 2.0]].unwrap();
        let backward = df!["v" => [2i64, 1]].unwrap();
        assert_eq!(aggregate(&forward, "v", Aggregation::Mean).unwrap(), json!(1.5));
        assert_eq!(aggregate(&backward, "v", Aggregation::Mean).unwrap(), json!(1.5));
    }

    #[test]
    fn test_avg_rounds_half_to_even() {
        let rows = df!["v" => [0.125]].unwrap();
        assert_eq!(aggregate(&rows, "v", Aggregation::Mean).unwrap(), json!(0.12));

        let rows = df!["v" => [0.375]].unwrap();
        assert_eq!(aggregate(&rows, "v", Aggregation::Mean).unwrap(), json!(0.38));
    }

    #[test]
    fn test_count_list_and_first() {
        let intent = QueryIntent::new(["sales"], ["PROD001"], ["region"], Aggregation::List);
        assert_eq!(resolve(&intent)["sales"]["PROD001"]["region"], json!(["NORTH", "SOUTH"]));

        let intent = QueryIntent::new(["sales"], ["PROD001"], ["region"], Aggregation::Count);
        assert_eq!(resolve(&intent)["sales"]["PROD001"]["region"], json!(2));

        let intent = QueryIntent::new(["sales"], ["PROD001"], ["region"], Aggregation::parse("median"));
        assert_eq!(resolve(&intent)["sales"]["PROD001"]["region"], json!("NORTH"));
    }

    #[test]
    fn test_count_skips_nulls() {
        let rows = df!["v" => [Some(1i64), None, Some(3)]].unwrap();
        assert_eq!(aggregate(&rows, "v", Aggregation::Count).unwrap(), json!(2));
        assert_eq!(aggregate(&rows, "v", Aggregation::Sum).unwrap(), json!(4));
        assert_eq!(aggregate(&rows, "v", Aggregation::Mean).unwrap(), json!(2.0));
    }

    #[test]
    fn test_integer_sum_past_i64_range_becomes_float() {
        let rows = df!["v" => [i64::MAX, 1]].unwrap();
        let total = aggregate(&rows, "v", Aggregation::Sum).unwrap();
        assert!(total.is_f64());
        assert_eq!(total.as_f64(), Some(i64::MAX as f64 + 1.0));

        let rows = df!["v" => [i64::MAX - 1, 1]].unwrap();
        assert_eq!(aggregate(&rows, "v", Aggregation::Sum).unwrap(), json!(i64::MAX));
    }

    #[test]
    fn test_avg_of_all_nulls_is_null() {
        let rows = df!["v" => [None::<f64>, None]].unwrap();
        assert_eq!(aggregate(&rows, "v", Aggregation::Mean).unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_products_expand_to_distinct_ids() {
        let intent = QueryIntent::new(["sales"], Vec::<String>::new(), ["net_revenue"], Aggregation::Sum);
        let result = resolve(&intent);
        let products: Vec<&String> = result["sales"].keys().collect();
        assert_eq!(products, vec!["PROD001", "PROD002"]);
        assert_eq!(result["sales"]["PROD002"]["net_revenue"], json!(999));
    }

    #[test]
    fn test_table_without_product_column_uses_all_sentinel() {
        let intent = QueryIntent::new(["teams"], Vec::<String>::new(), ["headcount"], Aggregation::Sum);
        let result = resolve(&intent);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"teams": {"ALL": {"headcount": 10}}})
        );
    }

    #[test]
    fn test_unknown_department_is_omitted() {
        let intent = QueryIntent::new(["finance", "sales"], ["PROD002"], ["net_revenue"], Aggregation::Sum);
        let result = resolve(&intent);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("sales"));
    }

    #[test]
    fn test_missing_metric_prunes_product_and_department() {
        let intent = QueryIntent::new(["sales"], ["PROD001"], ["net_revenue", "margin"], Aggregation::Sum);
        let result = resolve(&intent);
        assert_eq!(result["sales"]["PROD001"].len(), 1);

        let intent = QueryIntent::new(["sales"], ["PROD001"], ["margin"], Aggregation::Sum);
        assert!(resolve(&intent).is_empty());
    }

    #[test]
    fn test_unmatched_product_is_omitted() {
        let intent = QueryIntent::new(["sales"], ["PROD001", "PROD404"], ["net_revenue"], Aggregation::Sum);
        let result = resolve(&intent);
        assert_eq!(result["sales"].len(), 1);
        assert!(!result["sales"].contains_key("PROD404"));
    }

    #[test]
    fn test_missing_intent_is_processing_error() {
        let err = DepartmentResolver::new(store()).resolve(None).unwrap_err();
        assert_eq!(err, PipelineError::Processing("No interpretation provided".to_string()));
    }

    #[test]
    fn test_sum_over_text_is_null() {
        let rows = df!["region" => ["NORTH", "SOUTH"]].unwrap();
        assert_eq!(aggregate(&rows, "region", Aggregation::Sum).unwrap(), Value::Null);
        assert_eq!(aggregate(&rows, "region", Aggregation::Mean).unwrap(), Value::Null);
    }
}
