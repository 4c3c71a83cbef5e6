//! CSV ingestion and normalization
//!
//! Column names are lowercased with every character outside `[a-z0-9_]` replaced by `_`.
//! String columns whose name contains `date` become timestamps (unparsable → null); other
//! string columns become `f64` when every value is numeric, otherwise they are trimmed and
//! upper-cased.

use crate::error::{AnalyticsError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref NON_IDENT_CHARS: Regex = Regex::new(r"[^a-z0-9_]").unwrap();
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Read and normalize one CSV file.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(AnalyticsError::Data(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(1000))
        .finish()?
        .collect()?;

    normalize_frame(df)
}

pub fn normalize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_IDENT_CHARS.replace_all(&lowered, "_").into_owned()
}

/// Apply name, timestamp and text normalization to a freshly read frame.
pub fn normalize_frame(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| normalize_column_name(n))
        .collect();
    df.set_column_names(names.as_slice())?;

    for name in &names {
        let series = df.column(name)?;
        if series.dtype() != &DataType::String {
            continue;
        }
        let normalized = if name.contains("date") {
            parse_timestamp_column(series)?
        } else {
            coerce_text_column(series)?
        };
        df.with_column(normalized)?;
    }

    Ok(df)
}

/// Best-effort timestamp parsing; anything unrecognized becomes null.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_timestamp_column(series: &Series) -> Result<Series> {
    let ca = series.str()?;
    let parsed = ca.into_iter().map(|v| v.and_then(parse_timestamp));
    Ok(
        DatetimeChunked::from_naive_datetime_options(series.name(), parsed, TimeUnit::Milliseconds)
            .into_series(),
    )
}

fn coerce_text_column(series: &Series) -> Result<Series> {
    let ca = series.str()?;
    let trimmed: Vec<Option<&str>> = ca.into_iter().map(|v| v.map(str::trim)).collect();

    let mut present = trimmed.iter().flatten().peekable();
    let all_numeric = present.peek().is_some() && present.all(|s| s.parse::<f64>().is_ok());

    if all_numeric {
        let values: Vec<Option<f64>> = trimmed
            .iter()
            .map(|v| v.and_then(|s| s.parse::<f64>().ok()))
            .collect();
        Ok(Series::new(series.name(), values))
    } else {
        let values: Vec<Option<String>> = trimmed
            .iter()
            .map(|v| v.map(|s| s.to_uppercase()))
            .collect();
        Ok(Series::new(series.name(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name(" Net Revenue "), "net_revenue");
        assert_eq!(normalize_column_name("Product-ID"), "product_id");
        assert_eq!(normalize_column_name("Sale Date (UTC)"), "sale_date__utc_");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05"), Some(expected));
        assert_eq!(parse_timestamp("03/05/2024"), Some(expected));
        assert_eq!(parse_timestamp(" 2024/03/05 "), Some(expected));
        assert!(parse_timestamp("2024-03-05 14:30:00").is_some());
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_normalize_frame() {
        let df = df![
            "Product ID" => ["  prod001 ", "prod002"],
            "Sale Date" => ["2024-01-15", "garbage"],
            "Units" => [" 3 ", "4"],
            "Net Revenue" => [100.0, 150.0]
        ]
        .unwrap();

        let df = normalize_frame(df).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["product_id", "sale_date", "units", "net_revenue"]);

        let products = df.column("product_id").unwrap();
        assert_eq!(products.str().unwrap().get(0), Some("PROD001"));

        let dates = df.column("sale_date").unwrap();
        assert!(matches!(dates.dtype(), DataType::Datetime(_, _)));
        assert_eq!(dates.null_count(), 1);

        let units = df.column("units").unwrap();
        assert_eq!(units.dtype(), &DataType::Float64);
        assert_eq!(units.f64().unwrap().get(0), Some(3.0));
    }

    #[test]
    fn test_load_csv_from_disk() {
        let dir = std::env::temp_dir().join(format!("biznova-loader-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sales_data.csv");
        fs::write(
            &path,
            "Product ID,Net Revenue,Order Date\nprod001,100,2024-01-01\nPROD002,999,2024-01-02\n",
        )
        .unwrap();

        let df = load_csv(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        let products = df.column("product_id").unwrap();
        assert_eq!(products.str().unwrap().get(0), Some("PROD001"));

        assert!(load_csv(&dir.join("missing.csv")).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
