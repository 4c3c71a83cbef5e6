//! Dataset Store
//!
//! Immutable mapping from department name to a normalized polars `DataFrame`. Built once at
//! start-up and shared read-only by every query.

pub mod loader;

use crate::error::{AnalyticsError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

pub use loader::{load_csv, normalize_column_name, normalize_frame};

/// Fixed department vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Department {
    Teams,
    TeamPerformance,
    Sales,
    Ratings,
    Products,
    Marketing,
    Complaints,
    Campaigns,
}

impl Department {
    pub const ALL: [Department; 8] = [
        Department::Teams,
        Department::TeamPerformance,
        Department::Sales,
        Department::Ratings,
        Department::Products,
        Department::Marketing,
        Department::Complaints,
        Department::Campaigns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Teams => "teams",
            Department::TeamPerformance => "team_performance",
            Department::Sales => "sales",
            Department::Ratings => "ratings",
            Department::Products => "products",
            Department::Marketing => "marketing",
            Department::Complaints => "complaints",
            Department::Campaigns => "campaigns",
        }
    }

    /// CSV file holding this department's data.
    pub fn file_name(&self) -> &'static str {
        match self {
            Department::Teams => "Teams_data.csv",
            Department::TeamPerformance => "TeamPerformance_data.csv",
            Department::Sales => "sales_data.csv",
            Department::Ratings => "ratings.csv",
            Department::Products => "Products_data.csv",
            Department::Marketing => "Marketing_data.csv",
            Department::Complaints => "Complaints_Data.csv",
            Department::Campaigns => "Campaigns_data.csv",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        Department::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| AnalyticsError::Data(format!("Unknown department: {}", s)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    tables: HashMap<String, DataFrame>,
}

impl DatasetStore {
    /// Build a store from frames that are already normalized.
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, DataFrame)>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(|(name, df)| (name.into(), df)).collect(),
        }
    }

    /// Load every department CSV found under `data_dir`.
    ///
    /// A file that is missing or fails to parse is logged and left out of the store, so a
    /// missing directory yields an empty store.
    pub fn load(data_dir: &Path) -> Result<Self> {
        if !data_dir.is_dir() {
            warn!("Data directory not found: {}", data_dir.display());
        }

        let mut tables = HashMap::new();
        for department in Department::ALL {
            let path = data_dir.join(department.file_name());
            match load_csv(&path) {
                Ok(df) => {
                    info!("Loaded {}: {:?}", department, df.shape());
                    tables.insert(department.as_str().to_string(), df);
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", department.file_name(), e);
                }
            }
        }

        if tables.is_empty() {
            warn!("No datasets loaded from {}", data_dir.display());
        }
        Ok(Self { tables })
    }

    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Dataset names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Convert a single polars cell into JSON.
pub fn any_value_to_json(value: &AnyValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::Int32(i) => Value::from(*i),
        AnyValue::Int64(i) => Value::from(*i),
        AnyValue::UInt32(u) => Value::from(*u),
        AnyValue::UInt64(u) => Value::from(*u),
        AnyValue::Float32(f) => float_to_json(*f as f64),
        AnyValue::Float64(f) => float_to_json(*f),
        other => Value::String(other.to_string()),
    }
}

/// Finite floats become JSON numbers; NaN and infinities become null.
pub fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}
