pub mod config;
pub mod datasets;
pub mod error;
pub mod interpreter;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod resolver;

pub use datasets::{DatasetStore, Department};
pub use error::{AnalyticsError, PipelineError, Stage};
pub use interpreter::{Aggregation, ProductFilter, QueryIntent};
pub use pipeline::Pipeline;
pub use report::ReportStyle;
pub use resolver::DepartmentResult;
