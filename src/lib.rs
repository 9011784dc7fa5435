//! Bridge inspection defect pipeline: workbook rows are classified and
//! normalized, aggregated and routed into two defect tables, and written into
//! a .docx report template together with narrative placeholders and photos.

pub mod classify;
pub mod config;
pub mod docx;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod placeholders;
pub mod reports;
pub mod types;
pub mod util;

pub use config::ReportConfig;
pub use error::{ReportError, Result};
pub use pipeline::{generate_report, ReportOutcome};
