use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline errors.
///
/// Only source-of-truth problems end up here. Template shape mismatches and
/// missing photos are logged and absorbed where they happen.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("sheet '{sheet}' in {path} is missing required column '{column}'")]
    MissingColumn {
        path: PathBuf,
        sheet: String,
        column: String,
    },

    #[error("no {0} path configured")]
    MissingSource(&'static str),

    #[error("source workbook unreadable: {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("template unreadable: {path}: {reason}")]
    TemplateUnreadable { path: PathBuf, reason: String },

    #[error("malformed document package: {0}")]
    MalformedPackage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
