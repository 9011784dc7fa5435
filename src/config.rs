use crate::error::{ReportError, Result};
use std::path::PathBuf;

/// Caption markers of the two generated defect tables in the template.
pub const STRUCTURAL_CAPTION: &str = "表 3.1.1";
pub const BEARING_CAPTION: &str = "表 3.2.1";

/// Everything one report run needs. Built once by the caller (the CLI, or
/// any other driver) and passed into [`crate::pipeline::generate_report`].
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Raw defect workbook. Required.
    pub source: Option<PathBuf>,
    /// Pre-filtered five-column workbook. When set, table bodies come from it
    /// instead of from `source`; narrative counts still come from `source`.
    pub filtered_source: Option<PathBuf>,
    /// Report template (.docx). Required.
    pub template: Option<PathBuf>,
    pub output: PathBuf,
    /// Root directory searched for defect photos.
    pub asset_root: Option<PathBuf>,
    /// Collapse duplicate observations in the generated tables.
    pub dedup: bool,
    pub structural_caption: String,
    pub bearing_caption: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            source: None,
            filtered_source: None,
            template: None,
            output: PathBuf::from("桥梁支座检查报告.docx"),
            asset_root: None,
            dedup: false,
            structural_caption: STRUCTURAL_CAPTION.to_string(),
            bearing_caption: BEARING_CAPTION.to_string(),
        }
    }
}

impl ReportConfig {
    /// Source workbook and template paths, or `MissingSource` if either is
    /// not configured at all.
    pub fn require_inputs(&self) -> Result<(PathBuf, PathBuf)> {
        let source = self
            .source
            .clone()
            .ok_or(ReportError::MissingSource("source workbook"))?;
        let template = self
            .template
            .clone()
            .ok_or(ReportError::MissingSource("template"))?;
        Ok((source, template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_are_reported_by_name() {
        let cfg = ReportConfig::default();
        let err = cfg.require_inputs().unwrap_err();
        assert_eq!(err.to_string(), "no source workbook path configured");

        let cfg = ReportConfig {
            source: Some(PathBuf::from("a.xlsx")),
            ..ReportConfig::default()
        };
        let err = cfg.require_inputs().unwrap_err();
        assert_eq!(err.to_string(), "no template path configured");
    }
}
