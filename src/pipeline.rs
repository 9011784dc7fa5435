//! One report run: workbook in, filled document out.

use crate::config::ReportConfig;
use crate::docx::placeholders::remaining_tokens;
use crate::docx::{
    fill_table_after_caption, insert_filtered_tables, overlay_photos, substitute_placeholders,
    DocxPackage, FillOutcome, OverlayReport,
};
use crate::error::{ReportError, Result};
use crate::loader::{load_and_normalize, load_filtered_tables, parse_five_field_lines, LoadReport};
use crate::output::write_document;
use crate::placeholders::{build_placeholder_map, PlaceholderMap, PlaceholderValues};
use crate::reports::{dedup, generate_summary, route_records};
use crate::types::{NormalizedRecord, RoutedTables, SummaryStats};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub output: PathBuf,
    pub load: LoadReport,
    pub summary: SummaryStats,
    pub structural_fill: FillOutcome,
    pub bearing_fill: FillOutcome,
    pub inserted_tables: usize,
    pub placeholders_replaced: usize,
    pub photos: Option<OverlayReport>,
}

fn display_rows(records: &[NormalizedRecord]) -> Vec<[String; 5]> {
    records.iter().map(NormalizedRecord::display_fields).collect()
}

/// Table contents, first available of: five-field lines supplied with the
/// placeholder values, the filtered workbook, the normalized records. Rows
/// are optionally collapsed to one per observation.
fn table_records(
    config: &ReportConfig,
    values: &PlaceholderValues,
    records: &[NormalizedRecord],
) -> Result<RoutedTables> {
    let supplied = match values.table_lines() {
        Some(lines) => {
            let rows = parse_five_field_lines(&lines);
            if rows.is_empty() {
                warn!("supplied table lines hold no usable rows; ignoring them");
            }
            rows
        }
        None => Vec::new(),
    };
    let routed = if !supplied.is_empty() {
        info!(rows = supplied.len(), "table rows taken from supplied lines");
        route_records(&supplied)
    } else {
        match &config.filtered_source {
            Some(path) => load_filtered_tables(path)?,
            None => route_records(records),
        }
    };
    if !config.dedup {
        return Ok(routed);
    }
    let collapse = |rows: &[NormalizedRecord]| -> Vec<NormalizedRecord> {
        dedup(rows).into_iter().map(|e| e.record).collect()
    };
    Ok(RoutedTables {
        structural: collapse(&routed.structural),
        bearing: collapse(&routed.bearing),
    })
}

/// Fill the template's tables and placeholders, embed photos when an asset
/// root is configured, and save. Only source problems are fatal; template
/// mismatches and photo problems are logged and reported in the outcome.
pub fn generate_report(config: &ReportConfig, values: &PlaceholderValues) -> Result<ReportOutcome> {
    let (source, template) = config.require_inputs()?;

    let (records, load) = load_and_normalize(&source)?;
    let summary = generate_summary(&records);
    info!(
        records = summary.total_records,
        structural = summary.structural_records,
        bearing = summary.bearing_records,
        "workbook aggregated"
    );
    let tables = table_records(config, values, &records)?;
    let map = build_placeholder_map(values, &records);

    let mut pkg = DocxPackage::open(&template).map_err(|e| ReportError::TemplateUnreadable {
        path: template.clone(),
        reason: e.to_string(),
    })?;

    let structural_rows = display_rows(&tables.structural);
    let bearing_rows = display_rows(&tables.bearing);
    let inserted_tables = insert_filtered_tables(&mut pkg.document, &structural_rows, &bearing_rows);
    let structural_fill = fill_table_after_caption(&mut pkg.document, &config.structural_caption, &structural_rows);
    let bearing_fill = fill_table_after_caption(&mut pkg.document, &config.bearing_caption, &bearing_rows);

    let placeholders_replaced = apply_placeholders(&mut pkg, &map);

    let photos = config
        .asset_root
        .as_deref()
        .map(|root| overlay_photos(&mut pkg, root));

    let output = write_document(&pkg, &config.output)?;
    info!(output = %output.display(), "report written");
    Ok(ReportOutcome {
        output,
        load,
        summary,
        structural_fill,
        bearing_fill,
        inserted_tables,
        placeholders_replaced,
        photos,
    })
}

fn apply_placeholders(pkg: &mut DocxPackage, map: &PlaceholderMap) -> usize {
    let replacements = map.replacements();
    let replaced = substitute_placeholders(&mut pkg.document, &replacements);
    let left = remaining_tokens(&pkg.document, &replacements);
    if !left.is_empty() {
        warn!(tokens = ?left, "placeholder tokens remain after substitution");
    }
    replaced
}

/// Photo overlay on its own, for a document produced earlier.
pub fn overlay_document(input: &Path, asset_root: &Path, output: &Path) -> Result<(PathBuf, OverlayReport)> {
    let mut pkg = DocxPackage::open(input).map_err(|e| ReportError::TemplateUnreadable {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;
    let report = overlay_photos(&mut pkg, asset_root);
    let written = write_document(&pkg, output)?;
    Ok((written, report))
}
