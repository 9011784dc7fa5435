use crate::error::{ReportError, Result};
use crate::normalize::normalize_row;
use crate::reports::route_records;
use crate::types::{ComponentTag, NormalizedRecord, RawRow, RoutedTables};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const COL_PIER: &str = "桥墩";
pub const COL_COMPONENT: &str = "构件";
pub const COL_POSITION: &str = "部位";
pub const COL_DEFECT: &str = "缺陷类型";
pub const COL_PHOTO: &str = "现场照片";

/// Columns every input sheet must carry (after alias mapping).
pub const REQUIRED_COLUMNS: [&str; 3] = [COL_PIER, COL_DEFECT, COL_POSITION];

/// Only piers with this prefix make it into filtered five-field tables.
pub const PIER_PREFIX: &str = "HC";

/// Header spellings found in raw inspection workbooks.
const COLUMN_ALIASES: &[(&str, &str)] = &[("桥墩编号", COL_PIER), ("缺陷部位（里程/侧别）", COL_POSITION)];

fn canonical_column(name: &str) -> &str {
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// A worksheet as plain trimmed strings. Row 0 is the header.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Canonical column name → index of its first occurrence.
    fn column_index(&self) -> HashMap<String, usize> {
        let mut idx = HashMap::new();
        if let Some(header) = self.rows.first() {
            for (i, name) in header.iter().enumerate() {
                idx.entry(canonical_column(name.trim()).to_string()).or_insert(i);
            }
        }
        idx
    }

    fn body(&self) -> impl Iterator<Item = &Vec<String>> {
        self.rows.iter().skip(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

impl Workbook {
    /// Read every sheet of an .xlsx/.xls/.ods file.
    pub fn open(path: &Path) -> Result<Self> {
        let unreadable = |e: calamine::Error| ReportError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let mut workbook = open_workbook_auto(path).map_err(unreadable)?;
        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(unreadable)?;
            let rows = range
                .rows()
                .map(|r| r.iter().map(cell_text).collect())
                .collect();
            sheets.push(Sheet { name, rows });
        }
        debug!(path = %path.display(), sheets = sheets.len(), "workbook loaded");
        Ok(Workbook {
            path: path.to_path_buf(),
            sheets,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub sheets: usize,
    pub total_rows: usize,
    pub blank_rows: usize,
    pub passthrough_rows: usize,
    pub unknown_components: usize,
}

pub fn load_and_normalize(path: &Path) -> Result<(Vec<NormalizedRecord>, LoadReport)> {
    let workbook = Workbook::open(path)?;
    normalize_workbook(&workbook)
}

/// Normalize every row of every sheet, sheet order outer, row order inner.
///
/// A sheet whose header lacks a required column stops the whole load. A sheet
/// with no cells at all has no header to check and is skipped with a warning.
/// Sheets that already carry the five output columns are taken verbatim.
pub fn normalize_workbook(workbook: &Workbook) -> Result<(Vec<NormalizedRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let mut out = Vec::new();

    for sheet in &workbook.sheets {
        if sheet.rows.is_empty() {
            warn!(sheet = %sheet.name, "sheet is empty, skipping");
            continue;
        }
        let idx = sheet.column_index();
        for column in REQUIRED_COLUMNS {
            if !idx.contains_key(column) {
                return Err(ReportError::MissingColumn {
                    path: workbook.path.clone(),
                    sheet: sheet.name.clone(),
                    column: column.to_string(),
                });
            }
        }
        report.sheets += 1;

        let passthrough = idx.contains_key(COL_COMPONENT) && idx.contains_key(COL_PHOTO);
        let val = |row: &Vec<String>, col: &str| -> String {
            idx.get(col)
                .and_then(|i| row.get(*i))
                .cloned()
                .unwrap_or_default()
        };

        for row in sheet.body() {
            if row.iter().all(|c| c.is_empty()) {
                report.blank_rows += 1;
                continue;
            }
            report.total_rows += 1;
            let record = if passthrough {
                report.passthrough_rows += 1;
                NormalizedRecord::from_fields(
                    [
                        val(row, COL_PIER),
                        val(row, COL_COMPONENT),
                        val(row, COL_POSITION),
                        val(row, COL_DEFECT),
                        val(row, COL_PHOTO),
                    ],
                    &sheet.name,
                )
            } else {
                normalize_row(&RawRow {
                    pier_code: val(row, COL_PIER),
                    defect_type: val(row, COL_DEFECT),
                    location_text: val(row, COL_POSITION),
                    sheet_name: sheet.name.clone(),
                })
            };
            if record.tag == ComponentTag::Unknown {
                report.unknown_components += 1;
                debug!(sheet = %sheet.name, defect = %record.defect_type, "unclassified defect type");
            }
            out.push(record);
        }
    }
    Ok((out, report))
}

/// Five-field records from a workbook of already formatted sheets, keeping
/// only `HC` piers. Missing columns read as empty fields here.
pub fn filtered_records(workbook: &Workbook) -> Vec<NormalizedRecord> {
    let mut out = Vec::new();
    for sheet in &workbook.sheets {
        let idx = sheet.column_index();
        for row in sheet.body() {
            let val = |col: &str| -> String {
                idx.get(col)
                    .and_then(|i| row.get(*i))
                    .cloned()
                    .unwrap_or_default()
            };
            let pier = val(COL_PIER);
            if !pier.starts_with(PIER_PREFIX) {
                continue;
            }
            out.push(NormalizedRecord::from_fields(
                [
                    pier,
                    val(COL_COMPONENT),
                    val(COL_POSITION),
                    val(COL_DEFECT),
                    val(COL_PHOTO),
                ],
                &sheet.name,
            ));
        }
    }
    out
}

pub fn load_filtered_tables(path: &Path) -> Result<RoutedTables> {
    let workbook = Workbook::open(path)?;
    Ok(route_records(&filtered_records(&workbook)))
}

/// Parse `pier,component,position,defect_type,photo` lines.
///
/// Full-width `，` and `、` count as separators. Lines with fewer than five
/// fields or a pier outside the `HC` prefix are dropped; extra fields are
/// ignored.
pub fn parse_five_field_lines(text: &str) -> Vec<NormalizedRecord> {
    let normalized = text.replace(['，', '、'], ",");
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(normalized.as_bytes());

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed five-field line");
                continue;
            }
        };
        if record.len() < 5 {
            continue;
        }
        let fields: [String; 5] =
            std::array::from_fn(|i| record.get(i).unwrap_or_default().to_string());
        if !fields[0].starts_with(PIER_PREFIX) {
            continue;
        }
        out.push(NormalizedRecord::from_fields(fields, ""));
    }
    out
}
