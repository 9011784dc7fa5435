use super::document::{paragraph_text, set_cell_text, set_paragraph_text, Document};
use super::xml::{Element, Node};
use tracing::{info, warn};

pub const TABLE_HEADERS: [&str; 5] = ["桥墩", "构件", "部位", "缺陷类型", "现场照片"];
pub const TABLE_PLACEHOLDER: &str = "{excel_filtered_table}";

/// Column widths of a generated five-column table, in inches.
const COLUMN_WIDTHS_IN: [f64; 5] = [0.8, 1.0, 1.2, 1.5, 2.0];
const TWIPS_PER_INCH: f64 = 1440.0;
/// Blank body rows in an inserted table that has no data.
const BLANK_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled { rows_written: usize, rows_added: usize },
    CaptionNotFound,
    TableNotFound,
}

/// Locate the first body paragraph containing `caption`, then the first table
/// after it, and write `rows` into that table's body.
pub fn fill_table_after_caption(doc: &mut Document, caption: &str, rows: &[[String; 5]]) -> FillOutcome {
    let body = doc.body_mut();
    let Some(caption_pos) = body
        .children
        .iter()
        .position(|n| matches!(n, Node::Element(p) if p.name == "w:p" && paragraph_text(p).trim().contains(caption)))
    else {
        warn!(caption, "caption not found in template; table left as is");
        return FillOutcome::CaptionNotFound;
    };
    let table = body.children[caption_pos + 1..].iter_mut().find_map(|n| match n {
        Node::Element(e) if e.name == "w:tbl" => Some(e),
        _ => None,
    });
    let Some(table) = table else {
        warn!(caption, "no table follows caption; table left as is");
        return FillOutcome::TableNotFound;
    };
    let (rows_written, rows_added) = fill_table_body(table, rows);
    info!(caption, rows_written, rows_added, "filled defect table");
    FillOutcome::Filled {
        rows_written,
        rows_added,
    }
}

fn row_positions(tbl: &Element) -> Vec<usize> {
    tbl.children
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is_element("w:tr"))
        .map(|(i, _)| i)
        .collect()
}

/// Write `rows` from the second table row on, appending rows as needed. The
/// header row is never touched and the table is stretched to full width.
///
/// Returns `(rows_written, rows_added)`.
pub fn fill_table_body(tbl: &mut Element, rows: &[[String; 5]]) -> (usize, usize) {
    set_full_width(tbl);
    let mut added = 0;
    for (i, values) in rows.iter().enumerate() {
        let row_idx = i + 1;
        while row_positions(tbl).len() <= row_idx {
            append_blank_row(tbl);
            added += 1;
        }
        let pos = row_positions(tbl)[row_idx];
        let Node::Element(tr) = &mut tbl.children[pos] else {
            continue;
        };
        let mut cells: Vec<&mut Element> = tr.elements_mut().filter(|e| e.name == "w:tc").collect();
        if cells.len() < values.len() {
            warn!(row = row_idx, cells = cells.len(), "table row has fewer than five cells");
        }
        for (cell, value) in cells.iter_mut().zip(values.iter()) {
            set_cell_text(cell, value, true);
        }
    }
    (rows.len(), added)
}

/// Append a copy of the last row with its text cleared, or a plain
/// five-cell row if the table has none.
fn append_blank_row(tbl: &mut Element) {
    let positions = row_positions(tbl);
    let last = positions
        .last()
        .and_then(|&p| match &tbl.children[p] {
            Node::Element(tr) => Some(tr.clone()),
            _ => None,
        });
    let row = match last {
        Some(mut tr) => {
            if let Some(trpr) = tr.child_mut("w:trPr") {
                trpr.remove_children("w:tblHeader");
            }
            for tc in tr.elements_mut().filter(|e| e.name == "w:tc") {
                if let Some(tcpr) = tc.child_mut("w:tcPr") {
                    tcpr.remove_children("w:vMerge");
                }
                set_cell_text(tc, "", false);
            }
            tr
        }
        None => build_row(&["", "", "", "", ""]),
    };
    let insert_at = positions.last().map_or(tbl.children.len(), |&p| p + 1);
    tbl.children.insert(insert_at, Node::Element(row));
}

/// Force `w:tblW` to 100% of the text width.
pub fn set_full_width(tbl: &mut Element) {
    let tblpr = tbl.ensure_child("w:tblPr", true);
    tblpr.remove_children("w:tblW");
    tblpr.push(
        Element::new("w:tblW")
            .with_attr("w:type", "pct")
            .with_attr("w:w", "5000"),
    );
}

fn width_twips(inches: f64) -> String {
    ((inches * TWIPS_PER_INCH).round() as i64).to_string()
}

fn build_row(values: &[&str; 5]) -> Element {
    let mut tr = Element::new("w:tr");
    for (value, inches) in values.iter().zip(COLUMN_WIDTHS_IN) {
        let mut tc = Element::new("w:tc").with_child(
            Element::new("w:tcPr").with_child(
                Element::new("w:tcW")
                    .with_attr("w:w", &width_twips(inches))
                    .with_attr("w:type", "dxa"),
            ),
        );
        set_cell_text(&mut tc, value, true);
        tr.push(tc);
    }
    tr
}

/// A new bordered five-column defect table: header row plus one row per
/// record, or five blank rows when there is nothing to show.
pub fn build_defect_table(rows: &[[String; 5]]) -> Element {
    let mut grid = Element::new("w:tblGrid");
    for inches in COLUMN_WIDTHS_IN {
        grid.push(Element::new("w:gridCol").with_attr("w:w", &width_twips(inches)));
    }
    let mut tbl = Element::new("w:tbl")
        .with_child(
            Element::new("w:tblPr")
                .with_child(Element::new("w:tblStyle").with_attr("w:val", "TableGrid"))
                .with_child(Element::new("w:tblLook").with_attr("w:val", "04A0")),
        )
        .with_child(grid)
        .with_child(build_row(&TABLE_HEADERS));
    set_full_width(&mut tbl);

    if rows.is_empty() {
        for _ in 0..BLANK_ROWS {
            tbl.push(build_row(&["", "", "", "", ""]));
        }
    } else {
        for values in rows {
            let refs: [&str; 5] = std::array::from_fn(|i| values[i].as_str());
            tbl.push(build_row(&refs));
        }
    }
    tbl
}

/// Replace every body paragraph holding `{excel_filtered_table}` with an
/// empty paragraph followed by a generated table. Paragraphs starting with
/// `3.1` or `3.2` set which subset the next placeholder receives; a
/// placeholder outside both sections is just cleared.
///
/// Returns the number of tables inserted.
pub fn insert_filtered_tables(
    doc: &mut Document,
    structural: &[[String; 5]],
    bearing: &[[String; 5]],
) -> usize {
    let body = doc.body_mut();
    let mut section: Option<&[[String; 5]]> = None;
    let mut inserted = 0;
    let mut i = 0;
    while i < body.children.len() {
        let Node::Element(p) = &mut body.children[i] else {
            i += 1;
            continue;
        };
        if p.name != "w:p" {
            i += 1;
            continue;
        }
        let text = paragraph_text(p);
        let text = text.trim();
        if text.starts_with("3.1") {
            section = Some(structural);
        } else if text.starts_with("3.2") {
            section = Some(bearing);
        }
        if !text.contains(TABLE_PLACEHOLDER) {
            i += 1;
            continue;
        }
        set_paragraph_text(p, "", false);
        match section {
            Some(rows) => {
                body.children
                    .insert(i + 1, Node::Element(build_defect_table(rows)));
                inserted += 1;
                info!(rows = rows.len(), "inserted filtered defect table");
                i += 2;
            }
            None => {
                warn!("table placeholder outside sections 3.1/3.2; cleared");
                i += 1;
            }
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::document::cell_text;
    use crate::docx::document::tests::document_xml;

    fn rows(n: usize) -> Vec<[String; 5]> {
        (0..n)
            .map(|i| {
                [
                    format!("HC-0{i}"),
                    format!("{}#梁", i + 1),
                    "左侧".to_string(),
                    "梁体麻面".to_string(),
                    format!("HC-0{i}-左侧梁体麻面.jpg"),
                ]
            })
            .collect()
    }

    fn header_row() -> String {
        let cells: String = TABLE_HEADERS
            .iter()
            .map(|h| format!("<w:tc><w:p><w:r><w:t>{h}</w:t></w:r></w:p></w:tc>"))
            .collect();
        format!("<w:tr><w:trPr><w:tblHeader/></w:trPr>{cells}</w:tr>")
    }

    fn blank_row() -> String {
        "<w:tr>".to_string() + &"<w:tc><w:p/></w:tc>".repeat(5) + "</w:tr>"
    }

    fn table_texts(tbl: &Element) -> Vec<Vec<String>> {
        tbl.elements()
            .filter(|e| e.name == "w:tr")
            .map(|tr| tr.elements().filter(|e| e.name == "w:tc").map(cell_text).collect())
            .collect()
    }

    fn template(caption: &str) -> Document {
        Document::parse(&document_xml(&format!(
            "<w:p><w:r><w:t>{caption} 梁体缺陷统计</w:t></w:r></w:p><w:p/><w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr>{}{}</w:tbl>",
            header_row(),
            blank_row()
        )))
        .unwrap()
    }

    #[test]
    fn fills_from_second_row_and_grows() {
        let mut doc = template("表 3.1.1");
        let outcome = fill_table_after_caption(&mut doc, "表 3.1.1", &rows(3));
        assert_eq!(
            outcome,
            FillOutcome::Filled {
                rows_written: 3,
                rows_added: 2
            }
        );
        let tbl = doc.tables()[0];
        let texts = table_texts(tbl);
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0], TABLE_HEADERS.map(String::from).to_vec());
        assert_eq!(texts[3][1], "3#梁");

        let mut headers = Vec::new();
        tbl.find_all("w:tblHeader", &mut headers);
        assert_eq!(headers.len(), 1);
        let width = tbl.child("w:tblPr").unwrap().child("w:tblW").unwrap();
        assert_eq!(width.attr("w:type"), Some("pct"));
        assert_eq!(width.attr("w:w"), Some("5000"));
    }

    #[test]
    fn missing_caption_or_table_is_a_no_op() {
        let mut doc = template("表 3.1.1");
        assert_eq!(
            fill_table_after_caption(&mut doc, "表 3.2.1", &rows(1)),
            FillOutcome::CaptionNotFound
        );
        let mut doc = Document::parse(&document_xml("<w:p><w:r><w:t>表 3.2.1</w:t></w:r></w:p>")).unwrap();
        assert_eq!(
            fill_table_after_caption(&mut doc, "表 3.2.1", &rows(1)),
            FillOutcome::TableNotFound
        );
    }

    #[test]
    fn empty_rows_leave_body_untouched() {
        let mut doc = template("表 3.1.1");
        let outcome = fill_table_after_caption(&mut doc, "表 3.1.1", &[]);
        assert_eq!(
            outcome,
            FillOutcome::Filled {
                rows_written: 0,
                rows_added: 0
            }
        );
        assert_eq!(table_texts(doc.tables()[0]).len(), 2);
    }

    #[test]
    fn placeholder_tables_follow_sections() {
        let mut doc = Document::parse(&document_xml(
            "<w:p><w:r><w:t>3.1 梁体</w:t></w:r></w:p>\
             <w:p><w:r><w:t>{excel_filtered_table}</w:t></w:r></w:p>\
             <w:p><w:r><w:t>3.2 支座</w:t></w:r></w:p>\
             <w:p><w:r><w:t>{excel_</w:t></w:r><w:r><w:t>filtered_table}</w:t></w:r></w:p>",
        ))
        .unwrap();
        let inserted = insert_filtered_tables(&mut doc, &rows(2), &[]);
        assert_eq!(inserted, 2);

        let tables = doc.tables();
        let first = table_texts(tables[0]);
        assert_eq!(first.len(), 3);
        assert_eq!(first[1][0], "HC-00");
        let second = table_texts(tables[1]);
        assert_eq!(second.len(), 1 + BLANK_ROWS);
        assert!(second[1].iter().all(String::is_empty));
        assert!(!doc
            .all_paragraph_texts()
            .iter()
            .any(|t| t.contains(TABLE_PLACEHOLDER)));
    }

    #[test]
    fn column_widths_are_in_twips() {
        let tbl = build_defect_table(&[]);
        let widths: Vec<&str> = tbl
            .child("w:tblGrid")
            .unwrap()
            .elements()
            .filter_map(|c| c.attr("w:w"))
            .collect();
        assert_eq!(widths, vec!["1152", "1440", "1728", "2160", "2880"]);
    }
}
