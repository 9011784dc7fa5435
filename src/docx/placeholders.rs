use super::document::{text_element, Document};
use super::xml::{Element, Node};
use tracing::debug;

/// Replace every `(token, value)` occurrence across the runs of `p`.
///
/// Tokens may be split over several `w:t` elements; the replacement lands in
/// the run where the token starts and the remaining pieces are cut out of
/// the following runs, so formatting of surrounding text is kept. Scanning
/// resumes after the inserted value, so a value that contains its own token
/// is not expanded again. Returns the number of replacements.
pub fn replace_in_paragraph(p: &mut Element, replacements: &[(String, String)]) -> usize {
    let mut texts: Vec<&mut Element> = Vec::new();
    p.find_all_mut("w:t", &mut texts);
    if texts.is_empty() {
        return 0;
    }
    let mut segments: Vec<Vec<char>> = texts.iter().map(|t| t.text().chars().collect()).collect();

    let mut count = 0;
    for (token, value) in replacements {
        let token: Vec<char> = token.chars().collect();
        if token.is_empty() {
            continue;
        }
        let value: Vec<char> = value.chars().collect();
        let mut from = 0;
        loop {
            let flat = segments.concat();
            let Some(start) = find(&flat[from.min(flat.len())..], &token).map(|i| i + from) else {
                break;
            };
            splice(&mut segments, start, start + token.len(), &value);
            count += 1;
            from = start + value.len();
        }
    }

    if count > 0 {
        for (t, seg) in texts.iter_mut().zip(&segments) {
            let text: String = seg.iter().collect();
            t.set_text(&text);
            t.set_attr("xml:space", "preserve");
        }
        drop(texts);
        expand_line_breaks(p);
    }
    count
}

fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Replace the flat char range `start..end` spread over `segments` with
/// `value`, placed in the first segment the range touches.
fn splice(segments: &mut [Vec<char>], start: usize, end: usize, value: &[char]) {
    let mut pos = 0;
    let mut inserted = false;
    for seg in segments.iter_mut() {
        let seg_start = pos;
        let seg_end = pos + seg.len();
        pos = seg_end;
        if seg_end <= start || seg_start >= end {
            continue;
        }
        let local_start = start.saturating_sub(seg_start);
        let local_end = (end - seg_start).min(seg.len());
        let mut rebuilt = seg[..local_start].to_vec();
        if !inserted {
            rebuilt.extend_from_slice(value);
            inserted = true;
        }
        rebuilt.extend_from_slice(&seg[local_end..]);
        *seg = rebuilt;
    }
}

/// Turn `\n` inside run text into `w:br` elements.
fn expand_line_breaks(p: &mut Element) {
    let mut runs: Vec<&mut Element> = Vec::new();
    p.find_all_mut("w:r", &mut runs);
    for run in runs {
        let has_newline = run
            .elements()
            .any(|e| e.name == "w:t" && e.text().contains('\n'));
        if !has_newline {
            continue;
        }
        for node in std::mem::take(&mut run.children) {
            match node {
                Node::Element(t) if t.name == "w:t" && t.text().contains('\n') => {
                    for (i, line) in t.text().split('\n').enumerate() {
                        if i > 0 {
                            run.push(Element::new("w:br"));
                        }
                        run.push(text_element(line.trim_end_matches('\r')));
                    }
                }
                other => run.children.push(other),
            }
        }
    }
}

/// Apply `replacements` to every paragraph of the document body, including
/// paragraphs inside table cells. Returns the total replacement count.
pub fn substitute_placeholders(doc: &mut Document, replacements: &[(String, String)]) -> usize {
    let mut total = 0;
    for p in doc.paragraphs_mut() {
        total += replace_in_paragraph(p, replacements);
    }
    debug!(replaced = total, "placeholder substitution done");
    total
}

/// Tokens from `tokens` still present anywhere in the body text.
pub fn remaining_tokens<'a>(doc: &Document, tokens: &'a [(String, String)]) -> Vec<&'a str> {
    let texts = doc.all_paragraph_texts();
    tokens
        .iter()
        .map(|(t, _)| t.as_str())
        .filter(|t| texts.iter().any(|p| p.contains(t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::document::{paragraph_text, tests::document_xml};
    use crate::docx::xml;

    fn map(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn para(markup: &str) -> Element {
        xml::parse(markup).unwrap().root
    }

    #[test]
    fn token_split_across_runs_is_replaced() {
        let mut p = para(
            "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>工程：{proj</w:t></w:r><w:r><w:t>ect_</w:t></w:r><w:r><w:t>name}。</w:t></w:r></w:p>",
        );
        let n = replace_in_paragraph(&mut p, &map(&[("{project_name}", "厦门轨道交通3号线")]));
        assert_eq!(n, 1);
        assert_eq!(paragraph_text(&p), "工程：厦门轨道交通3号线。");
        let mut texts = Vec::new();
        p.find_all("w:t", &mut texts);
        assert_eq!(texts[0].text(), "工程：厦门轨道交通3号线");
        assert_eq!(texts[1].text(), "");
        assert_eq!(texts[2].text(), "。");
    }

    #[test]
    fn repeated_and_self_referencing_values() {
        let mut p = para("<w:p><w:r><w:t>{a}/{a}</w:t></w:r></w:p>");
        let n = replace_in_paragraph(&mut p, &map(&[("{a}", "x{a}")]));
        assert_eq!(n, 2);
        assert_eq!(paragraph_text(&p), "x{a}/x{a}");
    }

    #[test]
    fn newlines_become_breaks() {
        let mut p = para("<w:p><w:r><w:t>{list}</w:t></w:r></w:p>");
        replace_in_paragraph(&mut p, &map(&[("{list}", "一\n二")]));
        let run = p.child("w:r").unwrap();
        let names: Vec<&str> = run.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:t", "w:br", "w:t"]);
        assert_eq!(paragraph_text(&p), "一\n二");
    }

    #[test]
    fn untouched_paragraph_is_unchanged() {
        let src = "<w:p><w:r><w:t>无占位符 {unknown}</w:t></w:r></w:p>";
        let mut p = para(src);
        let before = p.clone();
        assert_eq!(replace_in_paragraph(&mut p, &map(&[("{a}", "b")])), 0);
        assert_eq!(p, before);
    }

    #[test]
    fn substitutes_inside_table_cells() {
        let mut doc = Document::parse(&document_xml(
            "<w:p><w:r><w:t>{bridge_name}</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>{bridge_name}桥</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
        ))
        .unwrap();
        let tokens = map(&[("{bridge_name}", "东渡"), ("{appendix}", "无")]);
        assert_eq!(substitute_placeholders(&mut doc, &tokens), 2);
        assert_eq!(doc.all_paragraph_texts(), vec!["东渡", "东渡桥"]);
        assert!(remaining_tokens(&doc, &tokens).is_empty());
    }
}
