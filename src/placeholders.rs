use crate::error::Result;
use crate::reports::{dedup, defect_tallies, distinct_piers, BEARING_TAGS, STRUCTURAL_TAGS};
use crate::types::{ComponentTag, DefectEntry, NormalizedRecord};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Every placeholder the report template may contain, as `{name}`.
pub const PLACEHOLDER_NAMES: [&str; 18] = [
    "project_name",
    "bridge_name",
    "bridge_code",
    "defect_summary",
    "main_findings",
    "pier_info",
    "pier_naming_rule",
    "defect_list",
    "beam_pier_defect_list",
    "support_defect_list",
    "total_defect_list",
    "defect_causes",
    "suggestions",
    "component_status",
    "defect_distribution_and_solutions",
    "appendix",
    "id_file_mapping",
    "inspection_result",
];

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z_]+)\}").unwrap());

/// Used when nothing else provides a value.
pub const COMPANION_FALLBACK: &str = "详见配套 Excel 统计表";

const NO_DEFECTS: &str = "未发现缺陷";

fn default_text(name: &str) -> Option<&'static str> {
    match name {
        "pier_naming_rule" => Some(
            "未提供，暂按模板默认规则：沿东向西里程方向，桥墩、构件编号从 0 开始，如“0#墩”“0#垫石”",
        ),
        "bridge_code" => Some("未提供，暂按“线路名称+区段名称”分类"),
        "id_file_mapping" => Some("照片按“桥墩编号-部位缺陷类型.jpg”命名"),
        "suggestions" => Some(
            "对高优先级缺陷（如螺栓松脱或缺失、防滑块顶死、垫石破损）立即安排维修或加固。\n\
             对中优先级缺陷（如混凝土裂缝、麻面、涂装漆破损）制定定期维修和巡检计划，防止进一步恶化。\n\
             对低优先级缺陷（施工垃圾、异物、防尘围挡小破损）定期清理和维护，确保美观与排水通畅。",
        ),
        _ => None,
    }
}

/// Values supplied by the caller, keyed by placeholder name. Strings are
/// used as is; arrays of strings are joined line by line; numbers are
/// printed. Anything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderValues(pub HashMap<String, Value>);

impl PlaceholderValues {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), Value::String(value.to_string()));
    }

    /// Usable text for `name`: non-blank and not just the token itself.
    pub fn text(&self, name: &str) -> Option<String> {
        let text = match self.0.get(name)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            other => {
                warn!(placeholder = name, kind = ?other, "unsupported placeholder value ignored");
                return None;
            }
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == format!("{{{name}}}") {
            return None;
        }
        Some(text)
    }

    /// Five-field table lines supplied by the caller, one per line.
    ///
    /// `excel_filtered_table` wins when it holds any line; it may be text, a
    /// list of lines, or an object with `table31`/`table32`. Otherwise the
    /// top-level `table31` and `table32` are joined in that order.
    pub fn table_lines(&self) -> Option<String> {
        let mut lines = match self.0.get(FILTERED_TABLE_KEY) {
            Some(Value::Object(tables)) => TABLE_KEYS
                .iter()
                .flat_map(|k| value_lines(tables.get(*k)))
                .collect(),
            other => value_lines(other),
        };
        if lines.is_empty() {
            lines = TABLE_KEYS
                .iter()
                .flat_map(|k| value_lines(self.0.get(*k)))
                .collect();
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

/// Caller key holding five-field table lines for both tables.
pub const FILTERED_TABLE_KEY: &str = "excel_filtered_table";
/// Caller keys holding the structural and bearing lines separately.
pub const TABLE_KEYS: [&str; 2] = ["table31", "table32"];

/// Non-blank trimmed lines of a string or of a list of strings.
fn value_lines(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Where a placeholder's final value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Caller,
    Computed,
    Default,
    Fallback,
}

/// Final value for every name in [`PLACEHOLDER_NAMES`], in that order.
#[derive(Debug, Clone)]
pub struct PlaceholderMap {
    values: Vec<(&'static str, String, ValueSource)>,
}

impl PlaceholderMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, v, _)| v.as_str())
    }

    pub fn source(&self, name: &str) -> Option<ValueSource> {
        self.values
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, _, s)| *s)
    }

    /// `("{name}", value)` pairs ready for substitution.
    pub fn replacements(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(n, v, _)| (format!("{{{n}}}"), v.clone()))
            .collect()
    }
}

/// `（1）梁体：梁体麻面（2处）、梁体裂缝（1处）；（2）桥墩及墩台：…`, or
/// `None` when none of `tags` has an entry.
fn category_list(entries: &[DefectEntry], tags: &[ComponentTag]) -> Option<String> {
    let parts: Vec<String> = tags
        .iter()
        .filter_map(|&tag| {
            let tallies = defect_tallies(entries, tag);
            if tallies.is_empty() {
                return None;
            }
            let items: Vec<String> = tallies
                .iter()
                .map(|(d, n)| format!("{d}（{n}处）"))
                .collect();
            Some((tag, items.join("、")))
        })
        .enumerate()
        .map(|(i, (tag, items))| format!("（{}）{}：{}", i + 1, tag.category(), items))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("；") + "。")
    }
}

fn count_in(entries: &[DefectEntry], tags: &[ComponentTag]) -> usize {
    entries.iter().filter(|e| tags.contains(&e.record.tag)).count()
}

/// Narrative values derived from the records alone. Names without enough
/// data are absent from the result.
pub fn computed_values(records: &[NormalizedRecord]) -> HashMap<&'static str, String> {
    let mut out = HashMap::new();
    if records.is_empty() {
        return out;
    }
    let entries = dedup(records);

    let beam_text =
        category_list(&entries, &STRUCTURAL_TAGS).unwrap_or_else(|| NO_DEFECTS.to_string());
    let support_text =
        category_list(&entries, &BEARING_TAGS).unwrap_or_else(|| NO_DEFECTS.to_string());

    let summary = format!("1、梁体、桥墩、墩台：{beam_text}\n2、支座系统：{support_text}");
    out.insert("defect_summary", summary.clone());
    out.insert("inspection_result", summary);
    out.insert("beam_pier_defect_list", beam_text.clone());
    out.insert("support_defect_list", support_text.clone());
    out.insert(
        "defect_list",
        format!("梁体、桥墩、墩台：{beam_text}\n支座系统：{support_text}"),
    );

    let status: Vec<String> = STRUCTURAL_TAGS
        .iter()
        .chain(BEARING_TAGS.iter())
        .map(|&tag| {
            let tallies = defect_tallies(&entries, tag);
            if tallies.is_empty() {
                format!("{}：{}", tag.category(), NO_DEFECTS)
            } else {
                let n: usize = tallies.iter().map(|(_, n)| n).sum();
                format!("{}：发现{}类缺陷，共{}处", tag.category(), tallies.len(), n)
            }
        })
        .collect();
    out.insert("component_status", status.join("；") + "。");

    let structural = count_in(&entries, &STRUCTURAL_TAGS);
    let bearing = count_in(&entries, &BEARING_TAGS);
    let other = entries.len() - structural - bearing;
    let mut total = format!(
        "本次检测共发现缺陷{}处，其中梁体、桥墩、墩台{}处，支座系统{}处",
        entries.len(),
        structural,
        bearing
    );
    if other > 0 {
        total.push_str(&format!("，未归类{other}处"));
    }
    total.push('。');
    out.insert("total_defect_list", total);

    let piers = distinct_piers(records);
    match piers.as_slice() {
        [] => {}
        [only] => {
            out.insert("pier_info", format!("本次检测涉及桥墩{only}，共1个桥墩。"));
        }
        [first, .., last] => {
            out.insert(
                "pier_info",
                format!("本次检测涉及桥墩{first}至{last}，共{}个桥墩。", piers.len()),
            );
        }
    }
    out
}

/// Resolve every placeholder: caller value, then computed narrative, then
/// the fixed default, then [`COMPANION_FALLBACK`]. Known `{name}` tokens
/// inside a resolved value are then expanded against the other values, so
/// no value carries a token into the document.
pub fn build_placeholder_map(values: &PlaceholderValues, records: &[NormalizedRecord]) -> PlaceholderMap {
    let mut computed = computed_values(records);
    let resolved = PLACEHOLDER_NAMES
        .iter()
        .map(|&name| {
            let (value, source) = if let Some(v) = values.text(name) {
                (v, ValueSource::Caller)
            } else if let Some(v) = computed.remove(name) {
                (v, ValueSource::Computed)
            } else if let Some(v) = default_text(name) {
                (v.to_string(), ValueSource::Default)
            } else {
                warn!(placeholder = name, "no value available; using fallback text");
                (COMPANION_FALLBACK.to_string(), ValueSource::Fallback)
            };
            (name, value, source)
        })
        .collect::<Vec<_>>();

    let expanded = resolved
        .iter()
        .map(|(name, value, source)| {
            let text = expand_tokens(name, value, &resolved);
            let (text, source) = if text.trim().is_empty() {
                warn!(placeholder = *name, "value only referenced placeholders; using fallback text");
                (COMPANION_FALLBACK.to_string(), ValueSource::Fallback)
            } else {
                (text, *source)
            };
            debug!(placeholder = *name, ?source, "placeholder resolved");
            (*name, text, source)
        })
        .collect();
    PlaceholderMap { values: expanded }
}

fn is_placeholder(name: &str) -> bool {
    PLACEHOLDER_NAMES.contains(&name)
}

/// Drop every known `{name}` token from `text`.
fn strip_tokens(text: &str) -> String {
    TOKEN
        .replace_all(text, |caps: &Captures| {
            if is_placeholder(&caps[1]) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Expand known tokens inside the value of `own` with the other resolved
/// values, once. A reference to `own` is dropped, and tokens left in an
/// inserted value are stripped, so the result holds no known token.
fn expand_tokens(own: &str, value: &str, resolved: &[(&'static str, String, ValueSource)]) -> String {
    TOKEN
        .replace_all(value, |caps: &Captures| {
            let name = &caps[1];
            if !is_placeholder(name) {
                return caps[0].to_string();
            }
            if name == own {
                return String::new();
            }
            resolved
                .iter()
                .find(|(n, _, _)| *n == name)
                .map(|(_, v, _)| strip_tokens(v))
                .unwrap_or_default()
        })
        .into_owned()
}
