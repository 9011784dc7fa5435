// Small parsing and formatting helpers.
//
// Everything here is total: bad or missing input maps to a sentinel instead
// of an error, so the normalization path never fails on dirty cells.
use chrono::{DateTime, Local};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9０-９]+").unwrap());

fn digit_value(c: char) -> Option<u32> {
    match c {
        '０'..='９' => Some(c as u32 - '０' as u32),
        _ => c.to_digit(10),
    }
}

/// First run of digits in a pier code, or 0 when there is none.
///
/// Works for `3`, `001`, `QR-02`, `2-Y` alike. Full-width digits (`０１`)
/// count as digits. A run too long for `u128` also yields 0.
pub fn pier_ordinal(pier_code: Option<&str>) -> u128 {
    let Some(code) = pier_code else {
        return 0;
    };
    let Some(run) = DIGIT_RUN.find(code.trim()) else {
        return 0;
    };
    run.as_str()
        .chars()
        .try_fold(0u128, |acc, c| {
            acc.checked_mul(10)?
                .checked_add(u128::from(digit_value(c)?))
        })
        .unwrap_or(0)
}

/// Canonical display form of a free-text term: surrounding and inner
/// whitespace removed. Used for dedup keys.
pub fn canonical_term(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `<dir>/<stem>_<timestamp><.ext>` for a preferred output path.
pub fn timestamped_path(preferred: &Path, dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = preferred
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let name = match preferred.extension() {
        Some(ext) => format!("{}_{}.{}", stem, timestamp(now), ext.to_string_lossy()),
        None => format!("{}_{}", stem, timestamp(now)),
    };
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ordinal_takes_first_digit_run() {
        assert_eq!(pier_ordinal(Some("HC-01")), 1);
        assert_eq!(pier_ordinal(Some("QR-02-7")), 2);
        assert_eq!(pier_ordinal(Some("2-Y")), 2);
        assert_eq!(pier_ordinal(Some(" 001 ")), 1);
    }

    #[test]
    fn ordinal_defaults_to_zero() {
        assert_eq!(pier_ordinal(None), 0);
        assert_eq!(pier_ordinal(Some("")), 0);
        assert_eq!(pier_ordinal(Some("东侧桥墩")), 0);
    }

    #[test]
    fn ordinal_accepts_full_width_and_long_runs() {
        assert_eq!(pier_ordinal(Some("HC-０１")), 1);
        assert_eq!(pier_ordinal(Some("ＨＣ-１2")), 12);
        assert_eq!(pier_ordinal(Some("HC-99999999999999")), 99_999_999_999_999);
        assert_eq!(pier_ordinal(Some(&"9".repeat(40))), 0);
    }

    #[test]
    fn canonical_term_strips_whitespace() {
        assert_eq!(canonical_term(" 墩台 破损\t"), "墩台破损");
    }

    #[test]
    fn timestamped_path_keeps_extension() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 1).unwrap();
        let p = timestamped_path(Path::new("/nope/报告.docx"), Path::new("/tmp"), now);
        assert_eq!(p, PathBuf::from("/tmp/报告_20240305_090701.docx"));
    }
}
