use crate::classify::classify_defect;
use crate::types::{ComponentTag, NormalizedRecord, RawRow};
use crate::util::pier_ordinal;

/// Component designation for a pier ordinal and tag.
///
/// Girders are numbered from 1 (the span after pier k is girder k+1); every
/// other component shares the pier's number.
pub fn component_label(ordinal: u128, tag: ComponentTag) -> String {
    match tag {
        ComponentTag::Girder => format!("{}#{}", ordinal.saturating_add(1), tag.label()),
        _ => format!("{}#{}", ordinal, tag.label()),
    }
}

/// Photo file name for a defect: `{pier}-{location}{defect}.jpg`.
///
/// There is intentionally no separator between location and defect type;
/// this matches how photos are named in the field.
pub fn photo_filename(pier_code: &str, location_text: &str, defect_type: &str) -> String {
    format!("{}-{}{}.jpg", pier_code, location_text, defect_type)
}

pub fn normalize_row(row: &RawRow) -> NormalizedRecord {
    let ordinal = pier_ordinal(Some(&row.pier_code));
    let tag = classify_defect(&row.defect_type);
    NormalizedRecord {
        pier: row.pier_code.clone(),
        component: component_label(ordinal, tag),
        position: row.location_text.clone(),
        defect_type: row.defect_type.clone(),
        photo: photo_filename(&row.pier_code, &row.location_text, &row.defect_type),
        tag,
        sheet: row.sheet_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pier: &str, defect: &str, location: &str) -> RawRow {
        RawRow {
            pier_code: pier.to_string(),
            defect_type: defect.to_string(),
            location_text: location.to_string(),
            sheet_name: "Sheet1".to_string(),
        }
    }

    #[test]
    fn girder_is_offset_by_one() {
        let rec = normalize_row(&row("HC-01", "梁体麻面", "左侧"));
        assert_eq!(rec.component, "2#梁");
        assert_eq!(rec.photo, "HC-01-左侧梁体麻面.jpg");
        assert_eq!(rec.tag, ComponentTag::Girder);
    }

    #[test]
    fn other_components_share_pier_number() {
        for (defect, expected) in [
            ("墩台破损", "0#墩"),
            ("垫石缺棱断角", "0#垫石"),
            ("连接件未拆除", "0#支座板"),
            ("防滑块顶死", "0#防落梁块"),
            ("刻度指针缺失", "0#支座"),
            ("异物", "0#未知构件"),
        ] {
            assert_eq!(normalize_row(&row("HC-00", defect, "左侧")).component, expected);
        }
        assert_eq!(component_label(7, ComponentTag::Girder), "8#梁");
        assert_eq!(component_label(7, ComponentTag::Plinth), "7#垫石");
    }

    #[test]
    fn full_width_pier_digits_are_numbered() {
        assert_eq!(normalize_row(&row("HC-０１", "梁体麻面", "左侧")).component, "2#梁");
        assert_eq!(normalize_row(&row("HC-12345678901", "墩台破损", "左侧")).component, "12345678901#墩");
    }

    #[test]
    fn non_numeric_pier_and_empty_fields_are_silent() {
        let rec = normalize_row(&row("东桥台", "", ""));
        assert_eq!(rec.component, "0#未知构件");
        assert_eq!(rec.photo, "东桥台-.jpg");
        let rec = normalize_row(&RawRow::default());
        assert_eq!(rec.pier, "");
        assert_eq!(rec.photo, "-.jpg");
    }

    #[test]
    fn record_is_sheet_tagged() {
        let rec = normalize_row(&row("HC-03", "螺栓锈蚀", "小里程侧"));
        assert_eq!(rec.sheet, "Sheet1");
        assert_eq!(rec.display_fields()[4], "HC-03-小里程侧螺栓锈蚀.jpg");
    }
}
