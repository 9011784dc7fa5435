use crate::types::{
    CategoryCountRow, ComponentTag, DedupKey, DefectEntry, NormalizedRecord, RoutedTables,
    SummaryStats, TableSubset,
};
use crate::util::canonical_term;
use std::collections::HashMap;
use tracing::debug;

/// Component markers for the girder/pier/abutment table.
pub const STRUCTURAL_MARKERS: [&str; 2] = ["#梁", "#墩"];
/// Component markers for the bearing-system table.
pub const BEARING_MARKERS: [&str; 4] = ["#防落梁块", "#垫石", "#支座板", "#支座"];

/// Category order used in narrative text for each table.
pub const STRUCTURAL_TAGS: [ComponentTag; 2] = [ComponentTag::Girder, ComponentTag::Pier];
pub const BEARING_TAGS: [ComponentTag; 4] = [
    ComponentTag::AntiFallBlock,
    ComponentTag::Plinth,
    ComponentTag::BearingPlate,
    ComponentTag::SphericalBearing,
];

/// Which table a component designation belongs to, if any.
///
/// The structural check runs first, so a designation carrying markers from
/// both sets still lands in exactly one table.
pub fn table_subset(component: &str) -> Option<TableSubset> {
    if STRUCTURAL_MARKERS.iter().any(|m| component.contains(m)) {
        Some(TableSubset::Structural)
    } else if BEARING_MARKERS.iter().any(|m| component.contains(m)) {
        Some(TableSubset::BearingSystem)
    } else {
        None
    }
}

/// Split records into the two generated tables, preserving input order.
/// Records matching neither marker set are left out of both.
pub fn route_records(records: &[NormalizedRecord]) -> RoutedTables {
    let mut routed = RoutedTables::default();
    for r in records {
        match table_subset(&r.component) {
            Some(TableSubset::Structural) => routed.structural.push(r.clone()),
            Some(TableSubset::BearingSystem) => routed.bearing.push(r.clone()),
            None => debug!(component = %r.component, pier = %r.pier, "record not routed to any table"),
        }
    }
    routed
}

pub fn dedup_key(r: &NormalizedRecord) -> DedupKey {
    DedupKey {
        pier: canonical_term(&r.pier),
        position: canonical_term(&r.position),
        defect_type: canonical_term(&r.defect_type),
    }
}

/// Collapse records sharing a [`DedupKey`] into one entry per key.
///
/// The first record of each group is kept as representative (with its
/// defect type in canonical form) and the entry count is the exact group size.
/// Entries come out in order of first appearance.
pub fn dedup(records: &[NormalizedRecord]) -> Vec<DefectEntry> {
    merge_entries(
        records
            .iter()
            .map(|r| DefectEntry {
                record: r.clone(),
                count: 1,
            })
            .collect(),
    )
}

/// Merge entries sharing a key, summing their counts. Idempotent.
pub fn merge_entries(entries: Vec<DefectEntry>) -> Vec<DefectEntry> {
    let mut index: HashMap<DedupKey, usize> = HashMap::new();
    let mut out: Vec<DefectEntry> = Vec::new();
    for entry in entries {
        let key = dedup_key(&entry.record);
        match index.get(&key) {
            Some(&i) => out[i].count += entry.count,
            None => {
                let mut record = entry.record;
                record.defect_type = key.defect_type.clone();
                index.insert(key, out.len());
                out.push(DefectEntry {
                    record,
                    count: entry.count,
                });
            }
        }
    }
    out
}

pub fn total_count(entries: &[DefectEntry]) -> usize {
    entries.iter().map(|e| e.count).sum()
}

/// Raw record count and distinct-observation count per category, in
/// [`ComponentTag::ALL`] order. Categories with no records are omitted.
pub fn category_counts(records: &[NormalizedRecord]) -> Vec<CategoryCountRow> {
    #[derive(Default)]
    struct Acc {
        records: usize,
        distinct: usize,
    }
    let mut map: HashMap<ComponentTag, Acc> = HashMap::new();
    for r in records {
        map.entry(r.tag).or_default().records += 1;
    }
    for e in dedup(records) {
        map.entry(e.record.tag).or_default().distinct += 1;
    }
    ComponentTag::ALL
        .into_iter()
        .filter_map(|tag| {
            map.remove(&tag).map(|acc| CategoryCountRow {
                category: tag.category().to_string(),
                records: acc.records,
                distinct: acc.distinct,
            })
        })
        .collect()
}

/// Distinct defect types per category with the number of distinct
/// observations of each, in first-appearance order.
pub fn defect_tallies(entries: &[DefectEntry], tag: ComponentTag) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = Vec::new();
    for e in entries.iter().filter(|e| e.record.tag == tag) {
        match out.iter_mut().find(|(d, _)| *d == e.record.defect_type) {
            Some((_, n)) => *n += 1,
            None => out.push((e.record.defect_type.clone(), 1)),
        }
    }
    out
}

/// Distinct pier codes in first-appearance order.
pub fn distinct_piers(records: &[NormalizedRecord]) -> Vec<String> {
    let mut piers: Vec<String> = Vec::new();
    for r in records {
        if !r.pier.is_empty() && !piers.contains(&r.pier) {
            piers.push(r.pier.clone());
        }
    }
    piers
}

pub fn generate_summary(records: &[NormalizedRecord]) -> SummaryStats {
    let routed = route_records(records);
    let structural_records = routed.structural.len();
    let bearing_records = routed.bearing.len();
    SummaryStats {
        total_records: records.len(),
        deduplicated_entries: dedup(records).len(),
        structural_records,
        bearing_records,
        unrouted_records: records.len() - structural_records - bearing_records,
        piers: distinct_piers(records),
        categories: category_counts(records),
    }
}

/// Plain-text per-sheet statistics:
/// `{category}共发现缺陷{n}处，其中{defect}_{k}处，…。`
///
/// Counts are raw rows; categories and defect types appear in the order first
/// seen in each sheet.
pub fn sheet_statistics(records: &[NormalizedRecord]) -> String {
    struct SheetAcc<'a> {
        name: &'a str,
        categories: Vec<(ComponentTag, Vec<(&'a str, usize)>)>,
    }
    let mut sheets: Vec<SheetAcc> = Vec::new();
    for r in records {
        let pos = match sheets.iter().position(|s| s.name == r.sheet) {
            Some(p) => p,
            None => {
                sheets.push(SheetAcc {
                    name: &r.sheet,
                    categories: Vec::new(),
                });
                sheets.len() - 1
            }
        };
        let cats = &mut sheets[pos].categories;
        let cat_pos = match cats.iter().position(|(t, _)| *t == r.tag) {
            Some(p) => p,
            None => {
                cats.push((r.tag, Vec::new()));
                cats.len() - 1
            }
        };
        let defects = &mut cats[cat_pos].1;
        match defects.iter_mut().find(|(d, _)| *d == r.defect_type) {
            Some((_, n)) => *n += 1,
            None => defects.push((&r.defect_type, 1)),
        }
    }

    let blocks: Vec<String> = sheets
        .into_iter()
        .map(|sheet| {
            let mut lines = vec![format!("Sheet: {}", sheet.name)];
            for (tag, defects) in sheet.categories {
                let total: usize = defects.iter().map(|(_, n)| n).sum();
                let parts: Vec<String> = defects
                    .iter()
                    .map(|(d, n)| format!("{}_{}处", d, n))
                    .collect();
                lines.push(format!(
                    "{}共发现缺陷{}处，其中{}。",
                    tag.category(),
                    total,
                    parts.join("，")
                ));
            }
            lines.join("\n")
        })
        .collect();
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_row;
    use crate::types::RawRow;

    fn rec(pier: &str, defect: &str, location: &str) -> NormalizedRecord {
        normalize_row(&RawRow {
            pier_code: pier.to_string(),
            defect_type: defect.to_string(),
            location_text: location.to_string(),
            sheet_name: "S1".to_string(),
        })
    }

    fn sample() -> Vec<NormalizedRecord> {
        vec![
            rec("HC-00", "墩台破损", "大里程侧右侧"),
            rec("HC-00", "墩台破损", "大里程侧右侧"),
            rec("HC-00", "螺栓锈蚀", "左侧"),
            rec("HC-01", "梁体麻面", "左侧"),
            rec("HC-01", "螺栓锈蚀", "左侧"),
            rec("HC-01", "螺栓锈蚀", "右侧"),
            rec("HC-02", "异物", "右侧"),
        ]
    }

    #[test]
    fn duplicate_rows_collapse_with_exact_count() {
        let entries = dedup(&sample()[..2]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].count, 2);
        assert_eq!(entries[0].record.component, "0#墩");
    }

    #[test]
    fn dedup_preserves_total_and_is_idempotent() {
        let records = sample();
        let once = dedup(&records);
        assert_eq!(total_count(&once), records.len());
        assert!(once.len() <= records.len());
        assert_eq!(once.len(), 6);
        let twice = merge_entries(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn dedup_key_ignores_whitespace_and_shows_canonical_term() {
        let records = vec![rec("HC-00", "墩台 破损", "左侧"), rec("HC-00", "墩台破损", " 左侧")];
        let entries = dedup(&records);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].count, 2);
        assert_eq!(entries[0].record.defect_type, "墩台破损");
    }

    #[test]
    fn category_counts_sum_to_row_count() {
        let records = sample();
        let counts = category_counts(&records);
        let total: usize = counts.iter().map(|c| c.records).sum();
        assert_eq!(total, records.len());
        let anti_fall = counts.iter().find(|c| c.category == "防落梁块").unwrap();
        assert_eq!(anti_fall.records, 3);
        assert_eq!(anti_fall.distinct, 3);
        let pier = counts.iter().find(|c| c.category == "桥墩及墩台").unwrap();
        assert_eq!((pier.records, pier.distinct), (2, 1));
    }

    #[test]
    fn routing_is_disjoint_and_ordered() {
        let records = sample();
        let routed = route_records(&records);
        let structural: Vec<_> = routed.structural.iter().map(|r| r.component.as_str()).collect();
        assert_eq!(structural, ["0#墩", "0#墩", "2#梁"]);
        assert_eq!(routed.bearing.len(), 3);
        for r in &routed.structural {
            assert!(!routed.bearing.contains(r));
        }
        // 0#未知构件 lands nowhere
        assert_eq!(routed.structural.len() + routed.bearing.len(), records.len() - 1);
    }

    #[test]
    fn bearing_plate_goes_to_bearing_table() {
        assert_eq!(table_subset("3#支座板"), Some(TableSubset::BearingSystem));
        assert_eq!(table_subset("3#防落梁块"), Some(TableSubset::BearingSystem));
        assert_eq!(table_subset("4#梁"), Some(TableSubset::Structural));
        assert_eq!(table_subset("3#未知构件"), None);
        assert_eq!(table_subset("梁体"), None);
    }

    #[test]
    fn tallies_count_distinct_observations() {
        let entries = dedup(&sample());
        let bolts = defect_tallies(&entries, ComponentTag::AntiFallBlock);
        assert_eq!(bolts, vec![("螺栓锈蚀".to_string(), 3)]);
        let piers = defect_tallies(&entries, ComponentTag::Pier);
        assert_eq!(piers, vec![("墩台破损".to_string(), 1)]);
    }

    #[test]
    fn summary_accounts_for_every_record() {
        let s = generate_summary(&sample());
        assert_eq!(s.total_records, 7);
        assert_eq!(s.structural_records + s.bearing_records + s.unrouted_records, 7);
        assert_eq!(s.unrouted_records, 1);
        assert_eq!(s.piers, ["HC-00", "HC-01", "HC-02"]);
    }

    #[test]
    fn sheet_statistics_text() {
        let mut records = sample();
        records.truncate(3);
        records.push(NormalizedRecord {
            sheet: "S2".to_string(),
            ..rec("HC-05", "刻度模糊", "左侧")
        });
        let text = sheet_statistics(&records);
        assert_eq!(
            text,
            "Sheet: S1\n桥墩及墩台共发现缺陷2处，其中墩台破损_2处。\n防落梁块共发现缺陷1处，其中螺栓锈蚀_1处。\n\n\
             Sheet: S2\n球形支座共发现缺陷1处，其中刻度模糊_1处。"
        );
    }
}
