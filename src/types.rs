use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// One input row as read from a workbook sheet. Missing cells are empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub pier_code: String,
    pub defect_type: String,
    pub location_text: String,
    pub sheet_name: String,
}

/// Closed set of bridge components a defect can be recorded against.
///
/// `ALL` lists the tags in statistics output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentTag {
    Pier,
    Girder,
    Plinth,
    BearingPlate,
    AntiFallBlock,
    SphericalBearing,
    Unknown,
}

impl ComponentTag {
    pub const ALL: [ComponentTag; 7] = [
        ComponentTag::Girder,
        ComponentTag::Pier,
        ComponentTag::Plinth,
        ComponentTag::BearingPlate,
        ComponentTag::AntiFallBlock,
        ComponentTag::SphericalBearing,
        ComponentTag::Unknown,
    ];

    /// Label used after the `#` in a component designation, e.g. `3#垫石`.
    pub fn label(self) -> &'static str {
        match self {
            ComponentTag::Pier => "墩",
            ComponentTag::Girder => "梁",
            ComponentTag::Plinth => "垫石",
            ComponentTag::BearingPlate => "支座板",
            ComponentTag::AntiFallBlock => "防落梁块",
            ComponentTag::SphericalBearing => "支座",
            ComponentTag::Unknown => "未知构件",
        }
    }

    /// Category heading used in statistics and narrative text.
    pub fn category(self) -> &'static str {
        match self {
            ComponentTag::Pier => "桥墩及墩台",
            ComponentTag::Girder => "梁体",
            ComponentTag::Plinth => "垫石",
            ComponentTag::BearingPlate => "支座板",
            ComponentTag::AntiFallBlock => "防落梁块",
            ComponentTag::SphericalBearing => "球形支座",
            ComponentTag::Unknown => "未知构件",
        }
    }

    /// Recover the tag from a component designation such as `0#墩`.
    ///
    /// Whatever follows the first `#` must be an exact label; anything else
    /// (including designations without `#`) is `Unknown`.
    pub fn from_component(component: &str) -> ComponentTag {
        let Some((_, label)) = component.split_once('#') else {
            return ComponentTag::Unknown;
        };
        let label = label.trim();
        ComponentTag::ALL
            .into_iter()
            .find(|tag| tag.label() == label)
            .unwrap_or(ComponentTag::Unknown)
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical five-field defect record. One per [`RawRow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct NormalizedRecord {
    #[serde(rename = "桥墩")]
    #[tabled(rename = "桥墩")]
    pub pier: String,
    #[serde(rename = "构件")]
    #[tabled(rename = "构件")]
    pub component: String,
    #[serde(rename = "部位")]
    #[tabled(rename = "部位")]
    pub position: String,
    #[serde(rename = "缺陷类型")]
    #[tabled(rename = "缺陷类型")]
    pub defect_type: String,
    #[serde(rename = "现场照片")]
    #[tabled(rename = "现场照片")]
    pub photo: String,
    #[serde(skip, default = "unknown_tag")]
    #[tabled(skip)]
    pub tag: ComponentTag,
    #[serde(skip)]
    #[tabled(skip)]
    pub sheet: String,
}

fn unknown_tag() -> ComponentTag {
    ComponentTag::Unknown
}

impl NormalizedRecord {
    /// Build a record from the five display fields, recovering the tag from
    /// the component designation.
    pub fn from_fields(fields: [String; 5], sheet: &str) -> Self {
        let [pier, component, position, defect_type, photo] = fields;
        let tag = ComponentTag::from_component(&component);
        NormalizedRecord {
            pier,
            component,
            position,
            defect_type,
            photo,
            tag,
            sheet: sheet.to_string(),
        }
    }

    /// The five display fields in table column order.
    pub fn display_fields(&self) -> [String; 5] {
        [
            self.pier.clone(),
            self.component.clone(),
            self.position.clone(),
            self.defect_type.clone(),
            self.photo.clone(),
        ]
    }
}

/// Identity of one physical observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub pier: String,
    pub position: String,
    pub defect_type: String,
}

/// A deduplicated observation together with the number of rows it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectEntry {
    pub record: NormalizedRecord,
    pub count: usize,
}

/// Which generated table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableSubset {
    Structural,
    BearingSystem,
}

/// Records split by target table. Order inside each subset follows input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedTables {
    pub structural: Vec<NormalizedRecord>,
    pub bearing: Vec<NormalizedRecord>,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct CategoryCountRow {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Records")]
    #[tabled(rename = "Records")]
    pub records: usize,
    #[serde(rename = "DistinctDefects")]
    #[tabled(rename = "DistinctDefects")]
    pub distinct: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SummaryStats {
    pub total_records: usize,
    pub deduplicated_entries: usize,
    pub structural_records: usize,
    pub bearing_records: usize,
    pub unrouted_records: usize,
    pub piers: Vec<String>,
    pub categories: Vec<CategoryCountRow>,
}
