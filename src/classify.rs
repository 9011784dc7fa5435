// Defect-type → component classification.
//
// The rule table is a priority list: keywords overlap ("梁体螺栓松脱" hits both
// 梁体 and 螺栓), so the first matching row decides. Keep the order as is.
use crate::types::ComponentTag;

pub const COMPONENT_RULES: &[(&str, ComponentTag)] = &[
    ("桥墩", ComponentTag::Pier),
    ("垃圾残留", ComponentTag::Pier),
    ("墩台", ComponentTag::Pier),
    ("落水管", ComponentTag::Pier),
    ("梁体", ComponentTag::Girder),
    ("垫石", ComponentTag::Plinth),
    ("环氧砂浆", ComponentTag::Plinth),
    ("涂装漆", ComponentTag::Plinth),
    ("麻面", ComponentTag::Plinth),
    ("支座板", ComponentTag::BearingPlate),
    ("连接件", ComponentTag::BearingPlate),
    ("螺栓", ComponentTag::AntiFallBlock),
    ("防滑块", ComponentTag::AntiFallBlock),
    ("梁块", ComponentTag::AntiFallBlock),
    ("预埋件", ComponentTag::AntiFallBlock),
    ("球形支座", ComponentTag::SphericalBearing),
    ("防尘围挡", ComponentTag::SphericalBearing),
    ("刻度", ComponentTag::SphericalBearing),
    ("缺棱断角", ComponentTag::Plinth),
    ("破损", ComponentTag::Plinth),
    ("掉角", ComponentTag::Plinth),
];

/// Classify a free-text defect type. Empty or unmatched input is `Unknown`.
pub fn classify_defect(defect_type: &str) -> ComponentTag {
    COMPONENT_RULES
        .iter()
        .find(|(keyword, _)| defect_type.contains(keyword))
        .map(|(_, tag)| *tag)
        .unwrap_or(ComponentTag::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        // 梁体 precedes 麻面 and 螺栓
        assert_eq!(classify_defect("梁体麻面"), ComponentTag::Girder);
        assert_eq!(classify_defect("梁体螺栓松脱"), ComponentTag::Girder);
        // 墩台 precedes 破损
        assert_eq!(classify_defect("墩台破损"), ComponentTag::Pier);
        // 支座板 precedes 螺栓
        assert_eq!(classify_defect("上支座板螺栓锈蚀"), ComponentTag::BearingPlate);
    }

    #[test]
    fn bolts_go_to_anti_fall_block() {
        assert_eq!(classify_defect("螺栓锈蚀"), ComponentTag::AntiFallBlock);
        assert_eq!(classify_defect("梁块螺栓缺失"), ComponentTag::AntiFallBlock);
    }

    #[test]
    fn generic_breakage_falls_to_plinth() {
        assert_eq!(classify_defect("上支座板破损"), ComponentTag::BearingPlate);
        assert_eq!(classify_defect("防尘围挡破损"), ComponentTag::SphericalBearing);
        assert_eq!(classify_defect("表面破损"), ComponentTag::Plinth);
        assert_eq!(classify_defect("缺棱断角"), ComponentTag::Plinth);
    }

    #[test]
    fn spherical_bearing_keywords() {
        assert_eq!(classify_defect("刻度模糊"), ComponentTag::SphericalBearing);
        assert_eq!(classify_defect("防尘围挡翻起"), ComponentTag::SphericalBearing);
    }

    #[test]
    fn unmatched_and_empty_are_unknown() {
        assert_eq!(classify_defect(""), ComponentTag::Unknown);
        assert_eq!(classify_defect("异物"), ComponentTag::Unknown);
    }
}
