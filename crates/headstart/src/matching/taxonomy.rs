use serde::Serialize;

pub const DEV_SKILLS: [&str; 6] = [
    "Web Development",
    "Mobile Development",
    "UI/UX Design",
    "Server-side Architecture",
    "API Development",
    "Cloud Infrastructure",
];

pub const BUSINESS_SKILLS: [&str; 6] = [
    "Data Analytics",
    "Finances",
    "Market Research",
    "Sales/Marketing",
    "Product Strategy",
    "Operations Management",
];

pub const DESIGN_SKILL: &str = "UI/UX Design";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Development,
    Business,
}

pub fn is_dev_skill(skill: &str) -> bool {
    DEV_SKILLS.contains(&skill)
}

pub fn is_business_skill(skill: &str) -> bool {
    BUSINESS_SKILLS.contains(&skill)
}

/// Category tag for UI grouping; free-form skills have none.
pub fn category_of(skill: &str) -> Option<SkillCategory> {
    if is_dev_skill(skill) {
        Some(SkillCategory::Development)
    } else if is_business_skill(skill) {
        Some(SkillCategory::Business)
    } else {
        None
    }
}
