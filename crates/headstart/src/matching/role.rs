use std::collections::BTreeSet;

use super::taxonomy::{is_business_skill, is_dev_skill, DESIGN_SKILL};
use crate::profiles::domain::Role;

/// Suggest a role from a skill selection. First matching rule wins.
///
/// The result is advisory: a role the member picked explicitly is stored as-is and
/// never re-derived on save.
pub fn determine_role<S: AsRef<str>>(skills: &[S]) -> Role {
    let selected: BTreeSet<&str> = skills.iter().map(AsRef::as_ref).collect();

    let dev = selected.iter().filter(|skill| is_dev_skill(skill)).count();
    let business = selected
        .iter()
        .filter(|skill| is_business_skill(skill))
        .count();
    let has_design = selected.contains(DESIGN_SKILL);

    if dev >= 2 && business >= 2 {
        Role::TechnicalProjectManager
    } else if dev >= 2 && has_design && dev <= 3 {
        Role::Designer
    } else if dev > business {
        Role::Developer
    } else if business >= 1 {
        Role::ProjectManager
    } else {
        Role::Undecided
    }
}
