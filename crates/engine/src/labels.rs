//! Over-budget annotations applied to unplanned rows and stripped again when
//! a row is reconciled.

const UNPLANNED_SUFFIX: &str = " (Unplanned)";
const OVER_BUDGET_PREFIX: &str = "Over budget - ";

/// Category label for an unplanned row: `"Food (Unplanned)"`.
pub(crate) fn unplanned_label(category_name: &str) -> String {
    format!("{category_name}{UNPLANNED_SUFFIX}")
}

/// Description for an unplanned row: `"Over budget - lunch"`.
pub(crate) fn over_budget_description(description: &str) -> String {
    format!("{OVER_BUDGET_PREFIX}{description}")
}

/// Remove the over-budget prefix from a description.
pub(crate) fn strip_over_budget(description: &str) -> String {
    description
        .strip_prefix(OVER_BUDGET_PREFIX)
        .unwrap_or(description)
        .trim()
        .to_string()
}

/// Remove the unplanned marker from a category label.
///
/// A label that was nothing but the marked category name collapses to
/// `None`, so the row falls back to the plain category name.
pub(crate) fn strip_unplanned_label(label: Option<&str>, category_name: &str) -> Option<String> {
    let label = label?;
    if label == unplanned_label(category_name) {
        return None;
    }
    normalize_label(Some(label.strip_suffix(UNPLANNED_SUFFIX).unwrap_or(label)))
}

/// Trim a user-supplied label; blank labels become `None`.
pub(crate) fn normalize_label(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
