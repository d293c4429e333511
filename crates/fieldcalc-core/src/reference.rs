//! Field reference extraction
//!
//! A field reference is `[Name]`: an opening bracket, one or more characters that are
//! not `]`, and a closing bracket. Brackets do not nest.

use lazy_regex::regex;
use std::collections::HashSet;

/// Field names referenced by an expression, in order of appearance
///
/// Duplicates are kept: `[a]+[a]*[b]` yields `["a", "a", "b"]`.
pub fn extract_field_references(expression: &str) -> Vec<String> {
    regex!(r"\[([^\]]+)\]")
        .captures_iter(expression)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Field names referenced by an expression, first appearance only
pub fn extract_unique_field_references(expression: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_field_references(expression)
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
