//! Dependency tracking between computed fields
//!
//! A formula `target = f([a], [b])` makes `target` depend on `a` and `b`. The graph is
//! used for admin-time diagnostics (cycles) and to tell a form which computed fields
//! a change can reach. Live evaluation itself runs formulas in stored order.

use ahash::{AHashMap, AHashSet};
use fieldcalc_core::Formula;

/// Dependency graph for department fields, keyed by field name
#[derive(Debug, Default)]
pub struct FieldDependencyGraph {
    /// Field → fields computed from it (dependents)
    dependents: AHashMap<String, AHashSet<String>>,
    /// Field → fields it is computed from (precedents)
    precedents: AHashMap<String, AHashSet<String>>,
}

impl FieldDependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a set of formulas
    pub fn from_formulas<'a, I>(formulas: I) -> Self
    where
        I: IntoIterator<Item = &'a Formula>,
    {
        let mut graph = Self::new();
        for formula in formulas {
            for reference in formula.field_references() {
                graph.add_dependency(&reference, formula.target_field());
            }
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: &str, dependent: &str) {
        self.dependents
            .entry(precedent.to_string())
            .or_default()
            .insert(dependent.to_string());
        self.precedents
            .entry(dependent.to_string())
            .or_default()
            .insert(precedent.to_string());
    }

    /// Fields computed directly from the given field, sorted by name
    pub fn dependents(&self, field: &str) -> Vec<&str> {
        sorted(self.dependents.get(field))
    }

    /// Fields the given field is computed from, sorted by name
    pub fn precedents(&self, field: &str) -> Vec<&str> {
        sorted(self.precedents.get(field))
    }

    /// Every field reachable from the changed fields, precedents before dependents
    ///
    /// The changed fields themselves are included. Cycles are cut where they close.
    pub fn recalc_order(&self, changed: &[&str]) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for field in changed {
            self.topological_sort(field, &mut result, &mut visited, &mut in_stack);
        }

        result.reverse();
        result
    }

    /// Topological sort helper (DFS, post-order)
    fn topological_sort<'a>(
        &'a self,
        field: &'a str,
        result: &mut Vec<String>,
        visited: &mut AHashSet<&'a str>,
        in_stack: &mut AHashSet<&'a str>,
    ) {
        if visited.contains(field) || in_stack.contains(field) {
            return;
        }

        in_stack.insert(field);

        // Visit all dependents first
        for dependent in self.dependents(field).into_iter().rev() {
            self.topological_sort(dependent, result, visited, in_stack);
        }

        in_stack.remove(field);
        visited.insert(field);
        result.push(field.to_string());
    }

    /// Detect circular references involving a field
    pub fn has_circular_reference(&self, field: &str) -> bool {
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();
        self.detect_cycle(field, &mut visited, &mut in_stack)
    }

    fn detect_cycle<'a>(
        &'a self,
        field: &'a str,
        visited: &mut AHashSet<&'a str>,
        in_stack: &mut AHashSet<&'a str>,
    ) -> bool {
        if in_stack.contains(field) {
            return true;
        }
        if visited.contains(field) {
            return false;
        }

        visited.insert(field);
        in_stack.insert(field);

        if let Some(precedents) = self.precedents.get(field) {
            for precedent in precedents {
                if self.detect_cycle(precedent, visited, in_stack) {
                    return true;
                }
            }
        }

        in_stack.remove(field);
        false
    }

    /// Fields whose computation depends on themselves, sorted by name
    pub fn circular_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .precedents
            .keys()
            .filter(|field| self.reaches(field, field))
            .cloned()
            .collect();
        fields.sort();
        fields
    }

    /// Whether `to` is computed (transitively) from `from`
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack: Vec<&str> = self.dependents(from);
        let mut seen = AHashSet::new();
        while let Some(field) = stack.pop() {
            if field == to {
                return true;
            }
            if seen.insert(field) {
                stack.extend(self.dependents(field));
            }
        }
        false
    }
}

fn sorted(set: Option<&AHashSet<String>>) -> Vec<&str> {
    let mut fields: Vec<&str> = set
        .into_iter()
        .flat_map(|s| s.iter().map(String::as_str))
        .collect();
    fields.sort_unstable();
    fields
}
