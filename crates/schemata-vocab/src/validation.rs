//! Catalog validation and integrity checking.
//!
//! Runs over the raw type and property declarations before the graph is
//! built. Errors make the catalog unusable (cycles, dangling supertypes,
//! duplicates); warnings flag entries that are dropped during the build
//! (range, domain or property references to nothing).

use crate::types::{VocabularyProperty, VocabularyType, is_primitive};
use petgraph::graph::{DiGraph, NodeIndex};
use schemata_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Types
// ============================================================================

/// Result of catalog validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the catalog is usable (no errors).
    pub valid: bool,
    /// Issues that prevent loading.
    pub errors: Vec<ValidationIssue>,
    /// Issues that are logged and skipped.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error (marks catalog as invalid).
    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Add a warning.
    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Total issue count (errors + warnings).
    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Log warnings and turn errors into a `VocabularyLoad` error.
    pub fn into_result(self) -> Result<()> {
        for warning in &self.warnings {
            log::warn!(
                "vocabulary [{}]: {} ({})",
                warning.code,
                warning.message,
                warning.subjects.join(", ")
            );
        }
        if self.valid {
            return Ok(());
        }
        let summary = self
            .errors
            .iter()
            .map(|e| {
                if e.subjects.is_empty() {
                    format!("[{}] {}", e.code, e.message)
                } else {
                    format!("[{}] {}: {}", e.code, e.message, e.subjects.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::vocabulary(summary))
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A validation issue found in the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue type/code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Affected identifiers or edges.
    pub subjects: Vec<String>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            subjects: Vec::new(),
        }
    }

    /// Attach affected identifiers.
    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate raw catalog declarations.
///
/// Errors:
/// - `EMPTY_IDENTIFIER`: a type or property has no id
/// - `DUPLICATE_TYPE` / `DUPLICATE_PROPERTY`: an id is declared twice
/// - `UNKNOWN_SUPERTYPE`: a supertype is not declared
/// - `SUPERTYPE_CYCLE`: the supertype graph is not acyclic
///
/// Warnings:
/// - `UNKNOWN_RANGE`: a range is neither primitive nor a declared type
/// - `UNKNOWN_DOMAIN`: a domain is not a declared type
/// - `UNKNOWN_TYPE_PROPERTY`: a type lists an undeclared property
pub fn validate_catalog(
    types: &[VocabularyType],
    properties: &[VocabularyProperty],
) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_empty_identifiers(types, properties, &mut result);
    check_duplicates(types, properties, &mut result);
    check_unknown_supertypes(types, &mut result);
    check_supertype_cycles(types, &mut result);
    check_references(types, properties, &mut result);

    result
}

/// Quick check if a catalog has any validation errors.
pub fn is_valid(types: &[VocabularyType], properties: &[VocabularyProperty]) -> bool {
    validate_catalog(types, properties).valid
}

// ============================================================================
// Individual checks
// ============================================================================

fn check_empty_identifiers(
    types: &[VocabularyType],
    properties: &[VocabularyProperty],
    result: &mut ValidationResult,
) {
    let empty_types = types.iter().filter(|t| t.id.trim().is_empty()).count();
    let empty_props = properties.iter().filter(|p| p.id.trim().is_empty()).count();

    if empty_types + empty_props > 0 {
        result.add_error(ValidationIssue::new(
            "EMPTY_IDENTIFIER",
            format!("{empty_types} type(s) and {empty_props} property(ies) have no id"),
        ));
    }
}

fn check_duplicates(
    types: &[VocabularyType],
    properties: &[VocabularyProperty],
    result: &mut ValidationResult,
) {
    let duplicates = |ids: Vec<&str>| -> Vec<String> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter(|id| !seen.insert(*id))
            .map(String::from)
            .collect()
    };

    let dup_types = duplicates(types.iter().map(|t| t.id.as_str()).collect());
    if !dup_types.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "DUPLICATE_TYPE",
                format!("{} type id(s) declared more than once", dup_types.len()),
            )
            .with_subjects(dup_types),
        );
    }

    let dup_props = duplicates(properties.iter().map(|p| p.id.as_str()).collect());
    if !dup_props.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "DUPLICATE_PROPERTY",
                format!("{} property id(s) declared more than once", dup_props.len()),
            )
            .with_subjects(dup_props),
        );
    }
}

fn check_unknown_supertypes(types: &[VocabularyType], result: &mut ValidationResult) {
    let known: HashSet<&str> = types.iter().map(|t| t.id.as_str()).collect();
    let dangling: Vec<String> = types
        .iter()
        .flat_map(|t| {
            t.supertypes
                .iter()
                .filter(|s| !known.contains(s.as_str()))
                .map(move |s| format!("{} -> {}", t.id, s))
        })
        .collect();

    if !dangling.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "UNKNOWN_SUPERTYPE",
                format!("{} supertype reference(s) point to undeclared types", dangling.len()),
            )
            .with_subjects(dangling),
        );
    }
}

/// Check for cycles in supertype relationships, self-loops included.
fn check_supertype_cycles(types: &[VocabularyType], result: &mut ValidationResult) {
    use petgraph::algo::tarjan_scc;

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for t in types {
        indices
            .entry(t.id.as_str())
            .or_insert_with(|| graph.add_node(t.id.as_str()));
    }

    let mut self_loops = Vec::new();
    for t in types {
        for parent in &t.supertypes {
            if parent == &t.id {
                self_loops.push(t.id.clone());
            }
            if let (Some(&from), Some(&to)) =
                (indices.get(t.id.as_str()), indices.get(parent.as_str()))
            {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut cyclic: Vec<String> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .flat_map(|scc| scc.into_iter().map(|idx| graph[idx].to_string()))
        .collect();
    cyclic.extend(self_loops);
    cyclic.sort();
    cyclic.dedup();

    if !cyclic.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "SUPERTYPE_CYCLE",
                "Cycle detected in supertype relationships",
            )
            .with_subjects(cyclic),
        );
    }
}

fn check_references(
    types: &[VocabularyType],
    properties: &[VocabularyProperty],
    result: &mut ValidationResult,
) {
    let known_types: HashSet<&str> = types.iter().map(|t| t.id.as_str()).collect();
    let known_props: HashSet<&str> = properties.iter().map(|p| p.id.as_str()).collect();

    let mut unknown_ranges = Vec::new();
    let mut unknown_domains = Vec::new();
    for prop in properties {
        for range in &prop.range_includes {
            if !is_primitive(range) && !known_types.contains(range.as_str()) {
                unknown_ranges.push(format!("{}: {}", prop.id, range));
            }
        }
        for domain in &prop.domain_includes {
            if !known_types.contains(domain.as_str()) {
                unknown_domains.push(format!("{}: {}", prop.id, domain));
            }
        }
    }

    let unknown_type_props: Vec<String> = types
        .iter()
        .flat_map(|t| {
            t.properties
                .iter()
                .filter(|p| !known_props.contains(p.as_str()))
                .map(move |p| format!("{}: {}", t.id, p))
        })
        .collect();

    if !unknown_ranges.is_empty() {
        result.add_warning(
            ValidationIssue::new(
                "UNKNOWN_RANGE",
                format!("{} range entry(ies) dropped", unknown_ranges.len()),
            )
            .with_subjects(unknown_ranges),
        );
    }
    if !unknown_domains.is_empty() {
        result.add_warning(
            ValidationIssue::new(
                "UNKNOWN_DOMAIN",
                format!("{} domain entry(ies) dropped", unknown_domains.len()),
            )
            .with_subjects(unknown_domains),
        );
    }
    if !unknown_type_props.is_empty() {
        result.add_warning(
            ValidationIssue::new(
                "UNKNOWN_TYPE_PROPERTY",
                format!("{} type property entry(ies) dropped", unknown_type_props.len()),
            )
            .with_subjects(unknown_type_props),
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_catalog() -> (Vec<VocabularyType>, Vec<VocabularyProperty>) {
        let types = vec![
            VocabularyType::new("Thing").with_properties(["name"]),
            VocabularyType::new("Place").with_supertypes(["Thing"]),
            VocabularyType::new("Event").with_supertypes(["Thing"]),
        ];
        let properties = vec![
            VocabularyProperty::new("name").with_range(["Text"]),
            VocabularyProperty::new("location")
                .with_domain(["Event"])
                .with_range(["Place", "Text"]),
        ];
        (types, properties)
    }

    // ------------------------------------------------------------------------
    // Full validation
    // ------------------------------------------------------------------------

    #[test]
    fn test_validate_valid_catalog() {
        let (types, properties) = valid_catalog();
        let result = validate_catalog(&types, &properties);

        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert!(is_valid(&types, &properties));
    }

    #[test]
    fn test_validate_empty_catalog() {
        let result = validate_catalog(&[], &[]);
        assert!(result.valid);
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    #[test]
    fn test_empty_identifier() {
        let types = vec![VocabularyType::new("  ")];
        let result = validate_catalog(&types, &[]);

        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.code == "EMPTY_IDENTIFIER"));
    }

    #[test]
    fn test_duplicate_type_and_property() {
        let (mut types, mut properties) = valid_catalog();
        types.push(VocabularyType::new("Event"));
        properties.push(VocabularyProperty::new("name"));

        let result = validate_catalog(&types, &properties);

        assert!(!result.valid);
        let dup_type = result.errors.iter().find(|e| e.code == "DUPLICATE_TYPE").unwrap();
        assert_eq!(dup_type.subjects, vec!["Event".to_string()]);
        assert!(result.errors.iter().any(|e| e.code == "DUPLICATE_PROPERTY"));
    }

    #[test]
    fn test_unknown_supertype() {
        let types = vec![VocabularyType::new("Event").with_supertypes(["Thing"])];
        let result = validate_catalog(&types, &[]);

        assert!(!result.valid);
        let issue = result.errors.iter().find(|e| e.code == "UNKNOWN_SUPERTYPE").unwrap();
        assert_eq!(issue.subjects, vec!["Event -> Thing".to_string()]);
    }

    #[test]
    fn test_supertype_cycle() {
        let types = vec![
            VocabularyType::new("A").with_supertypes(["C"]),
            VocabularyType::new("B").with_supertypes(["A"]),
            VocabularyType::new("C").with_supertypes(["B"]),
            VocabularyType::new("D").with_supertypes(["A"]),
        ];
        let result = validate_catalog(&types, &[]);

        assert!(!result.valid);
        let issue = result.errors.iter().find(|e| e.code == "SUPERTYPE_CYCLE").unwrap();
        assert_eq!(issue.subjects, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_supertype_self_loop() {
        let types = vec![VocabularyType::new("A").with_supertypes(["A"])];
        let result = validate_catalog(&types, &[]);

        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.code == "SUPERTYPE_CYCLE"));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let types = vec![
            VocabularyType::new("Thing"),
            VocabularyType::new("Place").with_supertypes(["Thing"]),
            VocabularyType::new("Organization").with_supertypes(["Thing"]),
            VocabularyType::new("LocalBusiness").with_supertypes(["Place", "Organization"]),
        ];
        assert!(is_valid(&types, &[]));
    }

    // ------------------------------------------------------------------------
    // Warnings
    // ------------------------------------------------------------------------

    #[test]
    fn test_unknown_references_are_warnings() {
        let types = vec![VocabularyType::new("Thing").with_properties(["ghost"])];
        let properties = vec![
            VocabularyProperty::new("name")
                .with_domain(["Nowhere"])
                .with_range(["Text", "Mystery"]),
        ];
        let result = validate_catalog(&types, &properties);

        assert!(result.valid);
        let codes: Vec<&str> = result.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["UNKNOWN_RANGE", "UNKNOWN_DOMAIN", "UNKNOWN_TYPE_PROPERTY"]);
        assert_eq!(result.total_issues(), 3);
    }

    // ------------------------------------------------------------------------
    // into_result
    // ------------------------------------------------------------------------

    #[test]
    fn test_into_result_ok_with_warnings() {
        let mut result = ValidationResult::new();
        result.add_warning(ValidationIssue::new("W", "warning"));
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn test_into_result_error_summary() {
        let mut result = ValidationResult::new();
        result.add_error(
            ValidationIssue::new("SUPERTYPE_CYCLE", "cycle").with_subjects(vec!["A".into()]),
        );
        let err = result.into_result().unwrap_err();
        assert!(matches!(err, Error::VocabularyLoad(_)));
        assert!(err.to_string().contains("[SUPERTYPE_CYCLE] cycle: A"));
    }

    #[test]
    fn test_validation_result_serialization() {
        let mut result = ValidationResult::new();
        result.add_error(ValidationIssue::new("ERR", "error"));
        result.add_warning(ValidationIssue::new("WARN", "warning"));

        let json = serde_json::to_string(&result).unwrap();
        let parsed: ValidationResult = serde_json::from_str(&json).unwrap();

        assert!(!parsed.valid);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.warnings.len(), 1);
    }
}
