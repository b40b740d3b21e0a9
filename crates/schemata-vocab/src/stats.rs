//! Vocabulary statistics.
//!
//! Summaries of hierarchy shape and property usage, reported by
//! `schemata vocab stats`.

use crate::graph::VocabularyGraph;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Types
// ============================================================================

/// Statistics about a loaded vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabularyStats {
    /// Number of types.
    pub type_count: usize,
    /// Number of properties.
    pub property_count: usize,
    /// Number of subtype → supertype edges.
    pub inheritance_edges: usize,
    /// Types without supertypes.
    pub root_types: Vec<String>,
    /// Types without subtypes.
    pub leaf_count: usize,
    /// Longest chain from a type to a root.
    pub max_depth: usize,
    /// Properties that may reference another type.
    pub reference_properties: usize,
    /// Properties per primitive or type range.
    pub range_distribution: BTreeMap<String, usize>,
    /// Type with the most direct subtypes.
    pub widest_type: Option<(String, usize)>,
}

// ============================================================================
// Functions
// ============================================================================

/// Compute statistics for a vocabulary.
pub fn compute_stats(vocab: &VocabularyGraph) -> VocabularyStats {
    let graph = &vocab.graph;

    let root_types = vocab
        .iter_types()
        .filter(|t| t.is_root())
        .map(|t| t.id.clone())
        .collect();

    let mut leaf_count = 0;
    let mut widest_type: Option<(String, usize)> = None;
    for t in vocab.iter_types() {
        let idx = vocab.node_indices[&t.id];
        let children = graph.neighbors_directed(idx, Direction::Incoming).count();
        if children == 0 {
            leaf_count += 1;
        }
        if children > widest_type.as_ref().map_or(0, |(_, n)| *n) {
            widest_type = Some((t.id.clone(), children));
        }
    }

    let max_depth = vocab
        .iter_types()
        .map(|t| depth_of(vocab, &t.id))
        .max()
        .unwrap_or(0);

    let mut range_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut reference_properties = 0;
    for prop in vocab.iter_properties() {
        for range in &prop.range_includes {
            *range_distribution.entry(range.clone()).or_insert(0) += 1;
        }
        if prop.reference_ranges().next().is_some() {
            reference_properties += 1;
        }
    }

    VocabularyStats {
        type_count: vocab.type_count(),
        property_count: vocab.property_count(),
        inheritance_edges: graph.edge_count(),
        root_types,
        leaf_count,
        max_depth,
        reference_properties,
        range_distribution,
        widest_type,
    }
}

/// Longest supertype chain above a type.
fn depth_of(vocab: &VocabularyGraph, id: &str) -> usize {
    let Some(t) = vocab.get_type(id) else {
        return 0;
    };
    t.supertypes
        .iter()
        .map(|parent| 1 + depth_of(vocab, parent))
        .max()
        .unwrap_or(0)
}

/// One-line summary of vocabulary size.
pub fn quick_summary(vocab: &VocabularyGraph) -> String {
    format!(
        "{} types, {} properties",
        vocab.type_count(),
        vocab.property_count()
    )
}

// ============================================================================
// Tests
// ============================================================================
