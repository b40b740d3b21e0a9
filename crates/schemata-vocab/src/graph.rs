//! The indexed vocabulary graph.
//!
//! [`VocabularyGraph`] is an immutable snapshot: types and properties indexed
//! by id, plus a petgraph `DiGraph` of subtype → supertype edges. It is
//! produced by [`VocabularyBuilder::build`], which validates the raw
//! declarations first and refuses cyclic or dangling catalogs.

use crate::types::{VocabularyProperty, VocabularyType, primitive_kinds};
use crate::validation::validate_catalog;
use indexmap::{IndexMap, IndexSet};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use schemata_core::{Error, FieldKind, Result};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Builder
// ============================================================================

/// Collects raw declarations and builds a validated [`VocabularyGraph`].
#[derive(Clone, Debug, Default)]
pub struct VocabularyBuilder {
    types: Vec<VocabularyType>,
    properties: Vec<VocabularyProperty>,
    version: Option<String>,
}

impl VocabularyBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type declaration.
    pub fn add_type(&mut self, vocab_type: VocabularyType) -> &mut Self {
        self.types.push(vocab_type);
        self
    }

    /// Add a property declaration.
    pub fn add_property(&mut self, property: VocabularyProperty) -> &mut Self {
        self.properties.push(property);
        self
    }

    /// Builder-style type declaration.
    pub fn with_type(mut self, vocab_type: VocabularyType) -> Self {
        self.types.push(vocab_type);
        self
    }

    /// Builder-style property declaration.
    pub fn with_property(mut self, property: VocabularyProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Tag the vocabulary with a release version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Validate and build the graph.
    ///
    /// Fails with [`Error::VocabularyLoad`] on cycles, duplicates or
    /// dangling supertypes. Range, domain and type-property entries that
    /// reference nothing are dropped with a warning.
    pub fn build(self) -> Result<VocabularyGraph> {
        validate_catalog(&self.types, &self.properties).into_result()?;

        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut types: IndexMap<String, VocabularyType> = IndexMap::new();

        for t in &self.types {
            node_indices.insert(t.id.clone(), graph.add_node(t.id.clone()));
        }

        let mut properties: IndexMap<String, VocabularyProperty> = IndexMap::new();
        for mut prop in self.properties {
            prop.range_includes
                .retain(|r| primitive_kinds(r).is_some() || node_indices.contains_key(r));
            prop.domain_includes
                .retain(|d| node_indices.contains_key(d));
            properties.insert(prop.id.clone(), prop);
        }

        // Own properties: the type's declared list, then every property
        // whose domain names the type, in property declaration order.
        for mut t in self.types {
            let mut own: IndexSet<String> = t
                .properties
                .iter()
                .filter(|p| properties.contains_key(p.as_str()))
                .cloned()
                .collect();
            for prop in properties.values() {
                if prop.domain_includes.iter().any(|d| d == &t.id) {
                    own.insert(prop.id.clone());
                }
            }
            t.properties = own.into_iter().collect();

            for parent in &t.supertypes {
                graph.add_edge(node_indices[&t.id], node_indices[parent], ());
            }
            types.insert(t.id.clone(), t);
        }

        log::debug!(
            "built vocabulary graph: {} types, {} properties",
            types.len(),
            properties.len()
        );

        Ok(VocabularyGraph {
            graph,
            node_indices,
            types,
            properties,
            version: self.version,
        })
    }
}

// ============================================================================
// Graph
// ============================================================================

/// Immutable, indexed vocabulary.
#[derive(Clone, Debug, Default)]
pub struct VocabularyGraph {
    /// Subtype → supertype edges.
    pub(crate) graph: DiGraph<String, ()>,
    pub(crate) node_indices: HashMap<String, NodeIndex>,
    types: IndexMap<String, VocabularyType>,
    properties: IndexMap<String, VocabularyProperty>,
    version: Option<String>,
}

impl VocabularyGraph {
    /// An empty vocabulary.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Release version, if the catalog declared one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Number of types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of properties.
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Iterate over types in declaration order.
    pub fn iter_types(&self) -> impl Iterator<Item = &VocabularyType> {
        self.types.values()
    }

    /// Iterate over properties in declaration order.
    pub fn iter_properties(&self) -> impl Iterator<Item = &VocabularyProperty> {
        self.properties.values()
    }

    /// Look up a type.
    pub fn get_type(&self, id: &str) -> Option<&VocabularyType> {
        self.types.get(id)
    }

    /// Look up a property.
    pub fn get_property(&self, id: &str) -> Option<&VocabularyProperty> {
        self.properties.get(id)
    }

    /// Look up a type or fail with `UnknownType`.
    pub fn require_type(&self, id: &str) -> Result<&VocabularyType> {
        self.get_type(id).ok_or_else(|| Error::unknown_type(id))
    }

    /// Look up a property or fail with `UnknownProperty`.
    pub fn require_property(&self, id: &str) -> Result<&VocabularyProperty> {
        self.get_property(id)
            .ok_or_else(|| Error::unknown_property(id, None))
    }

    fn declaration_index(&self, id: &str) -> usize {
        self.types.get_index_of(id).unwrap_or(usize::MAX)
    }

    /// Ancestors of a type, breadth-first towards the roots.
    ///
    /// Each ancestor appears once, at the level nearest the type. Within a
    /// level, ancestors follow catalog declaration order. The type itself
    /// is not included.
    pub fn ancestors_of(&self, id: &str) -> Result<Vec<&VocabularyType>> {
        let start = self.require_type(id)?;

        let mut seen: HashSet<&str> = HashSet::from([start.id.as_str()]);
        let mut level = vec![start];
        let mut ancestors = Vec::new();

        while !level.is_empty() {
            let mut next: Vec<&VocabularyType> = level
                .iter()
                .flat_map(|current| &current.supertypes)
                .filter_map(|parent_id| self.types.get(parent_id))
                .filter(|&parent| seen.insert(parent.id.as_str()))
                .collect();
            next.sort_by_key(|t| self.declaration_index(&t.id));
            ancestors.extend(next.iter().copied());
            level = next;
        }

        Ok(ancestors)
    }

    /// Transitive subtypes of a type, in declaration order.
    pub fn subtypes_of(&self, id: &str) -> Result<Vec<&VocabularyType>> {
        self.require_type(id)?;
        let start = self.node_indices[id];

        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            for child in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if seen.insert(child) {
                    stack.push(child);
                }
            }
        }
        seen.remove(&start);

        let mut subtypes: Vec<&VocabularyType> = seen
            .into_iter()
            .filter_map(|idx| self.types.get(&self.graph[idx]))
            .collect();
        subtypes.sort_by_key(|t| self.declaration_index(&t.id));
        Ok(subtypes)
    }

    /// Whether `id` is `ancestor` or one of its transitive subtypes.
    pub fn is_subtype_of(&self, id: &str, ancestor: &str) -> Result<bool> {
        if id == ancestor {
            self.require_type(id)?;
            return Ok(true);
        }
        Ok(self.ancestors_of(id)?.iter().any(|t| t.id == ancestor))
    }

    /// Own plus inherited properties of a type.
    ///
    /// Own properties come first, then each ancestor's in
    /// [`ancestors_of`](Self::ancestors_of) order; each property appears once.
    pub fn effective_properties_of(&self, id: &str) -> Result<Vec<&VocabularyProperty>> {
        let start = self.require_type(id)?;
        let mut ids: IndexSet<&str> = start.properties.iter().map(String::as_str).collect();
        for ancestor in self.ancestors_of(id)? {
            ids.extend(ancestor.properties.iter().map(String::as_str));
        }
        Ok(ids
            .into_iter()
            .filter_map(|p| self.properties.get(p))
            .collect())
    }

    /// Whether a property is in a type's effective property set.
    pub fn applies_to(&self, type_id: &str, property: &str) -> Result<bool> {
        Ok(self
            .effective_properties_of(type_id)?
            .iter()
            .any(|p| p.id == property))
    }

    /// Storage kinds able to hold a property's values, default first.
    ///
    /// Derived from `rangeIncludes`: a range naming a vocabulary type
    /// yields `EntityReference`, primitive ranges yield their kinds. The
    /// list is ordered by [`FieldKind`] precedence. A property without any
    /// usable range is treated as text.
    pub fn compatible_field_kinds(&self, property: &str) -> Result<Vec<FieldKind>> {
        let prop = self.require_property(property)?;

        let mut kinds: Vec<FieldKind> = Vec::new();
        for range in &prop.range_includes {
            match primitive_kinds(range) {
                Some(primitive) => kinds.extend_from_slice(primitive),
                None if self.types.contains_key(range) => kinds.push(FieldKind::EntityReference),
                None => {}
            }
        }
        if kinds.is_empty() {
            kinds.extend_from_slice(&[FieldKind::PlainText, FieldKind::LongText]);
        }

        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }

    /// Vocabulary types a reference property may point to.
    pub fn reference_targets(&self, property: &str) -> Result<Vec<&VocabularyType>> {
        let prop = self.require_property(property)?;
        Ok(prop
            .reference_ranges()
            .filter_map(|r| self.types.get(r))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
