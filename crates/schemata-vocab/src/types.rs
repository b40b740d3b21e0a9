//! Vocabulary types and properties.

use schemata_core::FieldKind;
use serde::{Deserialize, Serialize};

/// A vocabulary type (e.g. `Event`, `Place`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyType {
    /// Identifier (local name, e.g. `Event`).
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Description.
    #[serde(default)]
    pub comment: String,
    /// Direct supertypes, in declaration order.
    #[serde(default)]
    pub supertypes: Vec<String>,
    /// Properties applicable directly to this type, in declaration order.
    #[serde(default)]
    pub properties: Vec<String>,
}

impl VocabularyType {
    /// Create a type with no supertypes or properties.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            comment: String::new(),
            supertypes: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Set direct supertypes.
    pub fn with_supertypes<I, S>(mut self, supertypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supertypes = supertypes.into_iter().map(Into::into).collect();
        self
    }

    /// Set directly applicable properties.
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this type has no supertypes.
    pub fn is_root(&self) -> bool {
        self.supertypes.is_empty()
    }
}

/// A vocabulary property (e.g. `name`, `location`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyProperty {
    /// Identifier (local name, e.g. `location`).
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Description.
    #[serde(default)]
    pub comment: String,
    /// Types that may declare this property.
    #[serde(default)]
    pub domain_includes: Vec<String>,
    /// Kinds of value this property may hold.
    #[serde(default)]
    pub range_includes: Vec<String>,
    /// Whether the property holds several values.
    #[serde(default)]
    pub multi_valued: bool,
}

impl VocabularyProperty {
    /// Create a property with no domain or range.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            comment: String::new(),
            domain_includes: Vec::new(),
            range_includes: Vec::new(),
            multi_valued: false,
        }
    }

    /// Set `domainIncludes`.
    pub fn with_domain<I, S>(mut self, domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_includes = domain.into_iter().map(Into::into).collect();
        self
    }

    /// Set `rangeIncludes`.
    pub fn with_range<I, S>(mut self, range: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.range_includes = range.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the property as multi-valued.
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Range entries that point at vocabulary types rather than primitives.
    pub fn reference_ranges(&self) -> impl Iterator<Item = &str> {
        self.range_includes
            .iter()
            .map(String::as_str)
            .filter(|r| primitive_kinds(r).is_none())
    }
}

/// Field kinds that can store a primitive range, or `None` if `range` is
/// not a primitive data type.
pub fn primitive_kinds(range: &str) -> Option<&'static [FieldKind]> {
    const TEXT: &[FieldKind] = &[FieldKind::PlainText, FieldKind::LongText];
    const NUMBER: &[FieldKind] = &[FieldKind::Integer, FieldKind::Decimal];
    const INTEGER: &[FieldKind] = &[FieldKind::Integer];
    const DECIMAL: &[FieldKind] = &[FieldKind::Decimal];
    const BOOLEAN: &[FieldKind] = &[FieldKind::Boolean];
    const DATETIME: &[FieldKind] = &[FieldKind::DateTime];

    match range {
        "Text" | "URL" | "CssSelectorType" | "XPathType" | "PronounceableText" => Some(TEXT),
        "Number" => Some(NUMBER),
        "Integer" => Some(INTEGER),
        "Float" => Some(DECIMAL),
        "Boolean" => Some(BOOLEAN),
        "Date" | "DateTime" | "Time" => Some(DATETIME),
        _ => None,
    }
}

/// Whether `range` names a primitive data type.
pub fn is_primitive(range: &str) -> bool {
    primitive_kinds(range).is_some()
}
