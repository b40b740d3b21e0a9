//! Structured document model.
//!
//! A [`StructuredDocument`] is built per request and rendered to JSON-LD.
//! Property order is preserved exactly as built.

use indexmap::IndexMap;
use schemata_core::RecordId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A value under a node property.
#[derive(Clone, Debug, PartialEq)]
pub enum DocValue {
    /// A JSON scalar.
    Scalar(Value),
    /// An embedded node.
    Node(Box<Node>),
    /// An identity-only reference.
    Reference(String),
    /// Several values.
    List(Vec<DocValue>),
}

impl DocValue {
    fn to_json(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Node(node) => Value::Object(node.to_json_map()),
            Self::Reference(id) => {
                let mut map = Map::new();
                map.insert("@id".to_string(), Value::String(id.clone()));
                Value::Object(map)
            }
            Self::List(values) => Value::Array(values.iter().map(DocValue::to_json).collect()),
        }
    }
}

/// A typed node with an identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Vocabulary type label.
    pub type_label: String,
    /// Identity IRI.
    pub id: String,
    /// Properties in emission order.
    pub properties: IndexMap<String, DocValue>,
}

impl Node {
    /// Create a node without properties.
    pub fn new(type_label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_label: type_label.into(),
            id: id.into(),
            properties: IndexMap::new(),
        }
    }

    /// Look up a property.
    pub fn get(&self, property: &str) -> Option<&DocValue> {
        self.properties.get(property)
    }

    fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("@type".to_string(), Value::String(self.type_label.clone()));
        map.insert("@id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.to_json());
        }
        map
    }
}

/// A document rooted at one record.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredDocument {
    /// The `@context` value.
    pub context: String,
    /// The root node.
    pub root: Node,
    /// Every record looked up while building, root included, with the
    /// revision read (`None` for a reference to a missing record).
    pub dependencies: BTreeMap<RecordId, Option<u64>>,
}

impl StructuredDocument {
    /// Render as a JSON-LD object.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("@context".to_string(), Value::String(self.context.clone()));
        map.extend(self.root.to_json_map());
        Value::Object(map)
    }

    /// Render as a JSON-LD string.
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Render as an indented JSON-LD string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_else(|_| self.to_json_string())
    }
}
