//! Catalog loading.
//!
//! Reads the schema.org release CSV pair: a types file
//! (`id,label,comment,subTypeOf,...,properties`) and a properties file
//! (`id,label,comment,...,domainIncludes,rangeIncludes`). Unknown columns
//! are ignored. List cells are comma-separated and identifiers may be full
//! IRIs; both are reduced to local names.

use crate::graph::{VocabularyBuilder, VocabularyGraph};
use crate::types::{VocabularyProperty, VocabularyType};
use schemata_core::{Error, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

// ============================================================================
// Source
// ============================================================================

/// Where a vocabulary catalog comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VocabularySource {
    /// A types CSV and a properties CSV on disk.
    Files { types: PathBuf, properties: PathBuf },
    /// CSV text held in memory.
    Inline { types: String, properties: String },
}

impl VocabularySource {
    /// Source backed by two files.
    pub fn files(types: impl Into<PathBuf>, properties: impl Into<PathBuf>) -> Self {
        Self::Files {
            types: types.into(),
            properties: properties.into(),
        }
    }

    /// Source backed by in-memory CSV text.
    pub fn inline(types: impl Into<String>, properties: impl Into<String>) -> Self {
        Self::Inline {
            types: types.into(),
            properties: properties.into(),
        }
    }

    /// Release label derived from the types file name.
    ///
    /// `schemaorg-current-https-types.csv` gives `schemaorg-current-https`.
    pub fn release_label(&self) -> Option<String> {
        match self {
            Self::Files { types, .. } => {
                let stem = types.file_stem()?.to_str()?;
                Some(stem.strip_suffix("-types").unwrap_or(stem).to_string())
            }
            Self::Inline { .. } => None,
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Deserialize)]
struct TypeRow {
    id: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    comment: String,
    #[serde(default, rename = "subTypeOf")]
    sub_type_of: String,
    #[serde(default)]
    properties: String,
}

#[derive(Debug, Deserialize)]
struct PropertyRow {
    id: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    comment: String,
    #[serde(default, rename = "domainIncludes")]
    domain_includes: String,
    #[serde(default, rename = "rangeIncludes")]
    range_includes: String,
    #[serde(default, rename = "multiValued")]
    multi_valued: String,
}

impl TypeRow {
    fn into_type(self) -> VocabularyType {
        let id = local_name(&self.id);
        let mut t = VocabularyType::new(id)
            .with_supertypes(split_list(&self.sub_type_of))
            .with_properties(split_list(&self.properties));
        if !self.label.is_empty() {
            t.label = self.label;
        }
        t.comment = self.comment;
        t
    }
}

impl PropertyRow {
    fn into_property(self) -> VocabularyProperty {
        let id = local_name(&self.id);
        let mut p = VocabularyProperty::new(id)
            .with_domain(split_list(&self.domain_includes))
            .with_range(split_list(&self.range_includes));
        if !self.label.is_empty() {
            p.label = self.label;
        }
        p.comment = self.comment;
        p.multi_valued = self.multi_valued.eq_ignore_ascii_case("true");
        p
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Reduce an IRI to its local name.
///
/// `https://schema.org/Event` and `schema:Event` both give `Event`.
pub fn local_name(iri: &str) -> String {
    let iri = iri.trim();
    iri.rsplit(['/', '#', ':'])
        .next()
        .unwrap_or(iri)
        .to_string()
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(local_name)
        .collect()
}

fn read_rows<R, T>(reader: R, what: &str) -> Result<Vec<T>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    csv.deserialize()
        .map(|row| row.map_err(|e| Error::vocabulary(format!("malformed {what} catalog: {e}"))))
        .collect()
}

/// Parse a catalog from two CSV readers.
pub fn parse_catalog<T: Read, P: Read>(
    types: T,
    properties: P,
) -> Result<(Vec<VocabularyType>, Vec<VocabularyProperty>)> {
    let types = read_rows::<_, TypeRow>(types, "types")?
        .into_iter()
        .map(TypeRow::into_type)
        .collect();
    let properties = read_rows::<_, PropertyRow>(properties, "properties")?
        .into_iter()
        .map(PropertyRow::into_property)
        .collect();
    Ok((types, properties))
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| Error::io_with_path(e, path))
}

/// Load and validate a vocabulary.
pub fn load_vocabulary(source: &VocabularySource) -> Result<VocabularyGraph> {
    let (types, properties) = match source {
        VocabularySource::Files { types, properties } => {
            log::info!(
                "loading vocabulary from {} and {}",
                types.display(),
                properties.display()
            );
            parse_catalog(open(types)?, open(properties)?)?
        }
        VocabularySource::Inline { types, properties } => {
            parse_catalog(types.as_bytes(), properties.as_bytes())?
        }
    };

    let mut builder = VocabularyBuilder::new();
    for t in types {
        builder.add_type(t);
    }
    for p in properties {
        builder.add_property(p);
    }
    if let Some(label) = source.release_label() {
        builder = builder.with_version(label);
    }
    builder.build()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_core::FieldKind;
    use std::io::Write;
    use tempfile::TempDir;

    const TYPES: &str = "\
id,label,comment,subTypeOf,enumerationtype,equivalentClass,properties
https://schema.org/Thing,Thing,The most generic type.,,,,\"https://schema.org/name, https://schema.org/url\"
https://schema.org/Place,Place,Entities with a location.,https://schema.org/Thing,,,
https://schema.org/Event,Event,Something that happens.,https://schema.org/Thing,,,
";

    const PROPERTIES: &str = "\
id,label,comment,domainIncludes,rangeIncludes,multiValued
https://schema.org/name,name,The name.,,https://schema.org/Text,
https://schema.org/url,url,URL of the item.,,https://schema.org/URL,
https://schema.org/location,location,Where it happens.,https://schema.org/Event,\"https://schema.org/Place, https://schema.org/Text\",
https://schema.org/startDate,startDate,Start.,https://schema.org/Event,\"https://schema.org/Date, https://schema.org/DateTime\",false
https://schema.org/performer,performer,Who performs.,https://schema.org/Event,https://schema.org/Thing,true
";

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("https://schema.org/Event"), "Event");
        assert_eq!(local_name("schema:Event"), "Event");
        assert_eq!(local_name("http://example.com/ns#Thing"), "Thing");
        assert_eq!(local_name(" Event "), "Event");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("https://schema.org/Place, https://schema.org/Text"),
            vec!["Place", "Text"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_load_inline() {
        let graph = load_vocabulary(&VocabularySource::inline(TYPES, PROPERTIES)).unwrap();
        assert_eq!(graph.type_count(), 3);
        assert_eq!(graph.property_count(), 5);

        let thing = graph.get_type("Thing").unwrap();
        assert_eq!(thing.comment, "The most generic type.");
        assert_eq!(thing.properties, vec!["name", "url"]);

        let event = graph.get_type("Event").unwrap();
        assert_eq!(event.supertypes, vec!["Thing"]);
        assert_eq!(event.properties, vec!["location", "startDate", "performer"]);

        assert!(graph.get_property("performer").unwrap().multi_valued);
        assert!(!graph.get_property("startDate").unwrap().multi_valued);
        assert_eq!(
            graph.compatible_field_kinds("location").unwrap()[0],
            FieldKind::EntityReference
        );
        assert!(graph.version().is_none());
    }

    #[test]
    fn test_load_files() {
        let dir = TempDir::new().unwrap();
        let types = dir.path().join("schemaorg-current-https-types.csv");
        let props = dir.path().join("schemaorg-current-https-properties.csv");
        std::fs::File::create(&types)
            .unwrap()
            .write_all(TYPES.as_bytes())
            .unwrap();
        std::fs::write(&props, PROPERTIES).unwrap();

        let graph = load_vocabulary(&VocabularySource::files(&types, &props)).unwrap();
        assert_eq!(graph.type_count(), 3);
        assert_eq!(graph.version(), Some("schemaorg-current-https"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = VocabularySource::files(dir.path().join("nope.csv"), dir.path().join("x.csv"));
        let err = load_vocabulary(&source).unwrap_err();
        assert!(matches!(err, Error::IoWithPath { .. }));
    }

    #[test]
    fn test_load_cycle_fails() {
        let types = "id,label,subTypeOf\nA,A,B\nB,B,A\n";
        let err = load_vocabulary(&VocabularySource::inline(types, "id,label\n")).unwrap_err();
        assert!(matches!(err, Error::VocabularyLoad(_)));
        assert!(err.to_string().contains("SUPERTYPE_CYCLE"));
    }

    #[test]
    fn test_load_missing_id_column_fails() {
        let types = "label,subTypeOf\nThing,\n";
        let err = load_vocabulary(&VocabularySource::inline(types, "id\n")).unwrap_err();
        assert!(matches!(err, Error::VocabularyLoad(_)));
    }
}
