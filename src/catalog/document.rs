/*!
The persisted catalog document: the single JSON root mapping namespaces,
tables and views to their entries.
*/

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// The single persisted root of a catalog. Keys of `tables` and `views` are
/// the dotted `<namespace>.<name>` form; keys of `namespaces` are the dotted
/// namespace form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    /// Name of the catalog.
    pub catalog_name: String,
    /// Namespace entries keyed by dotted namespace.
    pub namespaces: BTreeMap<String, NamespaceEntry>,
    /// Table entries keyed by `<namespace>.<name>`.
    pub tables: BTreeMap<String, TableEntry>,
    /// View entries keyed by `<namespace>.<name>`.
    pub views: BTreeMap<String, ViewEntry>,
    /// Write count of the document, starting at 1.
    pub version: u64,
    /// When the catalog was created.
    pub created_at: DateTime<Utc>,
    /// When the catalog was last written.
    pub updated_at: DateTime<Utc>,
}

/// A namespace registered in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NamespaceEntry {
    /// Namespace properties, always holding the reserved `exists` marker.
    pub properties: HashMap<String, String>,
    /// When the namespace was created.
    pub created_at: DateTime<Utc>,
    /// When the namespace was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A table registered in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TableEntry {
    /// Dotted namespace owning the table.
    pub namespace: String,
    /// Leaf name of the table.
    pub name: String,
    /// Location of the current metadata document.
    pub metadata_location: String,
    /// The metadata location held before the latest commit, one deep.
    pub previous_metadata_location: Option<String>,
    /// When the table was created.
    pub created_at: DateTime<Utc>,
    /// When the table was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A view registered in the catalog. Version history lives inside the view
/// metadata document, so no previous location is chained here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ViewEntry {
    /// Dotted namespace owning the view.
    pub namespace: String,
    /// Leaf name of the view.
    pub name: String,
    /// Location of the view metadata document.
    pub metadata_location: String,
    /// When the view was created.
    pub created_at: DateTime<Utc>,
    /// When the view was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CatalogDocument {
    /// An empty document for a freshly bootstrapped catalog.
    pub fn new(catalog_name: &str) -> Self {
        let now = Utc::now();
        CatalogDocument {
            catalog_name: catalog_name.to_string(),
            namespaces: BTreeMap::new(),
            tables: BTreeMap::new(),
            views: BTreeMap::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the structural invariants of the document: a non-empty catalog
    /// name, version ≥ 1, well-formed map keys, and no table or view whose
    /// namespace is unregistered.
    pub fn validate(&self) -> Result<()> {
        if self.catalog_name.is_empty() {
            return Err(CatalogError::Internal(
                "catalog document has an empty catalog_name".to_string(),
            ));
        }
        if self.version < 1 {
            return Err(CatalogError::Internal(format!(
                "catalog document version {} is below 1",
                self.version
            )));
        }
        for key in self.namespaces.keys() {
            if key.is_empty() || key.split('.').any(str::is_empty) {
                return Err(CatalogError::Internal(format!(
                    "malformed namespace key {key:?}"
                )));
            }
        }
        for (key, entry) in &self.tables {
            Self::check_entry_key("table", key, &entry.namespace, &entry.name)?;
            if !self.namespaces.contains_key(&entry.namespace) {
                return Err(CatalogError::Internal(format!(
                    "table {key} references unknown namespace {}",
                    entry.namespace
                )));
            }
            if entry.metadata_location.is_empty() {
                return Err(CatalogError::Internal(format!(
                    "table {key} has an empty metadata location"
                )));
            }
        }
        for (key, entry) in &self.views {
            Self::check_entry_key("view", key, &entry.namespace, &entry.name)?;
            if !self.namespaces.contains_key(&entry.namespace) {
                return Err(CatalogError::Internal(format!(
                    "view {key} references unknown namespace {}",
                    entry.namespace
                )));
            }
            if entry.metadata_location.is_empty() {
                return Err(CatalogError::Internal(format!(
                    "view {key} has an empty metadata location"
                )));
            }
        }
        Ok(())
    }

    fn check_entry_key(kind: &str, key: &str, namespace: &str, name: &str) -> Result<()> {
        if namespace.is_empty() || name.is_empty() {
            return Err(CatalogError::Internal(format!(
                "{kind} {key} has an empty namespace or name"
            )));
        }
        let expected = format!("{namespace}.{name}");
        if key != expected {
            return Err(CatalogError::Internal(format!(
                "{kind} key {key:?} does not match {expected:?}"
            )));
        }
        Ok(())
    }

    /// True when no table or view lives in the namespace.
    pub fn namespace_is_empty(&self, namespace_key: &str) -> bool {
        !self
            .tables
            .values()
            .any(|entry| entry.namespace == namespace_key)
            && !self
                .views
                .values()
                .any(|entry| entry.namespace == namespace_key)
    }

    /// Every metadata location referenced by the document, tables and views.
    pub fn metadata_locations(&self) -> impl Iterator<Item = &str> {
        self.tables
            .values()
            .map(|entry| entry.metadata_location.as_str())
            .chain(self.views.values().map(|entry| entry.metadata_location.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use proptest::prelude::*;

    use super::*;

    fn sample() -> CatalogDocument {
        let mut document = CatalogDocument::new("ranger");
        let now = Utc::now();
        document.namespaces.insert(
            "sales".to_string(),
            NamespaceEntry {
                properties: HashMap::from([("exists".to_string(), "true".to_string())]),
                created_at: now,
                updated_at: now,
            },
        );
        document.tables.insert(
            "sales.orders".to_string(),
            TableEntry {
                namespace: "sales".to_string(),
                name: "orders".to_string(),
                metadata_location: "/wh/tables/sales/orders/metadata/v1.metadata.json".to_string(),
                previous_metadata_location: None,
                created_at: now,
                updated_at: now,
            },
        );
        document
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let document = sample();
        let json = serde_json::to_string_pretty(&document)?;
        let parsed: CatalogDocument = serde_json::from_str(&json)?;
        assert_eq!(document, parsed);
        Ok(())
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let data = r#"
        {
            "catalog_name": "ranger",
            "namespaces": {},
            "tables": {},
            "views": {},
            "version": 1,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "surprise": true
        }
        "#;
        assert!(serde_json::from_str::<CatalogDocument>(data).is_err());
    }

    #[test]
    fn test_validate_ok() {
        sample().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_dangling_namespace() {
        let mut document = sample();
        document.namespaces.clear();
        assert!(document.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_mismatched_key() {
        let mut document = sample();
        let entry = document.tables.remove("sales.orders").unwrap();
        document.tables.insert("sales.other".to_string(), entry);
        assert!(document.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_version() {
        let mut document = sample();
        document.version = 0;
        assert!(document.validate().is_err());
    }

    #[test]
    fn test_namespace_is_empty() {
        let document = sample();
        assert!(!document.namespace_is_empty("sales"));
        assert!(document.namespace_is_empty("reports"));
    }

    fn arb_properties() -> impl Strategy<Value = HashMap<String, String>> {
        proptest::collection::hash_map("[a-z][a-z0-9_]{0,8}", "[a-z0-9 ]{0,16}", 0..4)
    }

    proptest! {
        #[test]
        fn test_document_round_trip(
            spec in proptest::collection::btree_map(
                "[a-z][a-z0-9_]{0,8}",
                (
                    arb_properties(),
                    proptest::collection::btree_set("[a-z][a-z0-9_]{0,8}", 0..3),
                    proptest::collection::btree_set("[a-z][a-z0-9_]{0,8}", 0..3),
                ),
                1..4,
            ),
            version in 1u64..1000,
        ) {
            let now = Utc::now();
            let mut document = CatalogDocument::new("ranger");
            document.version = version;
            for (namespace, (properties, tables, views)) in &spec {
                document.namespaces.insert(
                    namespace.clone(),
                    NamespaceEntry {
                        properties: properties.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                for table in tables {
                    document.tables.insert(
                        format!("{namespace}.{table}"),
                        TableEntry {
                            namespace: namespace.clone(),
                            name: table.clone(),
                            metadata_location: format!(
                                "/wh/tables/{namespace}/{table}/metadata/v1.metadata.json"
                            ),
                            previous_metadata_location: None,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                }
                for view in views {
                    document.views.insert(
                        format!("{namespace}.{view}"),
                        ViewEntry {
                            namespace: namespace.clone(),
                            name: view.clone(),
                            metadata_location: format!(
                                "/wh/views/{namespace}/{view}/metadata/00001-0.metadata.json"
                            ),
                            created_at: now,
                            updated_at: now,
                        },
                    );
                }
            }
            document.validate().unwrap();
            let json = serde_json::to_string_pretty(&document).unwrap();
            let parsed: CatalogDocument = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(document, parsed);
        }
    }
}
