/*!
Defines the [Catalog] trait implemented by the two state-store backends, and
the option and summary types its operations exchange.
*/

pub(crate) mod commit;
pub mod document;
pub mod file;
pub mod identifier;
pub mod namespace;
pub mod sql;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CatalogError, Result};
use crate::metrics::CatalogMetrics;
use crate::model::schema::Schema;
use crate::table::Table;
use crate::transaction::{TableRequirement, TableUpdate};
use crate::view::View;
use identifier::Identifier;
use namespace::Namespace;

/// The reserved namespace property that marks presence. It is written by the
/// store itself and can never be set or removed through the user API.
pub const EXISTS_PROPERTY: &str = "exists";

const MAX_PROPERTY_KEY_LEN: usize = 255;
const MAX_PROPERTY_VALUE_LEN: usize = 4096;

/// Options for creating a table.
#[derive(Debug, Clone, Default)]
pub struct CreateTableOptions {
    /// Base location of the table; derived from the path manager when absent.
    pub location: Option<String>,
    /// Initial table properties.
    pub properties: HashMap<String, String>,
}

/// The outcome of a namespace property update. The requested removals are
/// partitioned into `removed` and `missing`; `updated` lists the keys that
/// were inserted or overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesUpdateSummary {
    /// Keys that were present and removed.
    pub removed: Vec<String>,
    /// Keys that were inserted or overwritten.
    pub updated: Vec<String>,
    /// Requested removals that were not present (or not removable).
    pub missing: Vec<String>,
}

/// The public contract of a catalog state store. Two backends implement it:
/// a single-file JSON store with optimistic concurrency
/// ([file::FileCatalog]) and an embedded relational store
/// ([sql::SqlCatalog]) that delegates concurrency to transactions.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Name of the catalog.
    fn name(&self) -> &str;

    /// The operation counters of this catalog.
    fn metrics(&self) -> &CatalogMetrics;

    /// Register a namespace with the given user properties.
    async fn create_namespace(
        &self,
        namespace: &Namespace,
        properties: HashMap<String, String>,
    ) -> Result<()>;

    /// Remove a namespace. Fails while any table or view still lives in it.
    async fn drop_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// List the direct children of `parent`, or the top-level namespaces
    /// when `parent` is absent.
    async fn list_namespaces(&self, parent: Option<&Namespace>) -> Result<Vec<Namespace>>;

    /// Load the properties of a namespace, including the `exists` marker.
    async fn load_namespace_properties(
        &self,
        namespace: &Namespace,
    ) -> Result<HashMap<String, String>>;

    /// Apply removals then updates to a namespace's properties in one write.
    async fn update_namespace_properties(
        &self,
        namespace: &Namespace,
        removals: Vec<String>,
        updates: HashMap<String, String>,
    ) -> Result<PropertiesUpdateSummary>;

    /// True when the namespace is registered.
    async fn namespace_exists(&self, namespace: &Namespace) -> Result<bool>;

    /// Create a table: stage its first metadata document and register the
    /// entry.
    async fn create_table(
        self: Arc<Self>,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table>;

    /// Register an existing metadata document as a table.
    async fn register_table(
        self: Arc<Self>,
        identifier: &Identifier,
        metadata_location: &str,
    ) -> Result<Table>;

    /// Load a table handle from its current metadata document.
    async fn load_table(self: Arc<Self>, identifier: &Identifier) -> Result<Table>;

    /// Remove a table entry. Metadata files are left behind; the catalog
    /// only ever promotes forward.
    async fn drop_table(&self, identifier: &Identifier) -> Result<()>;

    /// Rename a table within its namespace.
    async fn rename_table(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<Table>;

    /// List the tables of a namespace.
    async fn list_tables(&self, namespace: &Namespace) -> Result<Vec<Identifier>>;

    /// True when the table is registered.
    async fn table_exists(&self, identifier: &Identifier) -> Result<bool>;

    /// Validate `requirements` against the table's current metadata, apply
    /// `updates` to a copy, stage the next metadata version and swap the
    /// catalog pointer to it.
    async fn commit_table(
        self: Arc<Self>,
        table: &Table,
        requirements: Vec<TableRequirement>,
        updates: Vec<TableUpdate>,
    ) -> Result<Table>;

    /// Create a view from a SQL definition.
    async fn create_view(
        self: Arc<Self>,
        identifier: &Identifier,
        sql: &str,
        dialect: &str,
        schema: Schema,
        properties: HashMap<String, String>,
    ) -> Result<View>;

    /// Load a view handle from its metadata document.
    async fn load_view(self: Arc<Self>, identifier: &Identifier) -> Result<View>;

    /// Remove a view entry.
    async fn drop_view(&self, identifier: &Identifier) -> Result<()>;

    /// Rename a view within its namespace.
    async fn rename_view(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<View>;

    /// List the views of a namespace.
    async fn list_views(&self, namespace: &Namespace) -> Result<Vec<Identifier>>;

    /// True when the view is registered.
    async fn view_exists(&self, identifier: &Identifier) -> Result<bool>;
}

/// Validate a map of user-supplied properties. `reserved` names keys the
/// user API may not set (the namespace `exists` marker).
pub(crate) fn validate_properties(
    properties: &HashMap<String, String>,
    reserved: &[&str],
) -> Result<()> {
    for (key, value) in properties {
        validate_property_key(key)?;
        if reserved.contains(&key.as_str()) {
            return Err(CatalogError::validation(
                "property",
                format!("property key {key:?} is reserved"),
            ));
        }
        if value.len() > MAX_PROPERTY_VALUE_LEN {
            return Err(CatalogError::validation(
                "property",
                format!("value of {key:?} exceeds {MAX_PROPERTY_VALUE_LEN} characters"),
            ));
        }
        if value.contains('\0') {
            return Err(CatalogError::validation(
                "property",
                format!("value of {key:?} contains a null byte"),
            ));
        }
    }
    Ok(())
}

/// Validate the shape of a single property key.
pub(crate) fn validate_property_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CatalogError::validation("property", "property key is empty"));
    }
    if key.len() > MAX_PROPERTY_KEY_LEN {
        return Err(CatalogError::validation(
            "property",
            format!("property key {key:?} exceeds {MAX_PROPERTY_KEY_LEN} characters"),
        ));
    }
    if key.contains(['\n', '\r', '\t', '\0']) {
        return Err(CatalogError::validation(
            "property",
            format!("property key {key:?} contains a control character"),
        ));
    }
    Ok(())
}
