/*!
The SQLite-backed catalog state store.

The catalog mapping lives in three relational tables instead of one JSON
document; concurrency is delegated to the store's transactions, so the
version-tag protocol of the file backend is not needed here. Metadata
documents are still staged on the filesystem through the shared commit
engine, and the pointer swap is a transactional compare-and-set on
`metadata_location`.
*/

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::commit::{
    check_requirements, evolve_metadata, load_table_metadata, load_view_metadata,
    location_string, next_metadata_version, stage_metadata_file,
};
use super::identifier::Identifier;
use super::namespace::Namespace;
use super::{
    validate_properties, validate_property_key, Catalog, CreateTableOptions,
    PropertiesUpdateSummary, EXISTS_PROPERTY,
};
use crate::error::{CatalogError, EntityKind, Result};
use crate::metrics::CatalogMetrics;
use crate::model::metadata::TableMetadata;
use crate::model::schema::Schema;
use crate::model::view_metadata::ViewMetadata;
use crate::paths::PathManager;
use crate::table::Table;
use crate::transaction::{TableRequirement, TableUpdate};
use crate::view::View;

const CATALOG_INIT: &str = r"
CREATE TABLE IF NOT EXISTS iceberg_tables (
    catalog_name TEXT NOT NULL,
    table_namespace TEXT NOT NULL,
    table_name TEXT NOT NULL,
    metadata_location TEXT,
    previous_metadata_location TEXT,
    PRIMARY KEY (catalog_name, table_namespace, table_name)
);
CREATE TABLE IF NOT EXISTS iceberg_namespace_properties (
    catalog_name TEXT NOT NULL,
    namespace TEXT NOT NULL,
    property_key TEXT NOT NULL,
    property_value TEXT,
    PRIMARY KEY (catalog_name, namespace, property_key)
);
CREATE TABLE IF NOT EXISTS iceberg_views (
    catalog_name TEXT NOT NULL,
    view_namespace TEXT NOT NULL,
    view_name TEXT NOT NULL,
    metadata_location TEXT,
    PRIMARY KEY (catalog_name, view_namespace, view_name)
);
";

/// The SQLite-backed catalog state store.
// A single connection that does not allow concurrent calls; queries take the
// lock for their whole (short) duration.
pub struct SqlCatalog {
    name: String,
    paths: Arc<dyn PathManager>,
    conn: Mutex<Connection>,
    metrics: CatalogMetrics,
    cancel: CancellationToken,
}

impl SqlCatalog {
    /// Open a catalog database, creating the tables when missing.
    pub fn open(
        name: &str,
        db_path: impl AsRef<Path>,
        paths: Arc<dyn PathManager>,
    ) -> Result<Arc<Self>> {
        Self::open_with(name, db_path, paths, CancellationToken::new())
    }

    /// Open a catalog database with an explicit cancellation token.
    pub fn open_with(
        name: &str,
        db_path: impl AsRef<Path>,
        paths: Arc<dyn PathManager>,
        cancel: CancellationToken,
    ) -> Result<Arc<Self>> {
        if name.is_empty() {
            return Err(CatalogError::validation(
                "catalog_name",
                "catalog name cannot be empty",
            ));
        }
        let connection = Connection::open(db_path)?;
        // idempotent, run unconditionally
        connection.execute_batch(CATALOG_INIT)?;
        Ok(Arc::new(SqlCatalog {
            name: name.to_string(),
            paths,
            conn: Mutex::new(connection),
            metrics: CatalogMetrics::default(),
            cancel,
        }))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        Ok(())
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.metrics.operation_error();
        }
        result
    }

    fn namespace_row_exists(conn: &Connection, catalog: &str, namespace: &str) -> Result<bool> {
        let mut stmt = conn.prepare(
            "SELECT 1 FROM iceberg_namespace_properties
             WHERE catalog_name = ?1 AND namespace = ?2 AND property_key = ?3",
        )?;
        Ok(stmt.exists(params![catalog, namespace, EXISTS_PROPERTY])?)
    }

    fn table_row(
        conn: &Connection,
        catalog: &str,
        identifier: &Identifier,
    ) -> Result<Option<(String, Option<String>)>> {
        let mut stmt = conn.prepare(
            "SELECT metadata_location, previous_metadata_location FROM iceberg_tables
             WHERE catalog_name = ?1 AND table_namespace = ?2 AND table_name = ?3",
        )?;
        let row = stmt
            .query_row(
                params![
                    catalog,
                    identifier.namespace().to_string(),
                    identifier.name()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn view_row(
        conn: &Connection,
        catalog: &str,
        identifier: &Identifier,
    ) -> Result<Option<String>> {
        let mut stmt = conn.prepare(
            "SELECT metadata_location FROM iceberg_views
             WHERE catalog_name = ?1 AND view_namespace = ?2 AND view_name = ?3",
        )?;
        let row = stmt
            .query_row(
                params![
                    catalog,
                    identifier.namespace().to_string(),
                    identifier.name()
                ],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(row)
    }

    fn namespace_children(conn: &Connection, catalog: &str, namespace: &str) -> Result<i64> {
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM iceberg_tables
             WHERE catalog_name = ?1 AND table_namespace = ?2",
            params![catalog, namespace],
            |row| row.get(0),
        )?;
        let views: i64 = conn.query_row(
            "SELECT COUNT(*) FROM iceberg_views
             WHERE catalog_name = ?1 AND view_namespace = ?2",
            params![catalog, namespace],
            |row| row.get(0),
        )?;
        Ok(tables + views)
    }

    fn is_constraint_violation(err: &CatalogError) -> bool {
        matches!(
            err,
            CatalogError::Sql(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    fn create_namespace_sync(
        &self,
        namespace: &Namespace,
        properties: HashMap<String, String>,
    ) -> Result<()> {
        validate_properties(&properties, &[EXISTS_PROPERTY])?;
        self.check_cancelled()?;
        let key = namespace.to_string();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if Self::namespace_row_exists(&tx, &self.name, &key)? {
            return Err(CatalogError::AlreadyExists {
                kind: EntityKind::Namespace,
                name: key,
            });
        }
        tx.execute(
            "INSERT INTO iceberg_namespace_properties
             (catalog_name, namespace, property_key, property_value)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.name, key, EXISTS_PROPERTY, "true"],
        )?;
        for (property_key, property_value) in &properties {
            tx.execute(
                "INSERT INTO iceberg_namespace_properties
                 (catalog_name, namespace, property_key, property_value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![self.name, key, property_key, property_value],
            )?;
        }
        tx.commit()?;
        self.metrics.namespace_created();
        debug!(catalog = %self.name, namespace = %namespace, "created namespace");
        Ok(())
    }

    fn drop_namespace_sync(&self, namespace: &Namespace) -> Result<()> {
        self.check_cancelled()?;
        let key = namespace.to_string();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if !Self::namespace_row_exists(&tx, &self.name, &key)? {
            return Err(CatalogError::NoSuchNamespace(key));
        }
        if Self::namespace_children(&tx, &self.name, &key)? > 0 {
            return Err(CatalogError::NamespaceNotEmpty(key));
        }
        tx.execute(
            "DELETE FROM iceberg_namespace_properties
             WHERE catalog_name = ?1 AND namespace = ?2",
            params![self.name, key],
        )?;
        tx.commit()?;
        self.metrics.namespace_dropped();
        debug!(catalog = %self.name, namespace = %namespace, "dropped namespace");
        Ok(())
    }

    fn list_namespaces_sync(&self, parent: Option<&Namespace>) -> Result<Vec<Namespace>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT namespace FROM iceberg_namespace_properties
             WHERE catalog_name = ?1 AND property_key = ?2
             ORDER BY namespace",
        )?;
        let keys = stmt
            .query_map(params![self.name, EXISTS_PROPERTY], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        let mut namespaces = vec![];
        for key in keys {
            let namespace = Namespace::parse(&key)?;
            let keep = match parent {
                None => namespace.len() == 1,
                Some(parent) => namespace.is_child_of(parent),
            };
            if keep {
                namespaces.push(namespace);
            }
        }
        Ok(namespaces)
    }

    fn load_namespace_properties_sync(
        &self,
        namespace: &Namespace,
    ) -> Result<HashMap<String, String>> {
        let key = namespace.to_string();
        let conn = self.conn.lock();
        if !Self::namespace_row_exists(&conn, &self.name, &key)? {
            return Err(CatalogError::NoSuchNamespace(key));
        }
        let mut stmt = conn.prepare(
            "SELECT property_key, property_value FROM iceberg_namespace_properties
             WHERE catalog_name = ?1 AND namespace = ?2",
        )?;
        let rows = stmt.query_map(params![self.name, key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut properties = HashMap::new();
        for row in rows {
            let (property_key, property_value) = row?;
            properties.insert(property_key, property_value);
        }
        Ok(properties)
    }

    fn update_namespace_properties_sync(
        &self,
        namespace: &Namespace,
        removals: Vec<String>,
        updates: HashMap<String, String>,
    ) -> Result<PropertiesUpdateSummary> {
        validate_properties(&updates, &[EXISTS_PROPERTY])?;
        for key in &removals {
            validate_property_key(key)?;
        }
        self.check_cancelled()?;
        let namespace_key = namespace.to_string();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if !Self::namespace_row_exists(&tx, &self.name, &namespace_key)? {
            return Err(CatalogError::NoSuchNamespace(namespace_key));
        }
        let mut summary = PropertiesUpdateSummary::default();
        for key in &removals {
            // the presence marker is never removed through this API
            if key == EXISTS_PROPERTY {
                summary.missing.push(key.clone());
                continue;
            }
            let deleted = tx.execute(
                "DELETE FROM iceberg_namespace_properties
                 WHERE catalog_name = ?1 AND namespace = ?2 AND property_key = ?3",
                params![self.name, namespace_key, key],
            )?;
            if deleted > 0 {
                summary.removed.push(key.clone());
            } else {
                summary.missing.push(key.clone());
            }
        }
        for (key, value) in &updates {
            tx.execute(
                "INSERT INTO iceberg_namespace_properties
                 (catalog_name, namespace, property_key, property_value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (catalog_name, namespace, property_key)
                 DO UPDATE SET property_value = excluded.property_value",
                params![self.name, namespace_key, key, value],
            )?;
            summary.updated.push(key.clone());
        }
        tx.commit()?;
        Ok(summary)
    }

    fn insert_table_row(&self, identifier: &Identifier, metadata_location: &str) -> Result<()> {
        let conn = self.conn.lock();
        let namespace_key = identifier.namespace().to_string();
        if !Self::namespace_row_exists(&conn, &self.name, &namespace_key)? {
            return Err(CatalogError::NoSuchNamespace(namespace_key));
        }
        let inserted = conn
            .execute(
                "INSERT INTO iceberg_tables
                 (catalog_name, table_namespace, table_name, metadata_location,
                  previous_metadata_location)
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                params![self.name, namespace_key, identifier.name(), metadata_location],
            )
            .map_err(CatalogError::from);
        match inserted {
            Ok(_) => Ok(()),
            Err(err) if Self::is_constraint_violation(&err) => {
                Err(CatalogError::AlreadyExists {
                    kind: EntityKind::Table,
                    name: identifier.key(),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn create_table_sync(
        self: Arc<Self>,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table> {
        validate_properties(&options.properties, &[])?;
        self.check_cancelled()?;
        {
            let conn = self.conn.lock();
            let namespace_key = identifier.namespace().to_string();
            if !Self::namespace_row_exists(&conn, &self.name, &namespace_key)? {
                return Err(CatalogError::NoSuchNamespace(namespace_key));
            }
            if Self::table_row(&conn, &self.name, identifier)?.is_some() {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::Table,
                    name: identifier.key(),
                });
            }
        }

        let location = options
            .location
            .clone()
            .unwrap_or_else(|| location_string(&self.paths.table_dir(identifier)));
        let metadata = TableMetadata::new(location, schema, options.properties);
        let version = next_metadata_version(&self.paths.table_metadata_dir(identifier))?;
        let staged_path = self.paths.table_metadata_file(identifier, version);
        let metadata_location = location_string(&staged_path);
        stage_metadata_file(&staged_path, &metadata, &self.cancel)?;

        if let Err(err) = self.insert_table_row(identifier, &metadata_location) {
            let _ = fs::remove_file(&staged_path);
            return Err(err);
        }
        self.metrics.table_created();
        debug!(catalog = %self.name, table = %identifier, "created table");
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(Table::new(
            identifier.clone(),
            catalog,
            metadata,
            &metadata_location,
        ))
    }

    fn register_table_sync(
        self: Arc<Self>,
        identifier: &Identifier,
        metadata_location: &str,
    ) -> Result<Table> {
        self.check_cancelled()?;
        let metadata = load_table_metadata(metadata_location)?;
        self.insert_table_row(identifier, metadata_location)?;
        self.metrics.table_created();
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(Table::new(
            identifier.clone(),
            catalog,
            metadata,
            metadata_location,
        ))
    }

    fn load_table_sync(self: Arc<Self>, identifier: &Identifier) -> Result<Table> {
        let row = {
            let conn = self.conn.lock();
            Self::table_row(&conn, &self.name, identifier)?
        };
        let (metadata_location, _) = row.ok_or_else(|| CatalogError::NoSuchTable(identifier.key()))?;
        let metadata = load_table_metadata(&metadata_location)?;
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(Table::new(
            identifier.clone(),
            catalog,
            metadata,
            &metadata_location,
        ))
    }

    fn drop_table_sync(&self, identifier: &Identifier) -> Result<()> {
        self.check_cancelled()?;
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM iceberg_tables
             WHERE catalog_name = ?1 AND table_namespace = ?2 AND table_name = ?3",
            params![
                self.name,
                identifier.namespace().to_string(),
                identifier.name()
            ],
        )?;
        if deleted == 0 {
            return Err(CatalogError::NoSuchTable(identifier.key()));
        }
        self.metrics.table_dropped();
        debug!(catalog = %self.name, table = %identifier, "dropped table");
        Ok(())
    }

    fn rename_table_sync(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<Table> {
        if from.namespace() != to.namespace() {
            return Err(CatalogError::validation(
                "identifier",
                "tables cannot be renamed across namespaces",
            ));
        }
        self.check_cancelled()?;
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            if Self::table_row(&tx, &self.name, from)?.is_none() {
                return Err(CatalogError::NoSuchTable(from.key()));
            }
            if from.key() != to.key() && Self::table_row(&tx, &self.name, to)?.is_some() {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::Table,
                    name: to.key(),
                });
            }
            tx.execute(
                "UPDATE iceberg_tables SET table_name = ?4
                 WHERE catalog_name = ?1 AND table_namespace = ?2 AND table_name = ?3",
                params![
                    self.name,
                    from.namespace().to_string(),
                    from.name(),
                    to.name()
                ],
            )?;
            tx.commit()?;
        }
        self.load_table_sync(to)
    }

    fn list_tables_sync(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let key = namespace.to_string();
        let conn = self.conn.lock();
        if !Self::namespace_row_exists(&conn, &self.name, &key)? {
            return Err(CatalogError::NoSuchNamespace(key));
        }
        let mut stmt = conn.prepare(
            "SELECT table_name FROM iceberg_tables
             WHERE catalog_name = ?1 AND table_namespace = ?2
             ORDER BY table_name",
        )?;
        let names = stmt
            .query_map(params![self.name, key], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        names
            .iter()
            .map(|name| Identifier::from_namespace(namespace.clone(), name))
            .collect()
    }

    fn table_exists_sync(&self, identifier: &Identifier) -> Result<bool> {
        let conn = self.conn.lock();
        Ok(Self::table_row(&conn, &self.name, identifier)?.is_some())
    }

    fn commit_table_sync(
        self: Arc<Self>,
        table: &Table,
        requirements: Vec<TableRequirement>,
        updates: Vec<TableUpdate>,
    ) -> Result<Table> {
        self.check_cancelled()?;
        let identifier = table.identifier();
        let row = {
            let conn = self.conn.lock();
            Self::table_row(&conn, &self.name, identifier)?
        };
        let (current_location, _) =
            row.ok_or_else(|| CatalogError::NoSuchTable(identifier.key()))?;
        if current_location != table.metadata_location() {
            return Err(CatalogError::ConcurrentModification {
                expected: table.metadata_location().to_string(),
                actual: current_location,
            });
        }
        let current = load_table_metadata(&current_location)?;
        check_requirements(&requirements, &current)?;

        if updates.is_empty() {
            let catalog: Arc<dyn Catalog> = self.clone();
            return Ok(Table::new(
                identifier.clone(),
                catalog,
                current,
                &current_location,
            ));
        }

        let version = next_metadata_version(&self.paths.table_metadata_dir(identifier))?;
        let staged_path = self.paths.table_metadata_file(identifier, version);
        let new_location = location_string(&staged_path);
        let next_metadata = evolve_metadata(&current, &updates, &new_location)?;
        stage_metadata_file(&staged_path, &next_metadata, &self.cancel)?;

        // compare-and-set on the previous pointer decides the race
        let swapped = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE iceberg_tables
                 SET metadata_location = ?4, previous_metadata_location = ?5
                 WHERE catalog_name = ?1 AND table_namespace = ?2 AND table_name = ?3
                   AND metadata_location = ?5",
                params![
                    self.name,
                    identifier.namespace().to_string(),
                    identifier.name(),
                    new_location,
                    current_location
                ],
            )?
        };
        if swapped == 0 {
            let _ = fs::remove_file(&staged_path);
            let row = {
                let conn = self.conn.lock();
                Self::table_row(&conn, &self.name, identifier)?
            };
            return Err(match row {
                None => CatalogError::NoSuchTable(identifier.key()),
                Some((actual, _)) => CatalogError::ConcurrentModification {
                    expected: current_location,
                    actual,
                },
            });
        }
        debug!(catalog = %self.name, table = %identifier, version, "committed table");
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(Table::new(
            identifier.clone(),
            catalog,
            next_metadata,
            &new_location,
        ))
    }

    fn create_view_sync(
        self: Arc<Self>,
        identifier: &Identifier,
        sql: &str,
        dialect: &str,
        schema: Schema,
        properties: HashMap<String, String>,
    ) -> Result<View> {
        validate_properties(&properties, &[])?;
        self.check_cancelled()?;
        let namespace_key = identifier.namespace().to_string();
        {
            let conn = self.conn.lock();
            if !Self::namespace_row_exists(&conn, &self.name, &namespace_key)? {
                return Err(CatalogError::NoSuchNamespace(namespace_key));
            }
            if Self::view_row(&conn, &self.name, identifier)?.is_some() {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::View,
                    name: identifier.key(),
                });
            }
        }

        let location = location_string(&self.paths.view_dir(identifier));
        let metadata = ViewMetadata::new(
            location,
            sql,
            dialect,
            schema,
            properties,
            &self.name,
            identifier.namespace(),
        );
        let sequence = metadata.versions.len() as u64;
        let staged_path =
            self.paths
                .view_metadata_file(identifier, sequence, &metadata.view_uuid);
        let metadata_location = location_string(&staged_path);
        stage_metadata_file(&staged_path, &metadata, &self.cancel)?;

        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO iceberg_views
                 (catalog_name, view_namespace, view_name, metadata_location)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    self.name,
                    namespace_key,
                    identifier.name(),
                    metadata_location
                ],
            )
            .map_err(CatalogError::from)
        };
        if let Err(err) = inserted {
            let _ = fs::remove_file(&staged_path);
            return Err(if Self::is_constraint_violation(&err) {
                CatalogError::AlreadyExists {
                    kind: EntityKind::View,
                    name: identifier.key(),
                }
            } else {
                err
            });
        }
        self.metrics.view_created();
        debug!(catalog = %self.name, view = %identifier, "created view");
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(View::new(
            identifier.clone(),
            catalog,
            metadata,
            &metadata_location,
        ))
    }

    fn load_view_sync(self: Arc<Self>, identifier: &Identifier) -> Result<View> {
        let row = {
            let conn = self.conn.lock();
            Self::view_row(&conn, &self.name, identifier)?
        };
        let metadata_location = row.ok_or_else(|| CatalogError::NoSuchView(identifier.key()))?;
        let metadata = load_view_metadata(&metadata_location)?;
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(View::new(
            identifier.clone(),
            catalog,
            metadata,
            &metadata_location,
        ))
    }

    fn drop_view_sync(&self, identifier: &Identifier) -> Result<()> {
        self.check_cancelled()?;
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM iceberg_views
             WHERE catalog_name = ?1 AND view_namespace = ?2 AND view_name = ?3",
            params![
                self.name,
                identifier.namespace().to_string(),
                identifier.name()
            ],
        )?;
        if deleted == 0 {
            return Err(CatalogError::NoSuchView(identifier.key()));
        }
        self.metrics.view_dropped();
        debug!(catalog = %self.name, view = %identifier, "dropped view");
        Ok(())
    }

    fn rename_view_sync(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<View> {
        if from.namespace() != to.namespace() {
            return Err(CatalogError::validation(
                "identifier",
                "views cannot be renamed across namespaces",
            ));
        }
        self.check_cancelled()?;
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            if Self::view_row(&tx, &self.name, from)?.is_none() {
                return Err(CatalogError::NoSuchView(from.key()));
            }
            if from.key() != to.key() && Self::view_row(&tx, &self.name, to)?.is_some() {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::View,
                    name: to.key(),
                });
            }
            tx.execute(
                "UPDATE iceberg_views SET view_name = ?4
                 WHERE catalog_name = ?1 AND view_namespace = ?2 AND view_name = ?3",
                params![
                    self.name,
                    from.namespace().to_string(),
                    from.name(),
                    to.name()
                ],
            )?;
            tx.commit()?;
        }
        self.load_view_sync(to)
    }

    fn list_views_sync(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let key = namespace.to_string();
        let conn = self.conn.lock();
        if !Self::namespace_row_exists(&conn, &self.name, &key)? {
            return Err(CatalogError::NoSuchNamespace(key));
        }
        let mut stmt = conn.prepare(
            "SELECT view_name FROM iceberg_views
             WHERE catalog_name = ?1 AND view_namespace = ?2
             ORDER BY view_name",
        )?;
        let names = stmt
            .query_map(params![self.name, key], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        names
            .iter()
            .map(|name| Identifier::from_namespace(namespace.clone(), name))
            .collect()
    }

    fn view_exists_sync(&self, identifier: &Identifier) -> Result<bool> {
        let conn = self.conn.lock();
        Ok(Self::view_row(&conn, &self.name, identifier)?.is_some())
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &CatalogMetrics {
        &self.metrics
    }

    async fn create_namespace(
        &self,
        namespace: &Namespace,
        properties: HashMap<String, String>,
    ) -> Result<()> {
        let result = self.create_namespace_sync(namespace, properties);
        self.track(result)
    }

    async fn drop_namespace(&self, namespace: &Namespace) -> Result<()> {
        let result = self.drop_namespace_sync(namespace);
        self.track(result)
    }

    async fn list_namespaces(&self, parent: Option<&Namespace>) -> Result<Vec<Namespace>> {
        let result = self.list_namespaces_sync(parent);
        self.track(result)
    }

    async fn load_namespace_properties(
        &self,
        namespace: &Namespace,
    ) -> Result<HashMap<String, String>> {
        let result = self.load_namespace_properties_sync(namespace);
        self.track(result)
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Namespace,
        removals: Vec<String>,
        updates: HashMap<String, String>,
    ) -> Result<PropertiesUpdateSummary> {
        let result = self.update_namespace_properties_sync(namespace, removals, updates);
        self.track(result)
    }

    async fn namespace_exists(&self, namespace: &Namespace) -> Result<bool> {
        let key = namespace.to_string();
        let result = {
            let conn = self.conn.lock();
            Self::namespace_row_exists(&conn, &self.name, &key)
        };
        self.track(result)
    }

    async fn create_table(
        self: Arc<Self>,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table> {
        let result = Arc::clone(&self).create_table_sync(identifier, schema, options);
        self.track(result)
    }

    async fn register_table(
        self: Arc<Self>,
        identifier: &Identifier,
        metadata_location: &str,
    ) -> Result<Table> {
        let result = Arc::clone(&self).register_table_sync(identifier, metadata_location);
        self.track(result)
    }

    async fn load_table(self: Arc<Self>, identifier: &Identifier) -> Result<Table> {
        let result = Arc::clone(&self).load_table_sync(identifier);
        self.track(result)
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        let result = self.drop_table_sync(identifier);
        self.track(result)
    }

    async fn rename_table(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<Table> {
        let result = Arc::clone(&self).rename_table_sync(from, to);
        self.track(result)
    }

    async fn list_tables(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let result = self.list_tables_sync(namespace);
        self.track(result)
    }

    async fn table_exists(&self, identifier: &Identifier) -> Result<bool> {
        let result = self.table_exists_sync(identifier);
        self.track(result)
    }

    async fn commit_table(
        self: Arc<Self>,
        table: &Table,
        requirements: Vec<TableRequirement>,
        updates: Vec<TableUpdate>,
    ) -> Result<Table> {
        let result = Arc::clone(&self).commit_table_sync(table, requirements, updates);
        self.track(result)
    }

    async fn create_view(
        self: Arc<Self>,
        identifier: &Identifier,
        sql: &str,
        dialect: &str,
        schema: Schema,
        properties: HashMap<String, String>,
    ) -> Result<View> {
        let result = Arc::clone(&self).create_view_sync(identifier, sql, dialect, schema, properties);
        self.track(result)
    }

    async fn load_view(self: Arc<Self>, identifier: &Identifier) -> Result<View> {
        let result = Arc::clone(&self).load_view_sync(identifier);
        self.track(result)
    }

    async fn drop_view(&self, identifier: &Identifier) -> Result<()> {
        let result = self.drop_view_sync(identifier);
        self.track(result)
    }

    async fn rename_view(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<View> {
        let result = Arc::clone(&self).rename_view_sync(from, to);
        self.track(result)
    }

    async fn list_views(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let result = self.list_views_sync(namespace);
        self.track(result)
    }

    async fn view_exists(&self, identifier: &Identifier) -> Result<bool> {
        let result = self.view_exists_sync(identifier);
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::model::schema::{PrimitiveType, StructField, Type};
    use crate::paths::FilesystemPathManager;

    fn open(dir: &Path) -> Arc<SqlCatalog> {
        SqlCatalog::open(
            "ranger",
            dir.join("catalog.db"),
            Arc::new(FilesystemPathManager::new(dir)),
        )
        .unwrap()
    }

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    fn ident(name: &str) -> Identifier {
        Identifier::parse(name).unwrap()
    }

    fn id_schema() -> Schema {
        Schema::from_fields(
            0,
            vec![StructField {
                id: 1,
                name: "id".to_string(),
                required: true,
                field_type: Type::Primitive(PrimitiveType::Long),
                doc: None,
            }],
        )
    }

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_namespace_lifecycle() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());

        catalog
            .create_namespace(&ns("sales"), props(&[("owner", "alice")]))
            .await?;
        assert!(catalog.namespace_exists(&ns("sales")).await?);
        assert_eq!(vec![ns("sales")], catalog.list_namespaces(None).await?);

        let properties = catalog.load_namespace_properties(&ns("sales")).await?;
        assert_eq!(Some("alice"), properties.get("owner").map(String::as_str));
        assert_eq!(Some("true"), properties.get("exists").map(String::as_str));

        let err = catalog
            .create_namespace(&ns("sales"), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists { .. }));

        catalog.drop_namespace(&ns("sales")).await?;
        assert!(!catalog.namespace_exists(&ns("sales")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_namespace_properties_runs_in_one_transaction() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog
            .create_namespace(&ns("a"), props(&[("drop", "1"), ("keep", "2")]))
            .await?;

        let summary = catalog
            .update_namespace_properties(
                &ns("a"),
                vec!["drop".to_string(), "absent".to_string(), "exists".to_string()],
                props(&[("added", "3"), ("keep", "updated")]),
            )
            .await?;
        assert_eq!(vec!["drop".to_string()], summary.removed);
        assert_eq!(
            vec!["absent".to_string(), "exists".to_string()],
            summary.missing
        );
        let mut updated = summary.updated.clone();
        updated.sort();
        assert_eq!(vec!["added".to_string(), "keep".to_string()], updated);

        let properties = catalog.load_namespace_properties(&ns("a")).await?;
        assert_eq!(Some("updated"), properties.get("keep").map(String::as_str));
        assert_eq!(Some("3"), properties.get("added").map(String::as_str));
        assert_eq!(Some("true"), properties.get("exists").map(String::as_str));
        assert_eq!(None, properties.get("drop"));
        Ok(())
    }

    #[tokio::test]
    async fn test_table_create_commit_and_drop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("sales"), HashMap::new()).await?;

        let table = catalog
            .clone()
            .create_table(&ident("sales.orders"), id_schema(), CreateTableOptions::default())
            .await?;
        assert!(table.metadata_location().ends_with("v1.metadata.json"));
        assert!(Path::new(table.metadata_location()).exists());

        // requirements run even when nothing is staged
        let uuid = table.metadata().table_uuid;
        let unchanged = catalog
            .clone()
            .commit_table(
                &table,
                vec![TableRequirement::AssertTableUuid { uuid }],
                vec![],
            )
            .await?;
        assert_eq!(table.metadata_location(), unchanged.metadata_location());

        let committed = catalog
            .clone()
            .commit_table(
                &table,
                vec![],
                vec![TableUpdate::SetProperties {
                    updates: props(&[("owner", "alice")]),
                }],
            )
            .await?;
        assert!(committed.metadata_location().ends_with("v2.metadata.json"));

        let row = {
            let conn = catalog.conn.lock();
            SqlCatalog::table_row(&conn, "ranger", &ident("sales.orders"))?.unwrap()
        };
        assert_eq!(committed.metadata_location(), row.0);
        assert_eq!(Some(table.metadata_location()), row.1.as_deref());

        catalog.drop_table(&ident("sales.orders")).await?;
        assert!(!catalog.table_exists(&ident("sales.orders")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_handle_commit_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("a"), HashMap::new()).await?;
        catalog
            .clone()
            .create_table(&ident("a.t"), id_schema(), CreateTableOptions::default())
            .await?;

        let fresh = catalog.clone().load_table(&ident("a.t")).await?;
        let stale = catalog.clone().load_table(&ident("a.t")).await?;
        catalog
            .clone()
            .commit_table(
                &fresh,
                vec![],
                vec![TableUpdate::SetProperties {
                    updates: props(&[("k", "1")]),
                }],
            )
            .await?;

        let err = catalog
            .clone()
            .commit_table(
                &stale,
                vec![],
                vec![TableUpdate::SetProperties {
                    updates: props(&[("k", "2")]),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::ConcurrentModification { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_drop_namespace_with_children_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("x"), HashMap::new()).await?;
        catalog
            .clone()
            .create_table(&ident("x.t"), id_schema(), CreateTableOptions::default())
            .await?;

        let err = catalog.drop_namespace(&ns("x")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NamespaceNotEmpty(_)));
        catalog.drop_table(&ident("x.t")).await?;
        catalog.drop_namespace(&ns("x")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rename_table_same_namespace_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("a"), HashMap::new()).await?;
        catalog.create_namespace(&ns("b"), HashMap::new()).await?;
        let table = catalog
            .clone()
            .create_table(&ident("a.t"), id_schema(), CreateTableOptions::default())
            .await?;

        let renamed = catalog
            .clone()
            .rename_table(&ident("a.t"), &ident("a.u"))
            .await?;
        assert_eq!("a.u", renamed.identifier().key());
        assert_eq!(table.metadata_location(), renamed.metadata_location());

        let err = catalog
            .clone()
            .rename_table(&ident("a.u"), &ident("b.u"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_and_list_tables() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("a"), HashMap::new()).await?;
        let table = catalog
            .clone()
            .create_table(&ident("a.t"), id_schema(), CreateTableOptions::default())
            .await?;
        let location = table.metadata_location().to_string();
        catalog.drop_table(&ident("a.t")).await?;

        catalog
            .clone()
            .register_table(&ident("a.t"), &location)
            .await?;
        assert_eq!(vec![ident("a.t")], catalog.list_tables(&ns("a")).await?);

        let err = catalog.list_tables(&ns("missing")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoSuchNamespace(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_view_lifecycle() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("r"), HashMap::new()).await?;

        let view = catalog
            .clone()
            .create_view(
                &ident("r.v"),
                "SELECT 1",
                "ansi",
                id_schema(),
                props(&[("p", "q")]),
            )
            .await?;
        assert_eq!(Some("SELECT 1"), view.sql());

        let loaded = catalog.clone().load_view(&ident("r.v")).await?;
        assert_eq!(Some("ansi"), loaded.dialect());
        assert_eq!(
            Some("q"),
            loaded.metadata().properties.get("p").map(String::as_str)
        );

        assert_eq!(vec![ident("r.v")], catalog.list_views(&ns("r")).await?);
        let renamed = catalog
            .clone()
            .rename_view(&ident("r.v"), &ident("r.w"))
            .await?;
        assert_eq!("r.w", renamed.identifier().key());

        catalog.drop_view(&ident("r.w")).await?;
        assert!(!catalog.view_exists(&ident("r.w")).await?);
        let err = catalog.drop_view(&ident("r.w")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoSuchView(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_and_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = open(dir.path());
        catalog.create_namespace(&ns("a"), HashMap::new()).await?;
        let _ = catalog
            .load_namespace_properties(&ns("missing"))
            .await
            .unwrap_err();

        let counters = catalog.metrics().snapshot();
        assert_eq!(1, counters.namespaces_created);
        assert_eq!(1, counters.operation_errors);
        Ok(())
    }

    #[tokio::test]
    async fn test_state_survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let catalog = open(dir.path());
            catalog.create_namespace(&ns("a"), HashMap::new()).await?;
            catalog
                .clone()
                .create_table(&ident("a.t"), id_schema(), CreateTableOptions::default())
                .await?;
        }
        let reopened = open(dir.path());
        assert!(reopened.namespace_exists(&ns("a")).await?);
        assert!(reopened.table_exists(&ident("a.t")).await?);
        let table = reopened.clone().load_table(&ident("a.t")).await?;
        assert_eq!(1, table.metadata().last_column_id);
        Ok(())
    }
}
