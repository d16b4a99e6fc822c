/*!
The file-backed catalog state store.

The whole catalog lives in one JSON document. Readers decode and validate it
and derive a version tag from the file's size and mtime; writers prepare a
deep copy, stage a sibling temporary file and rename it over the target, but
only after checking that the on-disk tag still matches the one observed at
read time. Lost races surface as [CatalogError::ConcurrentModification] and
are absorbed by a bounded retry loop that re-reads and re-derives the
mutation. A single-slot snapshot cache short-circuits repeated reads within
a TTL and is cleared by every successful write.
*/

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::commit::{
    check_requirements, evolve_metadata, load_table_metadata, load_view_metadata,
    location_string, next_metadata_version, stage_metadata_file,
};
use super::document::{CatalogDocument, NamespaceEntry, TableEntry, ViewEntry};
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
use crate::util::atomic_write;
use crate::view::View;

/// How long a cached snapshot may be served before it is re-read.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const MAX_WRITE_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// An opaque short string identifying one on-disk state of the catalog file.
/// Writers must present the tag they observed at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct CachedSnapshot {
    document: CatalogDocument,
    tag: VersionTag,
    read_at: Instant,
}

/// The file-backed catalog state store.
pub struct FileCatalog {
    name: String,
    paths: Arc<dyn PathManager>,
    cache: RwLock<Option<CachedSnapshot>>,
    cache_ttl: Duration,
    metrics: CatalogMetrics,
    cancel: CancellationToken,
}

impl FileCatalog {
    /// Open a catalog, bootstrapping an empty document when the file does
    /// not exist yet.
    pub fn open(name: &str, paths: Arc<dyn PathManager>) -> Result<Arc<Self>> {
        Self::open_with(name, paths, DEFAULT_CACHE_TTL, CancellationToken::new())
    }

    /// Open a catalog with an explicit cache TTL and cancellation token.
    /// Operations observe the token cooperatively: the retry loop checks it
    /// between attempts, and staged writes check it before the final rename.
    pub fn open_with(
        name: &str,
        paths: Arc<dyn PathManager>,
        cache_ttl: Duration,
        cancel: CancellationToken,
    ) -> Result<Arc<Self>> {
        if name.is_empty() {
            return Err(CatalogError::validation(
                "catalog_name",
                "catalog name cannot be empty",
            ));
        }
        let catalog = FileCatalog {
            name: name.to_string(),
            paths,
            cache: RwLock::new(None),
            cache_ttl,
            metrics: CatalogMetrics::default(),
            cancel,
        };
        catalog.bootstrap()?;
        Ok(Arc::new(catalog))
    }

    fn bootstrap(&self) -> Result<()> {
        let path = self.paths.catalog_file();
        if !path.exists() {
            let document = CatalogDocument::new(&self.name);
            let json = serde_json::to_string_pretty(&document)?;
            atomic_write(&path, json.as_bytes(), &self.cancel)?;
            debug!(catalog = %self.name, path = %path.display(), "bootstrapped catalog document");
        }
        Ok(())
    }

    /// Derive the version tag for one on-disk state. Size plus nanosecond
    /// mtime identifies a state on any filesystem with sub-second mtime;
    /// without one the bytes are hashed instead.
    fn derive_tag(stat: &fs::Metadata, bytes: &[u8]) -> VersionTag {
        let mtime = stat
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok());
        match mtime {
            Some(mtime) if mtime.subsec_nanos() != 0 => {
                VersionTag(format!("{:x}-{:x}", stat.len(), mtime.as_nanos()))
            }
            _ => VersionTag(format!("{:x}", md5::compute(bytes))),
        }
    }

    fn read_catalog_file(&self) -> Result<(CatalogDocument, VersionTag)> {
        let path = self.paths.catalog_file();
        let bytes = fs::read(&path)?;
        let stat = fs::metadata(&path)?;
        let document: CatalogDocument = serde_json::from_slice(&bytes)?;
        document.validate()?;
        for location in document.metadata_locations() {
            if !Path::new(location).exists() {
                return Err(CatalogError::Internal(format!(
                    "metadata file {location} referenced by the catalog does not exist"
                )));
            }
        }
        Ok((document, Self::derive_tag(&stat, &bytes)))
    }

    /// Read the current document and its version tag, serving the cached
    /// snapshot while it is within the TTL.
    pub fn read_snapshot(&self) -> Result<(CatalogDocument, VersionTag)> {
        {
            let slot = self.cache.read();
            if let Some(cached) = slot.as_ref() {
                if cached.read_at.elapsed() < self.cache_ttl {
                    self.metrics.cache_hit();
                    return Ok((cached.document.clone(), cached.tag.clone()));
                }
            }
        }
        self.metrics.cache_miss();
        let (document, tag) = self.read_catalog_file()?;
        *self.cache.write() = Some(CachedSnapshot {
            document: document.clone(),
            tag: tag.clone(),
            read_at: Instant::now(),
        });
        Ok((document, tag))
    }

    /// Replace the document if the on-disk state still carries `expected`.
    /// In-process writers serialize on the cache slot's write lock; across
    /// processes the tag check plus atomic rename decides the race.
    pub fn write_snapshot(&self, document: &CatalogDocument, expected: &VersionTag) -> Result<()> {
        document.validate()?;
        let path = self.paths.catalog_file();
        let mut slot = self.cache.write();
        let bytes = fs::read(&path)?;
        let stat = fs::metadata(&path)?;
        let actual = Self::derive_tag(&stat, &bytes);
        if actual != *expected {
            return Err(CatalogError::ConcurrentModification {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        let json = serde_json::to_string_pretty(document)?;
        atomic_write(&path, json.as_bytes(), &self.cancel)?;
        *slot = None;
        Ok(())
    }

    fn invalidate_cache(&self) {
        *self.cache.write() = None;
    }

    /// Run a pure mutation against the current document and write the result
    /// under the version-tag protocol. On a lost race the mutation is
    /// re-derived from a fresh read, up to five attempts with linear
    /// backoff. Only [CatalogError::ConcurrentModification] is retried.
    async fn commit_catalog<T, F>(&self, mutate: F) -> Result<T>
    where
        F: Fn(&CatalogDocument) -> Result<(CatalogDocument, T)>,
    {
        let mut attempt: u32 = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }
            let (current, tag) = self.read_snapshot()?;
            let (mut next, value) = mutate(&current)?;
            next.version = current.version + 1;
            next.updated_at = Utc::now();
            match self.write_snapshot(&next, &tag) {
                Ok(()) => return Ok(value),
                Err(err @ CatalogError::ConcurrentModification { .. }) => {
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        return Err(err);
                    }
                    warn!(catalog = %self.name, attempt, "catalog changed concurrently, retrying");
                    self.invalidate_cache();
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.metrics.operation_error();
        }
        result
    }

    async fn create_namespace_inner(
        &self,
        namespace: &Namespace,
        properties: HashMap<String, String>,
    ) -> Result<()> {
        validate_properties(&properties, &[EXISTS_PROPERTY])?;
        let key = namespace.to_string();
        self.commit_catalog(|document| {
            if document.namespaces.contains_key(&key) {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::Namespace,
                    name: key.clone(),
                });
            }
            let mut next = document.clone();
            let now = Utc::now();
            let mut stored = properties.clone();
            stored.insert(EXISTS_PROPERTY.to_string(), "true".to_string());
            next.namespaces.insert(
                key.clone(),
                NamespaceEntry {
                    properties: stored,
                    created_at: now,
                    updated_at: now,
                },
            );
            Ok((next, ()))
        })
        .await?;
        self.metrics.namespace_created();
        debug!(catalog = %self.name, namespace = %namespace, "created namespace");
        Ok(())
    }

    async fn drop_namespace_inner(&self, namespace: &Namespace) -> Result<()> {
        let key = namespace.to_string();
        self.commit_catalog(|document| {
            if !document.namespaces.contains_key(&key) {
                return Err(CatalogError::NoSuchNamespace(key.clone()));
            }
            if !document.namespace_is_empty(&key) {
                return Err(CatalogError::NamespaceNotEmpty(key.clone()));
            }
            let mut next = document.clone();
            next.namespaces.remove(&key);
            Ok((next, ()))
        })
        .await?;
        self.metrics.namespace_dropped();
        debug!(catalog = %self.name, namespace = %namespace, "dropped namespace");
        Ok(())
    }

    fn list_namespaces_inner(&self, parent: Option<&Namespace>) -> Result<Vec<Namespace>> {
        let (document, _) = self.read_snapshot()?;
        let mut namespaces = vec![];
        for key in document.namespaces.keys() {
            let namespace = Namespace::parse(key)?;
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

    fn load_namespace_properties_inner(
        &self,
        namespace: &Namespace,
    ) -> Result<HashMap<String, String>> {
        let key = namespace.to_string();
        let (document, _) = self.read_snapshot()?;
        document
            .namespaces
            .get(&key)
            .map(|entry| entry.properties.clone())
            .ok_or(CatalogError::NoSuchNamespace(key))
    }

    async fn update_namespace_properties_inner(
        &self,
        namespace: &Namespace,
        removals: Vec<String>,
        updates: HashMap<String, String>,
    ) -> Result<PropertiesUpdateSummary> {
        validate_properties(&updates, &[EXISTS_PROPERTY])?;
        for key in &removals {
            validate_property_key(key)?;
        }
        let namespace_key = namespace.to_string();
        self.commit_catalog(|document| {
            let mut next = document.clone();
            let entry = next
                .namespaces
                .get_mut(&namespace_key)
                .ok_or_else(|| CatalogError::NoSuchNamespace(namespace_key.clone()))?;
            let mut summary = PropertiesUpdateSummary::default();
            for key in &removals {
                // the presence marker is never removed through this API
                if key == EXISTS_PROPERTY || entry.properties.remove(key).is_none() {
                    summary.missing.push(key.clone());
                } else {
                    summary.removed.push(key.clone());
                }
            }
            for (key, value) in &updates {
                entry.properties.insert(key.clone(), value.clone());
                summary.updated.push(key.clone());
            }
            entry.updated_at = Utc::now();
            Ok((next, summary))
        })
        .await
    }

    async fn create_table_inner(
        self: Arc<Self>,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table> {
        validate_properties(&options.properties, &[])?;
        let namespace_key = identifier.namespace().to_string();
        let key = identifier.key();

        // fail before staging anything when the entry cannot possibly land
        let (document, _) = self.read_snapshot()?;
        if !document.namespaces.contains_key(&namespace_key) {
            return Err(CatalogError::NoSuchNamespace(namespace_key));
        }
        if document.tables.contains_key(&key) {
            return Err(CatalogError::AlreadyExists {
                kind: EntityKind::Table,
                name: key,
            });
        }

        let location = options
            .location
            .clone()
            .unwrap_or_else(|| location_string(&self.paths.table_dir(identifier)));
        let metadata = TableMetadata::new(location, schema, options.properties);
        let (staged_path, metadata_location) = {
            let mut attempt: u32 = 1;
            loop {
                let version = next_metadata_version(&self.paths.table_metadata_dir(identifier))?;
                let staged_path = self.paths.table_metadata_file(identifier, version);
                match stage_metadata_file(&staged_path, &metadata, &self.cancel) {
                    Ok(()) => {
                        let metadata_location = location_string(&staged_path);
                        break (staged_path, metadata_location);
                    }
                    // a racing creator claimed the version; if its entry has
                    // landed this is a name collision, otherwise pick the
                    // next version and try again
                    Err(err @ CatalogError::ConcurrentModification { .. }) => {
                        self.invalidate_cache();
                        let (document, _) = self.read_snapshot()?;
                        if document.tables.contains_key(&key) {
                            return Err(CatalogError::AlreadyExists {
                                kind: EntityKind::Table,
                                name: key,
                            });
                        }
                        if attempt >= MAX_WRITE_ATTEMPTS {
                            return Err(err);
                        }
                        tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                        attempt += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let swap = self
            .commit_catalog(|document| {
                if !document.namespaces.contains_key(&namespace_key) {
                    return Err(CatalogError::NoSuchNamespace(namespace_key.clone()));
                }
                if document.tables.contains_key(&key) {
                    return Err(CatalogError::AlreadyExists {
                        kind: EntityKind::Table,
                        name: key.clone(),
                    });
                }
                let mut next = document.clone();
                let now = Utc::now();
                next.tables.insert(
                    key.clone(),
                    TableEntry {
                        namespace: namespace_key.clone(),
                        name: identifier.name().to_string(),
                        metadata_location: metadata_location.clone(),
                        previous_metadata_location: None,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok((next, ()))
            })
            .await;
        if let Err(err) = swap {
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

    async fn register_table_inner(
        self: Arc<Self>,
        identifier: &Identifier,
        metadata_location: &str,
    ) -> Result<Table> {
        let metadata = load_table_metadata(metadata_location)?;
        let namespace_key = identifier.namespace().to_string();
        let key = identifier.key();
        self.commit_catalog(|document| {
            if !document.namespaces.contains_key(&namespace_key) {
                return Err(CatalogError::NoSuchNamespace(namespace_key.clone()));
            }
            if document.tables.contains_key(&key) {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::Table,
                    name: key.clone(),
                });
            }
            let mut next = document.clone();
            let now = Utc::now();
            next.tables.insert(
                key.clone(),
                TableEntry {
                    namespace: namespace_key.clone(),
                    name: identifier.name().to_string(),
                    metadata_location: metadata_location.to_string(),
                    previous_metadata_location: None,
                    created_at: now,
                    updated_at: now,
                },
            );
            Ok((next, ()))
        })
        .await?;
        self.metrics.table_created();
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(Table::new(
            identifier.clone(),
            catalog,
            metadata,
            metadata_location,
        ))
    }

    fn table_entry(&self, identifier: &Identifier) -> Result<TableEntry> {
        let key = identifier.key();
        let (document, _) = self.read_snapshot()?;
        document
            .tables
            .get(&key)
            .cloned()
            .ok_or(CatalogError::NoSuchTable(key))
    }

    async fn load_table_inner(self: Arc<Self>, identifier: &Identifier) -> Result<Table> {
        let entry = self.table_entry(identifier)?;
        let metadata = load_table_metadata(&entry.metadata_location)?;
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(Table::new(
            identifier.clone(),
            catalog,
            metadata,
            &entry.metadata_location,
        ))
    }

    async fn drop_table_inner(&self, identifier: &Identifier) -> Result<()> {
        let key = identifier.key();
        self.commit_catalog(|document| {
            if !document.tables.contains_key(&key) {
                return Err(CatalogError::NoSuchTable(key.clone()));
            }
            let mut next = document.clone();
            next.tables.remove(&key);
            Ok((next, ()))
        })
        .await?;
        self.metrics.table_dropped();
        debug!(catalog = %self.name, table = %identifier, "dropped table");
        Ok(())
    }

    async fn rename_table_inner(
        self: Arc<Self>,
        from: &Identifier,
        to: &Identifier,
    ) -> Result<Table> {
        if from.namespace() != to.namespace() {
            return Err(CatalogError::validation(
                "identifier",
                "tables cannot be renamed across namespaces",
            ));
        }
        let from_key = from.key();
        let to_key = to.key();
        self.commit_catalog(|document| {
            if !document.tables.contains_key(&from_key) {
                return Err(CatalogError::NoSuchTable(from_key.clone()));
            }
            if from_key != to_key && document.tables.contains_key(&to_key) {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::Table,
                    name: to_key.clone(),
                });
            }
            let mut next = document.clone();
            let mut entry = next
                .tables
                .remove(&from_key)
                .ok_or_else(|| CatalogError::NoSuchTable(from_key.clone()))?;
            entry.name = to.name().to_string();
            entry.updated_at = Utc::now();
            next.tables.insert(to_key.clone(), entry);
            Ok((next, ()))
        })
        .await?;
        self.load_table_inner(to).await
    }

    fn list_tables_inner(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let key = namespace.to_string();
        let (document, _) = self.read_snapshot()?;
        if !document.namespaces.contains_key(&key) {
            return Err(CatalogError::NoSuchNamespace(key));
        }
        document
            .tables
            .values()
            .filter(|entry| entry.namespace == key)
            .map(|entry| Identifier::from_namespace(namespace.clone(), &entry.name))
            .collect()
    }

    async fn commit_table_inner(
        self: Arc<Self>,
        table: &Table,
        requirements: Vec<TableRequirement>,
        updates: Vec<TableUpdate>,
    ) -> Result<Table> {
        let identifier = table.identifier();
        let key = identifier.key();

        let entry = self.table_entry(identifier)?;
        if entry.metadata_location != table.metadata_location() {
            return Err(CatalogError::ConcurrentModification {
                expected: table.metadata_location().to_string(),
                actual: entry.metadata_location.clone(),
            });
        }
        let current = load_table_metadata(&entry.metadata_location)?;
        check_requirements(&requirements, &current)?;

        if updates.is_empty() {
            let catalog: Arc<dyn Catalog> = self.clone();
            return Ok(Table::new(
                identifier.clone(),
                catalog,
                current,
                &entry.metadata_location,
            ));
        }

        let version = next_metadata_version(&self.paths.table_metadata_dir(identifier))?;
        let staged_path = self.paths.table_metadata_file(identifier, version);
        let new_location = location_string(&staged_path);
        let next_metadata = evolve_metadata(&current, &updates, &new_location)?;
        stage_metadata_file(&staged_path, &next_metadata, &self.cancel)?;

        let old_location = entry.metadata_location.clone();
        let swap = self
            .commit_catalog(|document| {
                let mut next = document.clone();
                let entry = next
                    .tables
                    .get_mut(&key)
                    .ok_or_else(|| CatalogError::NoSuchTable(key.clone()))?;
                if entry.metadata_location != old_location {
                    return Err(CatalogError::ConcurrentModification {
                        expected: old_location.clone(),
                        actual: entry.metadata_location.clone(),
                    });
                }
                entry.previous_metadata_location = Some(old_location.clone());
                entry.metadata_location = new_location.clone();
                entry.updated_at = Utc::now();
                Ok((next, ()))
            })
            .await;
        if let Err(err) = swap {
            let _ = fs::remove_file(&staged_path);
            warn!(catalog = %self.name, table = %identifier, "commit failed, removed staged metadata");
            return Err(err);
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

    async fn create_view_inner(
        self: Arc<Self>,
        identifier: &Identifier,
        sql: &str,
        dialect: &str,
        schema: Schema,
        properties: HashMap<String, String>,
    ) -> Result<View> {
        validate_properties(&properties, &[])?;
        let namespace_key = identifier.namespace().to_string();
        let key = identifier.key();

        let (document, _) = self.read_snapshot()?;
        if !document.namespaces.contains_key(&namespace_key) {
            return Err(CatalogError::NoSuchNamespace(namespace_key));
        }
        if document.views.contains_key(&key) {
            return Err(CatalogError::AlreadyExists {
                kind: EntityKind::View,
                name: key,
            });
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
        let staged_path = self
            .paths
            .view_metadata_file(identifier, sequence, &metadata.view_uuid);
        let metadata_location = location_string(&staged_path);
        stage_metadata_file(&staged_path, &metadata, &self.cancel)?;

        let swap = self
            .commit_catalog(|document| {
                if !document.namespaces.contains_key(&namespace_key) {
                    return Err(CatalogError::NoSuchNamespace(namespace_key.clone()));
                }
                if document.views.contains_key(&key) {
                    return Err(CatalogError::AlreadyExists {
                        kind: EntityKind::View,
                        name: key.clone(),
                    });
                }
                let mut next = document.clone();
                let now = Utc::now();
                next.views.insert(
                    key.clone(),
                    ViewEntry {
                        namespace: namespace_key.clone(),
                        name: identifier.name().to_string(),
                        metadata_location: metadata_location.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok((next, ()))
            })
            .await;
        if let Err(err) = swap {
            let _ = fs::remove_file(&staged_path);
            return Err(err);
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

    async fn load_view_inner(self: Arc<Self>, identifier: &Identifier) -> Result<View> {
        let key = identifier.key();
        let (document, _) = self.read_snapshot()?;
        let entry = document
            .views
            .get(&key)
            .ok_or(CatalogError::NoSuchView(key))?;
        let metadata = load_view_metadata(&entry.metadata_location)?;
        let catalog: Arc<dyn Catalog> = self.clone();
        Ok(View::new(
            identifier.clone(),
            catalog,
            metadata,
            &entry.metadata_location,
        ))
    }

    async fn drop_view_inner(&self, identifier: &Identifier) -> Result<()> {
        let key = identifier.key();
        self.commit_catalog(|document| {
            if !document.views.contains_key(&key) {
                return Err(CatalogError::NoSuchView(key.clone()));
            }
            let mut next = document.clone();
            next.views.remove(&key);
            Ok((next, ()))
        })
        .await?;
        self.metrics.view_dropped();
        debug!(catalog = %self.name, view = %identifier, "dropped view");
        Ok(())
    }

    async fn rename_view_inner(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<View> {
        if from.namespace() != to.namespace() {
            return Err(CatalogError::validation(
                "identifier",
                "views cannot be renamed across namespaces",
            ));
        }
        let from_key = from.key();
        let to_key = to.key();
        self.commit_catalog(|document| {
            if !document.views.contains_key(&from_key) {
                return Err(CatalogError::NoSuchView(from_key.clone()));
            }
            if from_key != to_key && document.views.contains_key(&to_key) {
                return Err(CatalogError::AlreadyExists {
                    kind: EntityKind::View,
                    name: to_key.clone(),
                });
            }
            let mut next = document.clone();
            let mut entry = next
                .views
                .remove(&from_key)
                .ok_or_else(|| CatalogError::NoSuchView(from_key.clone()))?;
            entry.name = to.name().to_string();
            entry.updated_at = Utc::now();
            next.views.insert(to_key.clone(), entry);
            Ok((next, ()))
        })
        .await?;
        self.load_view_inner(to).await
    }

    fn list_views_inner(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let key = namespace.to_string();
        let (document, _) = self.read_snapshot()?;
        if !document.namespaces.contains_key(&key) {
            return Err(CatalogError::NoSuchNamespace(key));
        }
        document
            .views
            .values()
            .filter(|entry| entry.namespace == key)
            .map(|entry| Identifier::from_namespace(namespace.clone(), &entry.name))
            .collect()
    }
}

#[async_trait]
impl Catalog for FileCatalog {
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
        let result = self.create_namespace_inner(namespace, properties).await;
        self.track(result)
    }

    async fn drop_namespace(&self, namespace: &Namespace) -> Result<()> {
        let result = self.drop_namespace_inner(namespace).await;
        self.track(result)
    }

    async fn list_namespaces(&self, parent: Option<&Namespace>) -> Result<Vec<Namespace>> {
        let result = self.list_namespaces_inner(parent);
        self.track(result)
    }

    async fn load_namespace_properties(
        &self,
        namespace: &Namespace,
    ) -> Result<HashMap<String, String>> {
        let result = self.load_namespace_properties_inner(namespace);
        self.track(result)
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Namespace,
        removals: Vec<String>,
        updates: HashMap<String, String>,
    ) -> Result<PropertiesUpdateSummary> {
        let result = self
            .update_namespace_properties_inner(namespace, removals, updates)
            .await;
        self.track(result)
    }

    async fn namespace_exists(&self, namespace: &Namespace) -> Result<bool> {
        let key = namespace.to_string();
        let result = self
            .read_snapshot()
            .map(|(document, _)| document.namespaces.contains_key(&key));
        self.track(result)
    }

    async fn create_table(
        self: Arc<Self>,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table> {
        let result = Arc::clone(&self)
            .create_table_inner(identifier, schema, options)
            .await;
        self.track(result)
    }

    async fn register_table(
        self: Arc<Self>,
        identifier: &Identifier,
        metadata_location: &str,
    ) -> Result<Table> {
        let result = Arc::clone(&self)
            .register_table_inner(identifier, metadata_location)
            .await;
        self.track(result)
    }

    async fn load_table(self: Arc<Self>, identifier: &Identifier) -> Result<Table> {
        let result = Arc::clone(&self).load_table_inner(identifier).await;
        self.track(result)
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        let result = self.drop_table_inner(identifier).await;
        self.track(result)
    }

    async fn rename_table(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<Table> {
        let result = Arc::clone(&self).rename_table_inner(from, to).await;
        self.track(result)
    }

    async fn list_tables(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let result = self.list_tables_inner(namespace);
        self.track(result)
    }

    async fn table_exists(&self, identifier: &Identifier) -> Result<bool> {
        let key = identifier.key();
        let result = self
            .read_snapshot()
            .map(|(document, _)| document.tables.contains_key(&key));
        self.track(result)
    }

    async fn commit_table(
        self: Arc<Self>,
        table: &Table,
        requirements: Vec<TableRequirement>,
        updates: Vec<TableUpdate>,
    ) -> Result<Table> {
        let result = Arc::clone(&self)
            .commit_table_inner(table, requirements, updates)
            .await;
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
        let result = Arc::clone(&self)
            .create_view_inner(identifier, sql, dialect, schema, properties)
            .await;
        self.track(result)
    }

    async fn load_view(self: Arc<Self>, identifier: &Identifier) -> Result<View> {
        let result = Arc::clone(&self).load_view_inner(identifier).await;
        self.track(result)
    }

    async fn drop_view(&self, identifier: &Identifier) -> Result<()> {
        let result = self.drop_view_inner(identifier).await;
        self.track(result)
    }

    async fn rename_view(self: Arc<Self>, from: &Identifier, to: &Identifier) -> Result<View> {
        let result = Arc::clone(&self).rename_view_inner(from, to).await;
        self.track(result)
    }

    async fn list_views(&self, namespace: &Namespace) -> Result<Vec<Identifier>> {
        let result = self.list_views_inner(namespace);
        self.track(result)
    }

    async fn view_exists(&self, identifier: &Identifier) -> Result<bool> {
        let key = identifier.key();
        let result = self
            .read_snapshot()
            .map(|(document, _)| document.views.contains_key(&key));
        self.track(result)
    }
}
