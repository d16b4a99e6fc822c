/*!
Defining the [Table] struct that represents a catalog table.
*/

use std::sync::Arc;

use crate::catalog::identifier::Identifier;
use crate::catalog::Catalog;
use crate::model::metadata::TableMetadata;
use crate::transaction::Transaction;

/// A handle to a table at a point in time: the identifier, the metadata
/// document the catalog pointed at when the handle was loaded, and the
/// location of that document. Commits validate the handle's location against
/// the catalog's current pointer, so a stale handle fails instead of
/// clobbering another writer's commit.
pub struct Table {
    identifier: Identifier,
    catalog: Arc<dyn Catalog>,
    metadata: TableMetadata,
    metadata_location: String,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("identifier", &self.identifier)
            .field("catalog", &self.catalog.name())
            .field("metadata", &self.metadata)
            .field("metadata_location", &self.metadata_location)
            .finish()
    }
}

impl Table {
    /// Build a handle from freshly loaded state.
    pub fn new(
        identifier: Identifier,
        catalog: Arc<dyn Catalog>,
        metadata: TableMetadata,
        metadata_location: &str,
    ) -> Self {
        Table {
            identifier,
            catalog,
            metadata,
            metadata_location: metadata_location.to_string(),
        }
    }

    /// The identifier of the table.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The catalog the handle was loaded from.
    pub fn catalog(&self) -> Arc<dyn Catalog> {
        self.catalog.clone()
    }

    /// The metadata document the handle was loaded with.
    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// The location of the metadata document the handle was loaded with.
    pub fn metadata_location(&self) -> &str {
        &self.metadata_location
    }

    /// Start a transaction against this table.
    pub fn new_transaction(&mut self) -> Transaction {
        Transaction::new(self)
    }
}
