/*!
Defining the [View] struct that represents a catalog view.
*/

use std::sync::Arc;

use crate::catalog::identifier::Identifier;
use crate::catalog::Catalog;
use crate::model::view_metadata::ViewMetadata;

/// A handle to a view: the identifier, the metadata document the catalog
/// pointed at when the handle was loaded, and the location of that document.
pub struct View {
    identifier: Identifier,
    catalog: Arc<dyn Catalog>,
    metadata: ViewMetadata,
    metadata_location: String,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("identifier", &self.identifier)
            .field("catalog", &self.catalog.name())
            .field("metadata", &self.metadata)
            .field("metadata_location", &self.metadata_location)
            .finish()
    }
}

impl View {
    /// Build a handle from freshly loaded state.
    pub fn new(
        identifier: Identifier,
        catalog: Arc<dyn Catalog>,
        metadata: ViewMetadata,
        metadata_location: &str,
    ) -> Self {
        View {
            identifier,
            catalog,
            metadata,
            metadata_location: metadata_location.to_string(),
        }
    }

    /// The identifier of the view.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The catalog the handle was loaded from.
    pub fn catalog(&self) -> Arc<dyn Catalog> {
        self.catalog.clone()
    }

    /// The metadata document the handle was loaded with.
    pub fn metadata(&self) -> &ViewMetadata {
        &self.metadata
    }

    /// The location of the metadata document the handle was loaded with.
    pub fn metadata_location(&self) -> &str {
        &self.metadata_location
    }

    /// The SQL text of the view's current version.
    pub fn sql(&self) -> Option<&str> {
        self.metadata.sql()
    }

    /// The SQL dialect of the view's current version.
    pub fn dialect(&self) -> Option<&str> {
        self.metadata.dialect()
    }
}
