/*!
Resolution of catalog, metadata and data locations.

The core never assembles directory paths by hand; an injected [PathManager]
decides the layout. File names (`v{N}.metadata.json` and
`{NNNNN}-{uuid}.metadata.json`) are the only composition done here.
*/

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::catalog::identifier::Identifier;
use crate::catalog::namespace::Namespace;

/// Produces the locations of the catalog file, metadata directories and data
/// directories. Implementations decide the layout; the store only composes
/// file names inside the directories handed to it.
pub trait PathManager: Send + Sync {
    /// Location of the catalog document.
    fn catalog_file(&self) -> PathBuf;

    /// Directory a namespace's tables live under.
    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf;

    /// Root directory of a table.
    fn table_dir(&self, identifier: &Identifier) -> PathBuf;

    /// Directory a table's metadata files live in.
    fn table_metadata_dir(&self, identifier: &Identifier) -> PathBuf;

    /// Directory a table's data files live in.
    fn table_data_dir(&self, identifier: &Identifier) -> PathBuf;

    /// Root directory of a view.
    fn view_dir(&self, identifier: &Identifier) -> PathBuf;

    /// Directory a view's metadata files live in.
    fn view_metadata_dir(&self, identifier: &Identifier) -> PathBuf;

    /// Path of a table metadata file for the given version.
    fn table_metadata_file(&self, identifier: &Identifier, version: u64) -> PathBuf {
        self.table_metadata_dir(identifier)
            .join(format!("v{version}.metadata.json"))
    }

    /// Path of a view metadata file for the given sequence number and uuid.
    fn view_metadata_file(&self, identifier: &Identifier, sequence: u64, uuid: &Uuid) -> PathBuf {
        self.view_metadata_dir(identifier)
            .join(format!("{sequence:05}-{uuid}.metadata.json"))
    }
}

/// The default layout rooted at a base directory:
/// `<base>/catalog/catalog.json`, `<base>/tables/<ns…>/<name>/{metadata,data}`
/// and `<base>/views/<ns…>/<name>/metadata`.
#[derive(Debug, Clone)]
pub struct FilesystemPathManager {
    base: PathBuf,
}

impl FilesystemPathManager {
    /// Create a path manager rooted at `base`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        FilesystemPathManager {
            base: base.as_ref().to_path_buf(),
        }
    }

    fn namespace_path(&self, root: &str, namespace: &Namespace) -> PathBuf {
        let mut path = self.base.join(root);
        for level in namespace.levels() {
            path.push(level);
        }
        path
    }
}

impl PathManager for FilesystemPathManager {
    fn catalog_file(&self) -> PathBuf {
        self.base.join("catalog").join("catalog.json")
    }

    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.namespace_path("tables", namespace)
    }

    fn table_dir(&self, identifier: &Identifier) -> PathBuf {
        self.namespace_path("tables", identifier.namespace())
            .join(identifier.name())
    }

    fn table_metadata_dir(&self, identifier: &Identifier) -> PathBuf {
        self.table_dir(identifier).join("metadata")
    }

    fn table_data_dir(&self, identifier: &Identifier) -> PathBuf {
        self.table_dir(identifier).join("data")
    }

    fn view_dir(&self, identifier: &Identifier) -> PathBuf {
        self.namespace_path("views", identifier.namespace())
            .join(identifier.name())
    }

    fn view_metadata_dir(&self, identifier: &Identifier) -> PathBuf {
        self.view_dir(identifier).join("metadata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let paths = FilesystemPathManager::new("/wh");
        let identifier = Identifier::parse("sales.eu.orders").unwrap();

        assert_eq!(PathBuf::from("/wh/catalog/catalog.json"), paths.catalog_file());
        assert_eq!(
            PathBuf::from("/wh/tables/sales/eu/orders/metadata"),
            paths.table_metadata_dir(&identifier)
        );
        assert_eq!(
            PathBuf::from("/wh/tables/sales/eu/orders/data"),
            paths.table_data_dir(&identifier)
        );
        assert_eq!(
            PathBuf::from("/wh/views/sales/eu/orders/metadata"),
            paths.view_metadata_dir(&identifier)
        );
    }

    #[test]
    fn test_file_names() {
        let paths = FilesystemPathManager::new("/wh");
        let identifier = Identifier::parse("sales.orders").unwrap();

        assert_eq!(
            PathBuf::from("/wh/tables/sales/orders/metadata/v7.metadata.json"),
            paths.table_metadata_file(&identifier, 7)
        );

        let uuid = Uuid::nil();
        assert_eq!(
            PathBuf::from(format!(
                "/wh/views/sales/orders/metadata/00002-{uuid}.metadata.json"
            )),
            paths.view_metadata_file(&identifier, 2, &uuid)
        );
    }
}
