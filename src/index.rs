/*!
Reading of the optional `.ranger/index` bootstrap file.

When present in the working directory, the index names the catalog and where
its document lives, so embedding programs can connect without further
configuration.
*/

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Relative location of the index file inside a working directory.
pub const INDEX_FILE: &str = ".ranger/index";

/// The bootstrap record pointing at a catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogIndex {
    /// Name of the catalog.
    pub catalog_name: String,
    /// URI of the catalog document.
    pub catalog_uri: String,
    /// Free-form connection properties.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Read the index file under `dir`, returning `None` when it does not exist.
pub fn read_index(dir: impl AsRef<Path>) -> Result<Option<CatalogIndex>> {
    let path = dir.as_ref().join(INDEX_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let index = serde_json::from_slice(&bytes)?;
    Ok(Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(None, read_index(dir.path()).unwrap());
    }

    #[test]
    fn test_read_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".ranger")).unwrap();
        fs::write(
            dir.path().join(INDEX_FILE),
            r#"{
                "catalog_name": "ranger",
                "catalog_uri": "/wh/catalog/catalog.json",
                "properties": { "warehouse": "/wh" }
            }"#,
        )
        .unwrap();
        let index = read_index(dir.path()).unwrap().unwrap();
        assert_eq!("ranger", index.catalog_name);
        assert_eq!("/wh/catalog/catalog.json", index.catalog_uri);
        assert_eq!(Some("/wh"), index.properties.get("warehouse").map(String::as_str));
    }

    #[test]
    fn test_malformed_index_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".ranger")).unwrap();
        fs::write(dir.path().join(INDEX_FILE), "not json").unwrap();
        assert!(read_index(dir.path()).is_err());
    }
}
