/*!
The staging half of the table commit protocol, shared by both store
backends: requirement validation, update application over a metadata copy,
version-number selection and atomic metadata writes.
*/

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::metadata::{MetadataLog, TableMetadata};
use crate::model::view_metadata::ViewMetadata;
use crate::transaction::{TableRequirement, TableUpdate};
use crate::util::{atomic_write_new, timestamp_ms};

lazy_static! {
    static ref METADATA_FILE: Regex = Regex::new(r"^v(?P<version>\d+)\.metadata\.json$").unwrap();
}

/// Check every requirement against the current metadata, surfacing the
/// first failure.
pub(crate) fn check_requirements(
    requirements: &[TableRequirement],
    metadata: &TableMetadata,
) -> Result<()> {
    for requirement in requirements {
        requirement.check(metadata)?;
    }
    Ok(())
}

/// The next metadata version for a table: one past the highest
/// `v{N}.metadata.json` in its metadata directory, 1 when none exist yet.
pub(crate) fn next_metadata_version(metadata_dir: &Path) -> Result<u64> {
    let entries = match fs::read_dir(metadata_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(1),
        Err(err) => return Err(err.into()),
    };
    let mut highest = 0u64;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = METADATA_FILE.captures(name) {
            if let Ok(version) = caps["version"].parse::<u64>() {
                highest = highest.max(version);
            }
        }
    }
    Ok(highest + 1)
}

/// Apply `updates` in order to a deep copy of `current`, refresh
/// `last-updated-ms` and extend the metadata log with the location the copy
/// is about to be written to.
pub(crate) fn evolve_metadata(
    current: &TableMetadata,
    updates: &[TableUpdate],
    new_location: &str,
) -> Result<TableMetadata> {
    let mut next = current.clone();
    for update in updates {
        update.apply(&mut next)?;
    }
    next.last_updated_ms = timestamp_ms();
    next.metadata_log.push(MetadataLog {
        metadata_file: new_location.to_string(),
        timestamp_ms: next.last_updated_ms,
    });
    Ok(next)
}

/// Serialize a metadata document and stage it atomically, claiming the
/// target file name. A concurrent commit that already claimed the same
/// version number surfaces as [crate::error::CatalogError::ConcurrentModification].
pub(crate) fn stage_metadata_file<T: Serialize>(
    path: &Path,
    document: &T,
    cancel: &CancellationToken,
) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    match atomic_write_new(path, json.as_bytes(), cancel) {
        Err(crate::error::CatalogError::Io(err))
            if err.kind() == std::io::ErrorKind::AlreadyExists =>
        {
            Err(crate::error::CatalogError::ConcurrentModification {
                expected: format!("{} unclaimed", location_string(path)),
                actual: "claimed by a concurrent commit".to_string(),
            })
        }
        other => other,
    }
}

/// Read and decode a table metadata document.
pub(crate) fn load_table_metadata(location: &str) -> Result<TableMetadata> {
    let bytes = fs::read(location)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read and decode a view metadata document.
pub(crate) fn load_view_metadata(location: &str) -> Result<ViewMetadata> {
    let bytes = fs::read(location)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The string form of a path, as stored in catalog entries.
pub(crate) fn location_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
