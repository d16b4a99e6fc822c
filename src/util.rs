use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{CatalogError, Result};

/// Removes a staged file on drop unless it was promoted with [TempFileGuard::keep].
pub(crate) struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        TempFileGuard { path: Some(path) }
    }

    pub(crate) fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}

/// Write `bytes` to `path` by staging a sibling temporary file, flushing it to
/// durable storage, and renaming it over the target. The temporary file is
/// removed on every error path. The parent directory is created if missing.
///
/// The cancellation token is checked between the staged write and the rename;
/// a cancelled write leaves no temporary file behind.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8], cancel: &CancellationToken) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CatalogError::Internal(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CatalogError::Internal(format!("{} has no file name", path.display())))?;
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    let guard = TempFileGuard::new(tmp.clone());

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644))?;
    }

    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }

    fs::rename(&tmp, path)?;
    guard.keep();
    Ok(())
}

/// Like [atomic_write], but claims the target with create-new semantics: the
/// staged file is hard-linked into place and the call fails when the target
/// already exists, so two writers racing on one version number cannot
/// overwrite each other.
pub(crate) fn atomic_write_new(path: &Path, bytes: &[u8], cancel: &CancellationToken) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CatalogError::Internal(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CatalogError::Internal(format!("{} has no file name", path.display())))?;
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    let _guard = TempFileGuard::new(tmp.clone());

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644))?;
    }

    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }

    fs::hard_link(&tmp, path)?;
    // the guard removes the staging link
    Ok(())
}

/// Milliseconds since the unix epoch.
pub(crate) fn timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/doc.json");
        atomic_write(&target, b"{}", &CancellationToken::new()).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.json");
        atomic_write(&target, b"one", &CancellationToken::new()).unwrap();
        atomic_write(&target, b"two", &CancellationToken::new()).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"two");
    }

    #[test]
    fn test_atomic_write_new_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("v1.metadata.json");
        atomic_write_new(&target, b"one", &CancellationToken::new()).unwrap();
        let err = atomic_write_new(&target, b"two", &CancellationToken::new()).unwrap_err();
        match err {
            CatalogError::Io(io) => assert_eq!(std::io::ErrorKind::AlreadyExists, io.kind()),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(fs::read(&target).unwrap(), b"one");
        // no staging links left behind
        assert_eq!(1, fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn test_cancelled_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.json");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = atomic_write(&target, b"{}", &cancel).unwrap_err();
        assert!(matches!(err, CatalogError::Cancelled));
        assert!(!target.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
