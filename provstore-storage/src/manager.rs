//! Storage-root management
//!
//! Databases live under a configurable root as `<root>/<name>.db`. The
//! manager owns naming, creation, opening, listing, and deletion; the
//! companion `-wal`/`-shm` files belong to the engine and are removed with
//! the database.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use provstore_core::error::{Result, StoreError};

use crate::store::DocumentStore;

/// Valid database names: 1-64 chars of `[A-Za-z0-9_-]`
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding every `<name>.db`
    pub root_dir: PathBuf,

    /// How long a statement waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// Negative cache_size pragma value, in KiB
    pub cache_size_kib: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./data"),
            busy_timeout_ms: 5_000,
            cache_size_kib: 65_536,
        }
    }
}

impl StorageConfig {
    /// Config rooted at `root_dir` with default tuning
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }
}

/// Creates, opens, lists, and deletes named databases under the root
pub struct StorageManager {
    config: StorageConfig,
}

impl StorageManager {
    /// Manager over `config.root_dir`; creates the root if absent
    pub fn new(config: StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.root_dir).map_err(|e| {
            StoreError::Storage(format!(
                "cannot create storage root {}: {e}",
                config.root_dir.display()
            ))
        })?;
        Ok(Self { config })
    }

    /// Absolute path of the named database file
    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.config.root_dir.join(format!("{name}.db")))
    }

    /// True when the named database file exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.database_path(name)?.is_file())
    }

    /// Create a new database, failing if one already exists
    pub fn create(&self, name: &str) -> Result<DocumentStore> {
        let path = self.database_path(name)?;
        if path.exists() {
            return Err(StoreError::DatabaseAlreadyExists(name.to_string()));
        }
        info!(name, path = %path.display(), "creating database");
        let store = DocumentStore::open_at(&path, &self.config)?;
        restrict_permissions(&path);
        Ok(store)
    }

    /// Open an existing database, failing if it does not exist
    pub fn open(&self, name: &str) -> Result<DocumentStore> {
        let path = self.database_path(name)?;
        if !path.is_file() {
            return Err(StoreError::DatabaseNotFound(name.to_string()));
        }
        debug!(name, path = %path.display(), "opening database");
        DocumentStore::open_at(&path, &self.config)
    }

    /// Delete a database and its WAL/SHM companions
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.database_path(name)?;
        if !path.is_file() {
            return Err(StoreError::DatabaseNotFound(name.to_string()));
        }
        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                StoreError::PermissionDenied(format!("delete {}: {e}", path.display()))
            }
            _ => StoreError::Storage(format!("delete {}: {e}", path.display())),
        })?;
        for suffix in ["-wal", "-shm"] {
            let companion = PathBuf::from(format!("{}{suffix}", path.display()));
            if companion.exists() {
                let _ = fs::remove_file(&companion);
            }
        }
        info!(name, "database deleted");
        Ok(())
    }

    /// Names of every database under the root, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.root_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(".db") {
                if NAME_PATTERN.is_match(stem) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "invalid database name {name:?}: expected 1-64 chars of [A-Za-z0-9_-]"
        )))
    }
}

/// Owner read/write only. Best effort outside POSIX.
fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::warn!(path = %path.display(), "cannot restrict permissions: {e}");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provstore_core::ErrorCategory;

    fn manager() -> (tempfile::TempDir, StorageManager) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = StorageManager::new(StorageConfig::new(dir.path())).unwrap();
        (dir, mgr)
    }

    #[test]
    fn create_open_list_delete_lifecycle() {
        let (_dir, mgr) = manager();
        mgr.create("case_files").unwrap();
        assert!(mgr.exists("case_files").unwrap());
        assert_eq!(mgr.list().unwrap(), vec!["case_files".to_string()]);

        mgr.open("case_files").unwrap();
        mgr.delete("case_files").unwrap();
        assert!(!mgr.exists("case_files").unwrap());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let (_dir, mgr) = manager();
        mgr.create("db1").unwrap();
        let err = mgr.create("db1").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DatabaseAlreadyExists);
    }

    #[test]
    fn open_missing_is_rejected() {
        let (_dir, mgr) = manager();
        let err = mgr.open("nope").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DatabaseNotFound);
    }

    #[test]
    fn bad_names_are_rejected() {
        let (_dir, mgr) = manager();
        for bad in ["", "has space", "dot.dot", "a/b", &"x".repeat(65)] {
            assert!(mgr.database_path(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn created_database_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, mgr) = manager();
        mgr.create("secure").unwrap();
        let mode = std::fs::metadata(mgr.database_path("secure").unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
