//! Permission store: the single source of truth for what each role may do.
//!
//! Readers take an `Arc` snapshot of an immutable table; writers build the next
//! table from the current one while holding the write lock and swap it in.
//! A reader therefore sees either the old table or the new one, never a mix,
//! and concurrent edits to different roles cannot drop each other.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{AuthzError, PermissionSet, Role, RolePermissionTable};

/// Process-wide role→permission state.
pub trait PermissionStore: Send + Sync {
    /// Current table as an immutable snapshot.
    fn snapshot(&self) -> Arc<RolePermissionTable>;

    /// Atomically replace the whole table.
    fn replace_all(&self, table: RolePermissionTable);

    /// Replace one role's set, leaving every other role untouched.
    fn replace_for_role(&self, role: Role, permissions: PermissionSet);

    /// Discard all edits and restore the compiled-in defaults.
    fn reset_to_defaults(&self) -> RolePermissionTable;

    fn get_all(&self) -> RolePermissionTable {
        self.snapshot().as_ref().clone()
    }

    fn get_for_role(&self, role: Role) -> PermissionSet {
        self.snapshot().get(role).clone()
    }

    /// Whether the latest mutation reached durable storage.
    /// Stores without durable storage have nothing to lose and report `true`.
    fn persisted(&self) -> bool {
        true
    }
}

impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    fn snapshot(&self) -> Arc<RolePermissionTable> {
        (**self).snapshot()
    }

    fn replace_all(&self, table: RolePermissionTable) {
        (**self).replace_all(table)
    }

    fn replace_for_role(&self, role: Role, permissions: PermissionSet) {
        (**self).replace_for_role(role, permissions)
    }

    fn reset_to_defaults(&self) -> RolePermissionTable {
        (**self).reset_to_defaults()
    }

    fn persisted(&self) -> bool {
        (**self).persisted()
    }
}

/// In-memory store (the default; edits are lost on restart).
#[derive(Debug)]
pub struct InMemoryPermissionStore {
    current: RwLock<Arc<RolePermissionTable>>,
}

impl InMemoryPermissionStore {
    /// Seeded from the compiled-in defaults.
    pub fn new() -> Self {
        Self::with_table(RolePermissionTable::defaults())
    }

    pub fn with_table(table: RolePermissionTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    /// Copy-on-write mutation, serialized by the write lock.
    fn update(&self, f: impl FnOnce(&mut RolePermissionTable)) -> Arc<RolePermissionTable> {
        // The lock only ever guards a complete snapshot, so a poisoned lock is still usable.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = RolePermissionTable::clone(&current);
        f(&mut next);

        let next = Arc::new(next);
        *current = Arc::clone(&next);
        next
    }
}

impl Default for InMemoryPermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn snapshot(&self) -> Arc<RolePermissionTable> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    fn replace_all(&self, table: RolePermissionTable) {
        self.update(|current| *current = table);
    }

    fn replace_for_role(&self, role: Role, permissions: PermissionSet) {
        self.update(|current| current.set(role, permissions));
    }

    fn reset_to_defaults(&self) -> RolePermissionTable {
        let restored = self.update(|current| *current = RolePermissionTable::defaults());
        restored.as_ref().clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File-backed store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed permission table in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid permission table in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: AuthzError,
    },
}

/// Durable store: the in-memory store plus a role-keyed JSON document on disk.
///
/// The document is loaded once at startup and rewritten after every mutation.
/// Memory stays authoritative: a failed write is logged, the edit stands, and
/// [`PermissionStore::persisted`] reports `false` until a later write succeeds.
#[derive(Debug)]
pub struct FilePermissionStore {
    inner: InMemoryPermissionStore,
    path: PathBuf,
    // Keeps mutate+write pairs ordered so the file never lags behind an older edit.
    write_lock: Mutex<()>,
    persisted: AtomicBool,
}

impl FilePermissionStore {
    /// Open the store at `path`. A missing file starts from the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let table = match load_table(&path)? {
            Some(table) => {
                tracing::info!(path = %path.display(), "loaded role permission table");
                table
            }
            None => {
                tracing::info!(
                    path = %path.display(),
                    "no stored role permission table; starting from defaults"
                );
                RolePermissionTable::defaults()
            }
        };

        Ok(Self {
            inner: InMemoryPermissionStore::with_table(table),
            path,
            write_lock: Mutex::new(()),
            persisted: AtomicBool::new(true),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &RolePermissionTable) {
        let ok = match write_table(&self.path, table) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist role permission table");
                false
            }
        };
        self.persisted.store(ok, Ordering::Release);
    }

    fn mutate<T>(&self, f: impl FnOnce(&InMemoryPermissionStore) -> T) -> T {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&self.inner);
        self.persist(&self.inner.snapshot());
        out
    }
}

impl PermissionStore for FilePermissionStore {
    fn snapshot(&self) -> Arc<RolePermissionTable> {
        self.inner.snapshot()
    }

    fn replace_all(&self, table: RolePermissionTable) {
        self.mutate(|inner| inner.replace_all(table))
    }

    fn replace_for_role(&self, role: Role, permissions: PermissionSet) {
        self.mutate(|inner| inner.replace_for_role(role, permissions))
    }

    fn reset_to_defaults(&self) -> RolePermissionTable {
        self.mutate(|inner| inner.reset_to_defaults())
    }

    fn persisted(&self) -> bool {
        self.persisted.load(Ordering::Acquire)
    }
}

fn load_table(path: &Path) -> Result<Option<RolePermissionTable>, PersistError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    RolePermissionTable::from_json(&value)
        .map(Some)
        .map_err(|source| PersistError::Invalid {
            path: path.to_path_buf(),
            source,
        })
}

fn write_table(path: &Path, table: &RolePermissionTable) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = serde_json::to_vec_pretty(table).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    // Write a uniquely named sibling, then rename over the target, so a crash
    // never leaves a truncated document behind.
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
