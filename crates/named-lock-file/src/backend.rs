//! File-based lock backend.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use fd_lock::RwLock;
use named_lock_core::backend::LockBackend;
use named_lock_core::error::{LockError, LockResult};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::name::get_lock_file_name;

/// Builder for file-based lock backend configuration.
pub struct FileLockBackendBuilder {
    directory: Option<PathBuf>,
}

impl FileLockBackendBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self { directory: None }
    }

    /// Sets the directory for lock files.
    ///
    /// The directory will be created if it doesn't exist.
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directory = Some(path.into());
        self
    }

    /// Builds the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is specified or if the directory
    /// cannot be created.
    pub fn build(self) -> LockResult<FileLockBackend> {
        let directory = self.directory.ok_or_else(|| {
            LockError::Configuration("lock directory not specified".to_string())
        })?;

        std::fs::create_dir_all(&directory).map_err(|e| {
            LockError::Configuration(format!(
                "failed to create lock directory '{}': {e}",
                directory.display()
            ))
        })?;

        Ok(FileLockBackend {
            directory,
            held: Mutex::new(HashMap::new()),
        })
    }
}

impl Default for FileLockBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A lock backend using OS-level file locks.
///
/// Each lock name maps to a file in the backend's directory. A held lock is
/// an exclusive lock on that file, kept open until release; closing the file
/// (including when the process dies) frees the lock. Lock files are left in
/// place after release, since deleting them would race with other processes
/// opening the same file.
///
/// # Query side effect
///
/// The OS offers no way to ask whether a file is locked, so
/// [`query`](LockBackend::query) tries to lock the file and drops the lock
/// at once. A grant attempt from another process racing with a query can
/// see contention for that instant, and retries like any other contention.
/// Queries never create lock files.
pub struct FileLockBackend {
    directory: PathBuf,
    /// Open, locked files by lock name.
    held: Mutex<HashMap<String, RwLock<File>>>,
}

impl FileLockBackend {
    /// Returns a new builder for configuring the backend.
    pub fn builder() -> FileLockBackendBuilder {
        FileLockBackendBuilder::new()
    }

    /// Creates a backend using the specified directory.
    pub fn new(directory: impl Into<PathBuf>) -> LockResult<Self> {
        Self::builder().directory(directory).build()
    }

    /// Returns the directory where lock files are stored.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the lock file used for `name`.
    pub fn path(&self, name: &str) -> LockResult<PathBuf> {
        get_lock_file_name(&self.directory, name)
    }

    /// Checks whether any process holds the lock file for `name`.
    ///
    /// Probing takes the file lock for an instant, so a competing grant
    /// attempt at that moment can see contention and retry.
    fn probe(&self, name: &str) -> LockResult<bool> {
        if self.held.lock().contains_key(name) {
            return Ok(true);
        }

        let path = self.path(name)?;
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(open_error(&path, e)),
        };

        let mut lock = RwLock::new(file);
        let locked = match lock.try_write() {
            Ok(_) => false,
            Err(e) if is_contention(&e) => true,
            Err(e) => return Err(LockError::Backend(Box::new(e))),
        };
        Ok(locked)
    }
}

/// Returns true if a non-blocking lock failed because someone holds it.
fn is_contention(error: &io::Error) -> bool {
    // ERROR_LOCK_VIOLATION
    error.kind() == ErrorKind::WouldBlock || (cfg!(windows) && error.raw_os_error() == Some(33))
}

fn open_error(path: &Path, error: io::Error) -> LockError {
    LockError::Backend(Box::new(io::Error::new(
        error.kind(),
        format!("failed to open lock file '{}': {error}", path.display()),
    )))
}

impl LockBackend for FileLockBackend {
    const NAME: &'static str = "file";

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn attempt_grant(&self, name: &str) -> LockResult<bool> {
        if self.held.lock().contains_key(name) {
            return Ok(true);
        }

        let path = self.path(name)?;
        // No truncate: a waiting process must not clobber a held lock file.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| open_error(&path, e))?;

        let mut lock = RwLock::new(file);
        match lock.try_write() {
            // The OS lock lives as long as the file stays open.
            Ok(guard) => std::mem::forget(guard),
            Err(e) if is_contention(&e) => return Ok(false),
            Err(e) => return Err(LockError::Backend(Box::new(e))),
        }

        debug!(lock.path = %path.display(), "lock file acquired");
        self.held.lock().insert(name.to_string(), lock);
        Ok(true)
    }

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn release(&self, name: &str) -> LockResult<bool> {
        let held = self.held.lock().remove(name);
        if held.is_some() {
            // Dropping the file closes it, which releases the lock.
            drop(held);
            return Ok(true);
        }
        Ok(!self.probe(name)?)
    }

    /// Probes the lock file, taking its lock for an instant when it is free.
    #[instrument(skip_all, fields(lock.name = %name))]
    async fn query(&self, name: &str) -> LockResult<bool> {
        self.probe(name)
    }

    async fn close(&self) -> LockResult<()> {
        self.held.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_grant_and_release() {
        let dir = TempDir::new().unwrap();
        let backend = FileLockBackend::new(dir.path()).unwrap();

        assert!(!backend.query("job").await.unwrap());
        assert!(backend.attempt_grant("job").await.unwrap());
        assert!(backend.query("job").await.unwrap());
        assert!(backend.release("job").await.unwrap());
        assert!(!backend.query("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_backend_is_excluded() {
        let dir = TempDir::new().unwrap();
        let a = FileLockBackend::new(dir.path()).unwrap();
        let b = FileLockBackend::new(dir.path()).unwrap();

        assert!(a.attempt_grant("job").await.unwrap());
        assert!(!b.attempt_grant("job").await.unwrap());
        assert!(b.query("job").await.unwrap());
        assert!(!b.release("job").await.unwrap());

        assert!(a.release("job").await.unwrap());
        assert!(b.attempt_grant("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_query_does_not_create_files() {
        let dir = TempDir::new().unwrap();
        let backend = FileLockBackend::new(dir.path()).unwrap();

        assert!(!backend.query("never-used").await.unwrap());
        assert!(!backend.path("never-used").unwrap().exists());
    }

    #[tokio::test]
    async fn test_query_leaves_lock_free() {
        let dir = TempDir::new().unwrap();
        let a = FileLockBackend::new(dir.path()).unwrap();
        let b = FileLockBackend::new(dir.path()).unwrap();

        assert!(a.attempt_grant("job").await.unwrap());
        assert!(a.release("job").await.unwrap());

        for _ in 0..100 {
            assert!(!b.query("job").await.unwrap());
            assert!(a.attempt_grant("job").await.unwrap());
            assert!(b.query("job").await.unwrap());
            assert!(a.release("job").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_close_releases_everything() {
        let dir = TempDir::new().unwrap();
        let a = FileLockBackend::new(dir.path()).unwrap();
        let b = FileLockBackend::new(dir.path()).unwrap();

        assert!(a.attempt_grant("one").await.unwrap());
        assert!(a.attempt_grant("two").await.unwrap());
        a.close().await.unwrap();

        assert!(b.attempt_grant("one").await.unwrap());
        assert!(b.attempt_grant("two").await.unwrap());
    }

    #[test]
    fn test_builder_requires_directory() {
        assert!(matches!(
            FileLockBackend::builder().build(),
            Err(LockError::Configuration(_))
        ));
    }

    #[test]
    fn test_builder_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = FileLockBackend::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(backend.directory(), nested.as_path());
    }
}
