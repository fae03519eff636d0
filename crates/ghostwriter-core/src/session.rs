//! Per-user session state and its on-disk store.
//!
//! The store is shared by every process pointed at the same work dir.
//! Read-modify-write cycles go through [`SessionStore::lock`], which holds an
//! exclusive lock on a `.lock` sidecar file until the returned
//! [`SessionLease`] is committed or dropped. Saves replace the file
//! atomically via a temp file in the same directory.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::error::CoreError;

/// One user's interaction window.
///
/// Tracks the request counter and cooldown consulted by the
/// [`RateLimiter`](crate::RateLimiter), plus the most recent generation so
/// it can be regenerated later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Successful generation calls since the last cooldown.
    #[builder(default)]
    #[serde(default)]
    pub request_count: u32,

    /// When set and in the future, all generation is refused.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,

    /// Most recent generation result.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_text: Option<String>,
}

impl Session {
    /// Create a fresh session with no requests and no cooldown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the session is inside a cooldown at `now`.
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Persists a [`Session`] as JSON between invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session, or a fresh one if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the file exists but cannot be read.
    /// Returns `CoreError::Session` if the file is not a valid session.
    pub fn load(&self) -> Result<Session, CoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no stored session, starting fresh");
            return Ok(Session::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::Session(format!(
                "failed to parse {}: {e}. Run `ghostwriter reset` to start a new session.",
                self.path.display()
            ))
        })
    }

    /// Save the session, creating parent directories as needed.
    ///
    /// The file is replaced atomically; readers see the old or the new
    /// session, never a partial write.
    pub fn save(&self, session: &Session) -> Result<(), CoreError> {
        let dir = self.state_dir();
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(session)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(std::io::Error::from)?;
        Ok(())
    }

    /// Take exclusive ownership of the stored session.
    ///
    /// Waits for any other holder, in this or another process, to release
    /// it, then loads the current session. Changes made through the lease
    /// are written by [`SessionLease::commit`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the lock file cannot be opened or locked,
    /// plus everything [`load`](Self::load) returns.
    pub async fn lock(&self) -> Result<SessionLease, CoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.lock_blocking())
            .await
            .map_err(|e| CoreError::Session(format!("session lock task failed: {e}")))?
    }

    /// Blocking form of [`lock`](Self::lock).
    pub fn lock_blocking(&self) -> Result<SessionLease, CoreError> {
        std::fs::create_dir_all(self.state_dir())?;
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        debug!(path = %self.path.display(), "session locked");

        let session = self.load()?;
        Ok(SessionLease {
            store: self.clone(),
            session,
            _lock: lock,
        })
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn state_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    /// Remove the stored session. Missing files are not an error.
    pub fn clear(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Exclusive hold on a stored session, released on commit or drop.
///
/// Dropping a lease without committing discards its changes.
#[derive(Debug)]
pub struct SessionLease {
    store: SessionStore,
    session: Session,
    _lock: File,
}

impl SessionLease {
    /// Returns the session as loaded under the lock.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session for modification.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Save the session and release the lock, returning what was saved.
    pub fn commit(self) -> Result<Session, CoreError> {
        self.store.save(&self.session)?;
        Ok(self.session)
    }

    /// Delete the stored session and release the lock.
    pub fn clear(self) -> Result<(), CoreError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_should_build_session_with_defaults() {
        let session = Session::builder().build();
        assert_eq!(session.request_count, 0);
        assert!(session.blocked_until.is_none());
        assert!(session.last_generated_text.is_none());
        assert_eq!(session, Session::new());
    }

    #[test]
    fn test_should_report_blocked_only_before_deadline() {
        let now = Utc::now();
        let session = Session::builder()
            .blocked_until(now + Duration::seconds(10))
            .build();

        assert!(session.is_blocked(now));
        assert!(!session.is_blocked(now + Duration::seconds(10)));
        assert!(!Session::new().is_blocked(now));
    }

    #[test]
    fn test_should_return_fresh_session_when_file_missing() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("session.json"));
        let session = store.load().expect("should load");
        assert_eq!(session, Session::new());
    }

    #[test]
    fn test_should_persist_session_across_loads() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        let session = Session::builder()
            .request_count(3)
            .last_generated_text("A haiku about rain")
            .build();
        store.save(&session).expect("should save");

        let loaded = store.load().expect("should load");
        assert_eq!(loaded, session);

        let raw = std::fs::read_to_string(store.path()).expect("should read");
        assert!(raw.contains("\"requestCount\": 3"));
        assert!(!raw.contains("blockedUntil"));
    }

    #[test]
    fn test_should_reject_corrupt_session_file() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").expect("should write");

        let result = SessionStore::new(&path).load();
        assert!(matches!(result, Err(CoreError::Session(_))));
    }

    #[test]
    fn test_should_clear_missing_and_existing_sessions() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("session.json"));
        store.clear().expect("clearing a missing file should succeed");

        store.save(&Session::new()).expect("should save");
        store.clear().expect("should clear");
        assert!(!store.path().exists());
    }

    #[test]
    fn test_should_leave_no_temp_files_after_save() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("session.json"));

        store.save(&Session::new()).expect("should save");
        store
            .save(&Session::builder().request_count(2).build())
            .expect("should overwrite");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("should list")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
        assert_eq!(store.load().expect("should load").request_count, 2);
    }

    #[test]
    fn test_should_discard_uncommitted_lease() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("session.json"));

        let mut lease = store.lock_blocking().expect("should lock");
        lease.session_mut().request_count = 4;
        drop(lease);
        assert_eq!(store.load().expect("should load").request_count, 0);

        let mut lease = store.lock_blocking().expect("should lock again");
        lease.session_mut().request_count = 4;
        let saved = lease.commit().expect("should commit");
        assert_eq!(saved.request_count, 4);
        assert_eq!(store.load().expect("should load"), saved);
    }

    #[tokio::test]
    async fn test_should_serialize_overlapping_leases() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("session.json"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut lease = store.lock().await.expect("should lock");
                    let seen = lease.session().request_count;
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    lease.session_mut().request_count = seen + 1;
                    lease.commit().expect("should commit");
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("task should finish");
        }

        assert_eq!(store.load().expect("should load").request_count, 8);
    }

    #[test]
    fn test_should_clear_through_lease() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&Session::new()).expect("should save");

        store
            .lock_blocking()
            .expect("should lock")
            .clear()
            .expect("should clear");
        assert!(!store.path().exists());
    }
}
