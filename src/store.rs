use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::git::GitRemote;

/// Positions inside the last three minutes are stored as "start over".
pub const NEAR_END_MS: u64 = 3 * 60 * 1000;

/// Episode title → elapsed milliseconds, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenRecord {
    entries: Vec<(String, u64)>,
}

impl ListenRecord {
    pub fn get(&self, title: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(stored, _)| stored == title)
            .map(|(_, elapsed)| *elapsed)
    }

    pub fn upsert(&mut self, title: &str, elapsed_ms: u64) {
        match self.entries.iter_mut().find(|(stored, _)| stored == title) {
            Some(entry) => entry.1 = elapsed_ms,
            None => self.entries.push((title.to_string(), elapsed_ms)),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(title, elapsed)| (title.as_str(), *elapsed))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// On-disk layout. The short key names written by older releases are
/// still accepted.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ListenFile {
    #[serde(default, alias = "episodes")]
    episode_titles: Vec<String>,
    #[serde(default, alias = "listen_times")]
    listen_times_ms: Vec<u64>,
}

impl ListenFile {
    fn into_record(self, path: &Path) -> Result<ListenRecord, PersistenceError> {
        if self.episode_titles.len() != self.listen_times_ms.len() {
            return Err(PersistenceError::Malformed {
                path: path.to_path_buf(),
                reason: format!(
                    "{} titles but {} listen times",
                    self.episode_titles.len(),
                    self.listen_times_ms.len()
                ),
            });
        }

        let mut record = ListenRecord::default();
        for (title, elapsed) in self.episode_titles.into_iter().zip(self.listen_times_ms) {
            record.upsert(&title, elapsed);
        }
        Ok(record)
    }

    fn from_record(record: &ListenRecord) -> Self {
        let (episode_titles, listen_times_ms) = record
            .entries()
            .map(|(title, elapsed)| (title.to_string(), elapsed))
            .unzip();
        Self {
            episode_titles,
            listen_times_ms,
        }
    }
}

pub trait ListenBackend {
    fn load(&self) -> Result<ListenRecord, PersistenceError>;
    fn save(&self, record: &ListenRecord) -> Result<(), PersistenceError>;
}

/// `listen_time.json` on the local disk, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct LocalFileBackend {
    path: PathBuf,
}

impl LocalFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "listen_time.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl ListenBackend for LocalFileBackend {
    fn load(&self) -> Result<ListenRecord, PersistenceError> {
        if !self.path.exists() {
            return Ok(ListenRecord::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| PersistenceError::Read {
            path: self.path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(ListenRecord::default());
        }
        let file: ListenFile =
            serde_json::from_str(&raw).map_err(|source| PersistenceError::Json {
                path: self.path.clone(),
                source,
            })?;
        file.into_record(&self.path)
    }

    fn save(&self, record: &ListenRecord) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let payload =
            serde_json::to_vec(&ListenFile::from_record(record)).map_err(|source| {
                PersistenceError::Json {
                    path: self.path.clone(),
                    source,
                }
            })?;

        let temp_path = self.temp_path();
        let result = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(&payload)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(err) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(err));
        }
        debug!(path = %self.path.display(), entries = record.len(), "saved listen times");
        Ok(())
    }
}

/// Local file that is committed and pushed after every save.
#[derive(Debug, Clone)]
pub struct GitBackend {
    local: LocalFileBackend,
    remote: GitRemote,
}

impl GitBackend {
    pub fn new(local: LocalFileBackend, remote: GitRemote) -> Self {
        Self { local, remote }
    }
}

impl ListenBackend for GitBackend {
    fn load(&self) -> Result<ListenRecord, PersistenceError> {
        self.local.load()
    }

    fn save(&self, record: &ListenRecord) -> Result<(), PersistenceError> {
        self.local.save(record)?;
        self.remote.commit_and_push(self.local.path())
    }
}

/// Value written for a stop at `elapsed_ms`. A zero duration means the
/// backend never reported one, so the position is kept as-is.
pub fn stored_position(elapsed_ms: u64, duration_ms: u64) -> u64 {
    if duration_ms > 0 && elapsed_ms > duration_ms.saturating_sub(NEAR_END_MS) {
        0
    } else {
        elapsed_ms
    }
}

pub struct ListenStore {
    backend: Box<dyn ListenBackend>,
    record: ListenRecord,
}

impl ListenStore {
    pub fn open(backend: Box<dyn ListenBackend>) -> Result<Self, PersistenceError> {
        let record = backend.load()?;
        Ok(Self { backend, record })
    }

    /// Re-reads the backend so positions saved elsewhere become visible.
    pub fn refresh(&mut self) -> Result<(), PersistenceError> {
        self.record = self.backend.load()?;
        Ok(())
    }

    pub fn get(&self, title: &str) -> u64 {
        self.record.get(title).unwrap_or(0)
    }

    /// Records a stop and saves before returning. Returns the stored value.
    pub fn put(
        &mut self,
        title: &str,
        elapsed_ms: u64,
        duration_ms: u64,
    ) -> Result<u64, PersistenceError> {
        let stored = stored_position(elapsed_ms, duration_ms);
        self.record.upsert(title, stored);
        self.backend.save(&self.record)?;
        info!(episode = title, elapsed_ms, stored, "listen position saved");
        Ok(stored)
    }

    pub fn record(&self) -> &ListenRecord {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fixture::{RepoPair, git};

    fn store_in(dir: &Path) -> ListenStore {
        let backend = LocalFileBackend::new(dir.join("listen_time.json"));
        ListenStore::open(Box::new(backend)).expect("store opens")
    }

    #[test]
    fn unknown_title_reads_as_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        assert_eq!(store.get("Never Played"), 0);
    }

    #[test]
    fn put_then_get_returns_stored_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());

        let stored = store.put("Episode 1", 120_000, 3_600_000).expect("put");
        assert_eq!(stored, 120_000);
        assert_eq!(store.get("Episode 1"), 120_000);

        store.put("Episode 1", 240_000, 3_600_000).expect("second put");
        assert_eq!(store.get("Episode 1"), 240_000);
        assert_eq!(store.record().len(), 1);
    }

    #[test]
    fn last_three_minutes_reset_to_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());

        assert_eq!(store.put("Finished", 3_500_000, 3_600_000).expect("put"), 0);
        assert_eq!(store.get("Finished"), 0);

        assert_eq!(stored_position(420_000, 600_000), 420_000);
        assert_eq!(stored_position(420_001, 600_000), 0);
        assert_eq!(stored_position(60_000, 120_000), 0);
    }

    #[test]
    fn unknown_duration_keeps_position() {
        assert_eq!(stored_position(5_000, 0), 5_000);
    }

    #[test]
    fn put_is_visible_to_a_later_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = store_in(dir.path());
            store.put("Episode 2", 5_000, 600_000).expect("put");
        }

        let reopened = store_in(dir.path());
        assert_eq!(reopened.get("Episode 2"), 5_000);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        store.put("Episode 1", 1_000, 600_000).expect("put");

        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("listen_time.json")]);
    }

    #[test]
    fn writes_parallel_arrays() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        store.put("A", 1_000, 0).expect("put a");
        store.put("B", 2_000, 0).expect("put b");

        let raw = fs::read_to_string(dir.path().join("listen_time.json")).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["episode_titles"], serde_json::json!(["A", "B"]));
        assert_eq!(value["listen_times_ms"], serde_json::json!([1000, 2000]));
    }

    #[test]
    fn loads_legacy_keys_and_collapses_duplicates() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("listen_time.json"),
            r#"{"episodes": ["A", "B", "A"], "listen_times": [10, 20, 30]}"#,
        )
        .expect("write legacy file");

        let store = store_in(dir.path());
        assert_eq!(store.get("A"), 30);
        assert_eq!(store.get("B"), 20);
        assert_eq!(store.record().len(), 2);
    }

    #[test]
    fn mismatched_arrays_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("listen_time.json");
        fs::write(&path, r#"{"episode_titles": ["A", "B"], "listen_times_ms": [1]}"#)
            .expect("write file");

        let err = LocalFileBackend::new(&path)
            .load()
            .expect_err("lengths differ");
        assert!(matches!(err, PersistenceError::Malformed { .. }), "{err}");
    }

    #[test]
    fn corrupt_json_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("listen_time.json");
        fs::write(&path, "{\"episode_titles\": [").expect("write file");

        let err = LocalFileBackend::new(&path).load().expect_err("corrupt");
        assert!(matches!(err, PersistenceError::Json { .. }), "{err}");
    }

    #[test]
    fn refresh_picks_up_external_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut first = store_in(dir.path());
        let mut second = store_in(dir.path());

        second.put("Shared", 42_000, 0).expect("put");
        assert_eq!(first.get("Shared"), 0);
        first.refresh().expect("refresh");
        assert_eq!(first.get("Shared"), 42_000);
    }

    fn git_store(work: &Path) -> ListenStore {
        let local = LocalFileBackend::new(work.join("listen_time.json"));
        let backend = GitBackend::new(local, GitRemote::new(work));
        ListenStore::open(Box::new(backend)).expect("store opens")
    }

    #[test]
    fn git_backed_put_reaches_the_remote() {
        let repos = RepoPair::new();
        let mut store = git_store(&repos.work);

        store.put("Episode 1", 90_000, 3_600_000).expect("put");

        assert_eq!(repos.remote_head(), repos.work_head());
        let branch = git(&repos.work, &["rev-parse", "--abbrev-ref", "HEAD"]);
        let pushed = git(
            &repos.remote,
            &["show", &format!("{branch}:listen_time.json")],
        );
        let value: serde_json::Value = serde_json::from_str(&pushed).expect("json");
        assert_eq!(value["episode_titles"], serde_json::json!(["Episode 1"]));
        assert_eq!(value["listen_times_ms"], serde_json::json!([90_000]));
    }

    #[test]
    fn git_backed_put_surfaces_push_failure_after_local_save() {
        let repos = RepoPair::new();
        git(&repos.work, &["remote", "remove", "origin"]);
        let mut store = git_store(&repos.work);

        let err = store
            .put("Episode 1", 90_000, 3_600_000)
            .expect_err("push fails");
        assert!(
            matches!(&err, PersistenceError::Git { command, .. } if command == "push"),
            "{err}"
        );

        // The position is kept locally and committed for a later push.
        assert_eq!(git_store(&repos.work).get("Episode 1"), 90_000);
        let subject = git(&repos.work, &["log", "-1", "--format=%s"]);
        assert!(subject.starts_with("Update listen times "), "{subject}");
    }
}
