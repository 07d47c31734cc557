use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;

use crate::models::Report;

pub const REPORTS_KEY: &str = "dl4all_reports";
pub const SESSION_KEY: &str = "dl4all_user";
/// Ids the remote store is known to hold, recorded on every mirror and sync.
pub const REMOTE_IDS_KEY: &str = "dl4all_remote_ids";

/// Prefix of ids assigned to reports saved locally after a failed remote write.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// String key-value persistence shared by the report cache and the session.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        // Write then rename so a crash never leaves a half-written list behind.
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(staging, path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Locally persisted report list: the offline fallback and merge target.
#[derive(Debug, Clone)]
pub struct ReportCache<S> {
    store: S,
}

impl<S: KeyValueStore> ReportCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Missing or unreadable data yields an empty list.
    pub fn get_reports(&self) -> Vec<Report> {
        let raw = match self.store.get(REPORTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!(%error, "failed to read cached reports");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!(%error, "cached report list is corrupt, treating it as empty");
            Vec::new()
        })
    }

    pub fn save_report(&self, report: &Report) -> anyhow::Result<()> {
        let mut reports = self.get_reports();
        reports.push(report.clone());
        self.save_all_reports(&reports)
    }

    pub fn save_all_reports(&self, reports: &[Report]) -> anyhow::Result<()> {
        let raw = serde_json::to_string(reports)?;
        self.store
            .set(REPORTS_KEY, &raw)
            .context("failed to write the local report cache")
    }

    /// Returns whether a record with this id was present.
    pub fn delete_report(&self, id: &str) -> anyhow::Result<bool> {
        let mut reports = self.get_reports();
        let before = reports.len();
        reports.retain(|report| report.id != id);
        if reports.len() == before {
            return Ok(false);
        }
        self.save_all_reports(&reports)?;
        Ok(true)
    }

    /// Merges a JSON array of reports into the cache. Records whose id is
    /// already known are skipped; returns how many were added.
    pub fn import_reports(&self, json_text: &str) -> anyhow::Result<usize> {
        let incoming: Vec<Report> =
            serde_json::from_str(json_text).context("import file is not a JSON array of reports")?;

        let mut reports = self.get_reports();
        let mut known: HashSet<String> = reports.iter().map(|report| report.id.clone()).collect();
        let mut added = 0usize;

        for report in incoming {
            if known.insert(report.id.clone()) {
                reports.push(report);
                added += 1;
            }
        }

        if added > 0 {
            self.save_all_reports(&reports)?;
        }
        Ok(added)
    }

    /// Ids seen in the last remote snapshot plus those pushed since.
    pub fn remote_ids(&self) -> HashSet<String> {
        match self.store.get(REMOTE_IDS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(%error, "cached remote id list is corrupt, treating it as empty");
                HashSet::new()
            }),
            Ok(None) => HashSet::new(),
            Err(error) => {
                tracing::warn!(%error, "failed to read cached remote ids");
                HashSet::new()
            }
        }
    }

    fn save_remote_ids(&self, ids: &HashSet<String>) -> anyhow::Result<()> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        let raw = serde_json::to_string(&sorted)?;
        self.store
            .set(REMOTE_IDS_KEY, &raw)
            .context("failed to write the remote id list")
    }

    /// Records that the remote store now holds this report.
    pub fn mark_synced(&self, id: &str) -> anyhow::Result<()> {
        let mut ids = self.remote_ids();
        if ids.insert(id.to_string()) {
            self.save_remote_ids(&ids)?;
        }
        Ok(())
    }

    /// Replaces the cache with a remote snapshot.
    ///
    /// Cached reports the remote has never held (fallback saves, imports from
    /// another device) are kept. Reports that were in an earlier snapshot but
    /// are missing from this one were deleted remotely and are dropped.
    pub fn mirror_remote(&self, remote: &[Report]) -> anyhow::Result<()> {
        let previously_remote = self.remote_ids();
        let current: HashSet<String> = remote.iter().map(|report| report.id.clone()).collect();

        let mut reports = remote.to_vec();
        reports.extend(self.get_reports().into_iter().filter(|report| {
            !current.contains(&report.id) && !previously_remote.contains(&report.id)
        }));
        self.save_all_reports(&reports)?;
        self.save_remote_ids(&current)
    }

    /// Cached reports the remote store is not known to hold, oldest first.
    pub fn pending_reports(&self) -> Vec<Report> {
        let remote = self.remote_ids();
        let mut pending: Vec<Report> = self
            .get_reports()
            .into_iter()
            .filter(|report| !remote.contains(&report.id))
            .collect();
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        pending
    }

    pub fn clear_all(&self) -> anyhow::Result<()> {
        self.store
            .remove(REPORTS_KEY)
            .context("failed to clear the local report cache")?;
        self.store
            .remove(REMOTE_IDS_KEY)
            .context("failed to clear the remote id list")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ReportStatus;
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn sample_report(id: &str, team_id: &str, status: ReportStatus, score: u32) -> Report {
        Report {
            id: id.to_string(),
            team_id: team_id.to_string(),
            month: "Jan-26".to_string(),
            week: 1,
            score,
            status,
            submitted_at: Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap(),
        }
    }

    fn cache_with(reports: &[Report]) -> ReportCache<MemoryStore> {
        let cache = ReportCache::new(MemoryStore::default());
        cache.save_all_reports(reports).unwrap();
        cache
    }

    #[test]
    fn missing_and_corrupt_data_read_as_empty() {
        let store = MemoryStore::default();
        let cache = ReportCache::new(store.clone());
        assert!(cache.get_reports().is_empty());

        store.set(REPORTS_KEY, "{not json").unwrap();
        assert!(cache.get_reports().is_empty());
    }

    #[test]
    fn save_report_appends() {
        let cache = cache_with(&[sample_report("a", "02162", ReportStatus::Present, 10)]);
        cache
            .save_report(&sample_report("b", "02496", ReportStatus::Absent, 0))
            .unwrap();

        let ids: Vec<String> = cache.get_reports().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn import_skips_known_ids() {
        let existing = vec![
            sample_report("a", "02162", ReportStatus::Present, 10),
            sample_report("b", "02496", ReportStatus::Present, 20),
        ];
        let cache = cache_with(&existing);

        let mut changed_a = existing[0].clone();
        changed_a.score = 999;
        let incoming = vec![
            changed_a,
            existing[1].clone(),
            sample_report("c", "03101", ReportStatus::NoData, 0),
            sample_report("d", "04101", ReportStatus::Present, 5),
            sample_report("c", "03101", ReportStatus::Present, 77),
        ];
        let json = serde_json::to_string(&incoming).unwrap();

        let added = cache.import_reports(&json).unwrap();
        assert_eq!(added, 2);

        let reports = cache.get_reports();
        assert_eq!(reports.len(), 4);
        let mut ids: Vec<&str> = reports.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        // first copy wins
        assert_eq!(reports.iter().find(|r| r.id == "a").unwrap().score, 10);
        assert_eq!(reports.iter().find(|r| r.id == "c").unwrap().status, ReportStatus::NoData);
    }

    #[test]
    fn import_rejects_malformed_documents() {
        let cache = cache_with(&[]);
        assert!(cache.import_reports("{\"id\": 1}").is_err());
        assert!(cache.get_reports().is_empty());
    }

    #[test]
    fn delete_removes_only_the_target() {
        let existing = vec![
            sample_report("a", "02162", ReportStatus::Present, 10),
            sample_report("b", "02496", ReportStatus::Absent, 0),
            sample_report("c", "03101", ReportStatus::Present, 30),
        ];
        let cache = cache_with(&existing);

        assert!(cache.delete_report("b").unwrap());
        assert!(!cache.delete_report("zzz").unwrap());
        assert_eq!(cache.get_reports(), vec![existing[0].clone(), existing[2].clone()]);
    }

    #[test]
    fn mirroring_keeps_pending_reports() {
        let mut pending = sample_report("local-1", "02162", ReportStatus::Present, 15);
        pending.submitted_at += Duration::hours(1);
        let cache = cache_with(&[]);
        cache
            .mirror_remote(&[
                sample_report("r1", "02496", ReportStatus::Present, 8),
                sample_report("gone", "02162", ReportStatus::Present, 1),
            ])
            .unwrap();
        cache.save_report(&pending).unwrap();

        let remote = vec![sample_report("r1", "02496", ReportStatus::Present, 8)];
        cache.mirror_remote(&remote).unwrap();

        let ids: Vec<String> = cache.get_reports().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r1", "local-1"]);
        assert_eq!(cache.pending_reports(), vec![pending]);
    }

    #[test]
    fn imported_backup_survives_a_remote_mirror() {
        let cache = cache_with(&[]);
        let backup = vec![sample_report("3f2a-other-device", "03101", ReportStatus::Present, 40)];
        let added = cache.import_reports(&serde_json::to_string(&backup).unwrap()).unwrap();
        assert_eq!(added, 1);

        let remote = vec![sample_report("r1", "02496", ReportStatus::Present, 8)];
        cache.mirror_remote(&remote).unwrap();
        cache.mirror_remote(&remote).unwrap();

        let ids: Vec<String> = cache.get_reports().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r1", "3f2a-other-device"]);
        assert_eq!(cache.pending_reports(), backup);
    }

    #[test]
    fn synced_reports_stop_being_pending() {
        let cache = cache_with(&[sample_report("local-1", "02162", ReportStatus::Present, 15)]);
        assert_eq!(cache.pending_reports().len(), 1);

        cache.mark_synced("local-1").unwrap();
        assert!(cache.pending_reports().is_empty());
        assert_eq!(cache.get_reports().len(), 1);

        cache.clear_all().unwrap();
        assert!(cache.remote_ids().is_empty());
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReportCache::new(FileStore::open(dir.path().join("cache")).unwrap());
        let report = sample_report("a", "02162", ReportStatus::Present, 10);

        cache.save_report(&report).unwrap();
        let reopened = ReportCache::new(FileStore::open(dir.path().join("cache")).unwrap());
        assert_eq!(reopened.get_reports(), vec![report]);

        reopened.clear_all().unwrap();
        reopened.clear_all().unwrap();
        assert!(cache.get_reports().is_empty());
    }
}
