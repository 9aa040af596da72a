use std::collections::BTreeMap;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::{
    Mutex,
    MutexGuard,
    PoisonError,
};

use chrono::{
    DateTime,
    Utc,
};
use log::{
    debug,
    info,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::Result;
use crate::fingerprint::Fingerprint;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON file backing the ledger. In-memory only when unset.
    pub path: Option<String>,
    pub session_id: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            path: None,
            session_id: "default".into(),
        }
    }
}

/// What the caller knows about a trace when recording it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerMeta {
    pub label: String,
    pub provider: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub label: String,
    #[serde(default)]
    pub provider: Option<String>,
    pub session_id: String,
    pub added_at: DateTime<Utc>,
}

type LedgerMap = BTreeMap<Fingerprint, LedgerEntry>;

/// Set of fingerprints that were already ingested.
///
/// Every operation runs as one read-modify-write under a single lock. When
/// backed by a file, the file is re-read inside the lock and replaced as a
/// whole (temporary file + rename) on every mutation.
#[derive(Debug)]
pub struct DuplicateLedger {
    path: Option<PathBuf>,
    entries: Mutex<LedgerMap>,
}

impl DuplicateLedger {
    pub fn in_memory() -> Self {
        DuplicateLedger {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Opens (or lazily creates) a ledger persisted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path)?;
        info!("Opened duplicate ledger at {} ({} entries)", path.display(), entries.len());
        Ok(DuplicateLedger {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open(path),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerMap> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the lock and refreshes the in-memory view from disk.
    fn acquire(&self) -> Result<MutexGuard<'_, LedgerMap>> {
        let mut guard = self.lock();
        if let Some(path) = &self.path {
            *guard = load_entries(path)?;
        }
        Ok(guard)
    }

    fn persist(
        &self,
        entries: &LedgerMap,
    ) -> Result<()> {
        match &self.path {
            Some(path) => write_entries(path, entries),
            None => Ok(()),
        }
    }

    pub fn seen(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<bool> {
        let guard = self.acquire()?;
        Ok(guard.contains_key(fingerprint))
    }

    pub fn get(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<LedgerEntry>> {
        let guard = self.acquire()?;
        Ok(guard.get(fingerprint).cloned())
    }

    /// Records a fingerprint, overwriting any previous entry.
    pub fn record(
        &self,
        fingerprint: Fingerprint,
        meta: LedgerMeta,
    ) -> Result<()> {
        let mut guard = self.acquire()?;
        guard.insert(fingerprint, new_entry(meta));
        self.persist(&guard)?;
        debug!("Recorded fingerprint {}", fingerprint);
        Ok(())
    }

    /// Records the fingerprint unless it is already present. Returns the
    /// existing entry in that case. Check and insert happen under one lock.
    pub fn record_if_new(
        &self,
        fingerprint: Fingerprint,
        meta: LedgerMeta,
    ) -> Result<Option<LedgerEntry>> {
        let mut guard = self.acquire()?;
        if let Some(existing) = guard.get(&fingerprint) {
            return Ok(Some(existing.clone()));
        }
        guard.insert(fingerprint, new_entry(meta));
        self.persist(&guard)?;
        debug!("Recorded fingerprint {}", fingerprint);
        Ok(None)
    }

    /// Removes every entry recorded by `session_id` and returns how many
    /// were removed.
    pub fn purge_session(
        &self,
        session_id: &str,
    ) -> Result<usize> {
        let mut guard = self.acquire()?;
        let before = guard.len();
        guard.retain(|_, entry| entry.session_id != session_id);
        let removed = before - guard.len();
        if removed > 0 {
            self.persist(&guard)?;
        }
        info!("Purged {} ledger entries of session '{}'", removed, session_id);
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.acquire()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn new_entry(meta: LedgerMeta) -> LedgerEntry {
    LedgerEntry {
        label: meta.label,
        provider: meta.provider,
        session_id: meta.session_id,
        added_at: Utc::now(),
    }
}

fn load_entries(path: &Path) -> Result<LedgerMap> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }
    let entries = serde_json::from_slice::<LedgerMap>(&bytes)?;
    Ok(entries)
}

fn write_entries(
    path: &Path,
    entries: &LedgerMap,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(entries)?;
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_arrays;

    fn meta(
        label: &str,
        session: &str,
    ) -> LedgerMeta {
        LedgerMeta {
            label: label.into(),
            provider: None,
            session_id: session.into(),
        }
    }

    #[test]
    fn test_in_memory_record_and_purge() {
        let ledger = DuplicateLedger::in_memory();
        let f1 = fingerprint_arrays(&[1.0], &[1.0]);
        let f2 = fingerprint_arrays(&[2.0], &[2.0]);

        assert!(!ledger.seen(&f1).unwrap());
        ledger.record(f1, meta("one", "s1")).unwrap();
        ledger.record(f2, meta("two", "s2")).unwrap();
        assert!(ledger.seen(&f1).unwrap());

        assert_eq!(ledger.purge_session("s1").unwrap(), 1);
        assert!(!ledger.seen(&f1).unwrap());
        assert!(ledger.seen(&f2).unwrap());
        assert_eq!(ledger.purge_session("nope").unwrap(), 0);
    }

    #[test]
    fn test_record_if_new_returns_existing() {
        let ledger = DuplicateLedger::in_memory();
        let f = fingerprint_arrays(&[1.0, 2.0], &[1.0, 2.0]);
        assert!(ledger.record_if_new(f, meta("first", "s")).unwrap().is_none());
        let existing = ledger.record_if_new(f, meta("second", "s")).unwrap().unwrap();
        assert_eq!(existing.label, "first");
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(DuplicateLedger::open(&path).is_err());
    }
}
