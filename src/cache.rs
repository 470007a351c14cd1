//! Extraction cache keyed by criteria fingerprint.
//!
//! An entry is valid only when both the binary artifact and its JSON
//! descriptor exist. `put` writes the artifact first and the descriptor last,
//! each through a temp-file rename, so an interrupted write leaves no entry.
//! Work on one key is serialized through [`ExtractionStore::lock`].

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::data::model::{Extraction, ExtractionDescriptor};
use crate::error::Result;
use crate::io;

pub const ARTIFACT_FILE: &str = "data.bin";
pub const DESCRIPTOR_FILE: &str = "extraction.json";
pub const LOCK_FILE: &str = ".lock";

const LOCK_POLL: Duration = Duration::from_millis(20);
/// A lock file older than this is left over from a dead process.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Storage for finished extractions.
pub trait ExtractionStore {
    /// Held while an entry is computed and written; released on drop.
    type Lock;

    /// Block until this caller has exclusive access to `key`.
    fn lock(&self, key: &str) -> Result<Self::Lock>;

    /// Whether a complete entry exists for `key`.
    fn has(&self, key: &str) -> bool;

    /// Load the entry for `key`, or `None` if it is absent or incomplete.
    fn get(&self, key: &str) -> Result<Option<Extraction>>;

    /// Store an extraction. An existing complete entry is kept as is.
    /// Concurrent writers of one key must hold its lock.
    fn put(&mut self, key: &str, extraction: &Extraction) -> Result<()>;

    /// Where the artifact for `key` lives (recorded in the descriptor).
    fn artifact_path(&self, key: &str) -> PathBuf;
}

// ---------------------------------------------------------------------------
// Directory-backed store
// ---------------------------------------------------------------------------

/// `<root>/<key>/data.bin` (bincode) plus `<root>/<key>/extraction.json`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn descriptor_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(DESCRIPTOR_FILE)
    }

    /// Read only the JSON descriptor of an entry.
    pub fn descriptor(&self, key: &str) -> Result<Option<ExtractionDescriptor>> {
        if !self.has(key) {
            return Ok(None);
        }
        io::read_json(&self.descriptor_path(key)).map(Some)
    }
}

/// Lock file inside an entry directory, created exclusively and removed on drop.
#[derive(Debug)]
pub struct EntryLock {
    path: PathBuf,
}

impl EntryLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let mut announced = false;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        log::warn!("Removing stale lock {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if !announced {
                        log::info!("Waiting for {}", path.display());
                        announced = true;
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .is_some_and(|age| age > LOCK_STALE_AFTER)
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Could not release lock {}: {e}", self.path.display());
        }
    }
}

impl ExtractionStore for DirectoryStore {
    type Lock = EntryLock;

    fn lock(&self, key: &str) -> Result<EntryLock> {
        fs::create_dir_all(self.entry_dir(key))?;
        EntryLock::acquire(self.entry_dir(key).join(LOCK_FILE))
    }

    fn has(&self, key: &str) -> bool {
        self.artifact_path(key).is_file() && self.descriptor_path(key).is_file()
    }

    fn get(&self, key: &str) -> Result<Option<Extraction>> {
        if !self.has(key) {
            return Ok(None);
        }
        let bytes = fs::read(self.artifact_path(key))?;
        Ok(Some(bincode::deserialize(&bytes)?))
    }

    fn put(&mut self, key: &str, extraction: &Extraction) -> Result<()> {
        if self.has(key) {
            log::info!("Extraction {key} already cached, keeping existing entry");
            return Ok(());
        }
        fs::create_dir_all(self.entry_dir(key))?;
        io::write_bytes(&self.artifact_path(key), &bincode::serialize(extraction)?)?;
        io::write_json(&self.descriptor_path(key), &extraction.descriptor)?;
        Ok(())
    }

    fn artifact_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(ARTIFACT_FILE)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: HashMap<String, Extraction>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExtractionStore for InMemoryStore {
    /// `put` takes `&mut self`, so the borrow checker already serializes writers.
    type Lock = ();

    fn lock(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&self, key: &str) -> Result<Option<Extraction>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, extraction: &Extraction) -> Result<()> {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| extraction.clone());
        Ok(())
    }

    fn artifact_path(&self, key: &str) -> PathBuf {
        Path::new(key).join(ARTIFACT_FILE)
    }
}
