use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::value::RawValue;

use crate::config::{ConfigPaths, GridVariant, StorageOptions};
use crate::schedule::StoredRecord;

const VALUE_EXTENSION: &str = "json";
const VALUE_TMP_EXTENSION: &str = "json.tmp";

/// Whole-collection persistence for the schedule store.
///
/// Loading never fails: a store that cannot be read loads as empty. Saving
/// reports its error and leaves it to the caller whether to surface it.
pub trait ScheduleBackend {
    fn load(&self) -> Vec<StoredRecord>;
    fn save(&self, records: &[StoredRecord]) -> Result<()>;
}

/// File-backed key-value slot: the value for a key lives at `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    data_dir: Arc<PathBuf>,
    key: Arc<str>,
}

impl StorageHandle {
    pub fn open(data_dir: impl Into<PathBuf>, key: &str) -> Self {
        Self {
            data_dir: Arc::new(data_dir.into()),
            key: Arc::from(key),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn value_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.key, VALUE_EXTENSION))
    }

    pub fn read_raw(&self) -> Result<Option<String>> {
        let path = self.value_path();
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Strict load: a missing key is empty, anything unreadable is an error.
    pub fn try_load(&self) -> Result<Vec<StoredRecord>> {
        match self.read_raw()? {
            Some(raw) if !raw.trim().is_empty() => decode_records(&raw)
                .with_context(|| format!("decoding {}", self.value_path().display())),
            _ => Ok(Vec::new()),
        }
    }

    pub fn try_save(&self, records: &[StoredRecord]) -> Result<()> {
        let json = encode_records(records)?;
        fs::create_dir_all(&*self.data_dir)
            .with_context(|| format!("ensuring data dir {}", self.data_dir.display()))?;
        let final_path = self.value_path();
        let tmp_path = final_path.with_extension(VALUE_TMP_EXTENSION);
        fs::write(&tmp_path, json.as_bytes())
            .with_context(|| format!("writing temporary value {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("atomically replacing {}", final_path.display()))?;
        tracing::debug!(key = %self.key, count = records.len(), "schedules written");
        Ok(())
    }
}

impl ScheduleBackend for StorageHandle {
    fn load(&self) -> Vec<StoredRecord> {
        match self.try_load() {
            Ok(records) => {
                tracing::info!(key = %self.key, count = records.len(), "loaded schedules");
                records
            }
            Err(err) => {
                tracing::warn!(?err, key = %self.key, "stored schedules unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, records: &[StoredRecord]) -> Result<()> {
        self.try_save(records)
    }
}

/// In-process slot holding the serialized blob. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Rc<RefCell<Option<String>>>,
    fail_saves: Rc<Cell<bool>>,
}

impl MemoryBackend {
    pub fn with_contents(raw: &str) -> Self {
        let backend = Self::default();
        backend.slot.replace(Some(raw.to_owned()));
        backend
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    /// Makes every following save fail until switched off again.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }
}

impl ScheduleBackend for MemoryBackend {
    fn load(&self) -> Vec<StoredRecord> {
        let Some(raw) = self.contents() else {
            return Vec::new();
        };
        decode_records(&raw).unwrap_or_else(|err| {
            tracing::warn!(?err, "in-memory schedules unreadable, starting empty");
            Vec::new()
        })
    }

    fn save(&self, records: &[StoredRecord]) -> Result<()> {
        if self.fail_saves.get() {
            bail!("in-memory save rejected");
        }
        let json = encode_records(records)?;
        self.slot.replace(Some(json));
        Ok(())
    }
}

/// Parses a stored collection. The top level must be a JSON array; elements
/// that are not entry-shaped are kept verbatim and never match anything.
pub fn decode_records(raw: &str) -> Result<Vec<StoredRecord>> {
    let items: Vec<Box<RawValue>> =
        serde_json::from_str(raw).context("stored schedules are not a JSON array")?;
    let records = items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            StoredRecord::decode(item).unwrap_or_else(|(err, record)| {
                tracing::warn!(%err, position, "keeping unreadable schedule record as-is");
                record
            })
        })
        .collect();
    Ok(records)
}

pub fn encode_records(records: &[StoredRecord]) -> Result<String> {
    serde_json::to_string(records).context("serialising schedules")
}

pub fn init(
    paths: &ConfigPaths,
    options: &StorageOptions,
    variant: GridVariant,
) -> Result<StorageHandle> {
    let data_dir = if options.data_dir.as_os_str().is_empty() {
        paths.data_dir.clone()
    } else {
        options.data_dir.clone()
    };
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let key = options.key_for(variant);
    let handle = StorageHandle::open(data_dir, &key);
    tracing::info!(path = %handle.value_path().display(), "schedule storage ready");
    Ok(handle)
}
