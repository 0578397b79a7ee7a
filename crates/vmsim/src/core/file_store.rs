//! Store which persists VM records in a local YAML file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use crate::core::clock::Clock;
use crate::core::context::SimulationContext;
use crate::core::record::VmRecord;
use crate::core::store::StateStore;
use crate::core::vm_key::VmKey;
use crate::{log_debug, log_error, log_warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_yaml::Error),
}

/// Layout of the state file: `vms` maps VM key text to its record.
///
/// Records are kept as raw values here and converted one by one, so a single bad record does not hide the others.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SimStateFile {
    #[serde(default)]
    vms: BTreeMap<String, Value>,
}

/// Best-effort file-backed store.
///
/// The whole state is read once on open and rewritten on every change. Write failures are logged and the in-memory
/// state stays authoritative.
///
/// Records which can't be decoded are skipped with a warning but written back unchanged, until the VM gets a new
/// record or the store is cleared. A state file which is not valid YAML at all is moved aside to
/// `<name>.yaml.corrupt` and the store starts empty.
pub struct FileStore {
    path: PathBuf,
    records: BTreeMap<String, VmRecord>,
    unreadable: BTreeMap<String, Value>,
    ctx: SimulationContext,
}

impl FileStore {
    /// Opens the store at `path`, creating the parent directory if needed.
    pub fn open<P: AsRef<Path>>(path: P, clock: Rc<dyn Clock>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let mut store = Self {
            path,
            records: BTreeMap::new(),
            unreadable: BTreeMap::new(),
            ctx: SimulationContext::new("store", clock),
        };
        if store.path.exists() {
            store.read_state();
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns keys of records which were present in the state file but could not be decoded.
    pub fn unreadable_keys(&self) -> Vec<String> {
        self.unreadable.keys().cloned().collect()
    }

    fn read_state(&mut self) {
        let parsed = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                if content.trim().is_empty() {
                    Ok(SimStateFile::default())
                } else {
                    serde_yaml::from_str::<SimStateFile>(&content).map_err(|e| e.to_string())
                }
            });
        let file = match parsed {
            Ok(file) => file,
            Err(e) => {
                self.move_aside(&e);
                return;
            }
        };
        for (key, value) in file.vms {
            match serde_yaml::from_value::<VmRecord>(value.clone()) {
                Ok(record) if record.is_consistent() => {
                    self.records.insert(key, record);
                }
                Ok(record) => {
                    log_warn!(
                        self.ctx,
                        "skipping record of vm {}: state {} does not match pending operation {:?}",
                        key,
                        record.power_state(),
                        record.pending_operation()
                    );
                    self.unreadable.insert(key, value);
                }
                Err(e) => {
                    log_warn!(self.ctx, "skipping record of vm {}: {}", key, e);
                    self.unreadable.insert(key, value);
                }
            }
        }
    }

    fn move_aside(&self, reason: &str) {
        let backup = self.path.with_extension("yaml.corrupt");
        match fs::rename(&self.path, &backup) {
            Ok(()) => log_warn!(
                self.ctx,
                "failed to load {}: {}, moved it to {} and starting with empty state",
                self.path.display(),
                reason,
                backup.display()
            ),
            Err(e) => log_error!(
                self.ctx,
                "failed to load {}: {}, and failed to move it aside: {}",
                self.path.display(),
                reason,
                e
            ),
        }
    }

    /// Writes the current state to disk via a temporary file.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut file = SimStateFile {
            vms: self.unreadable.clone(),
        };
        for (key, record) in &self.records {
            file.vms.insert(key.clone(), serde_yaml::to_value(record)?);
        }
        let content = serde_yaml::to_string(&file)?;
        let tmp_path = self.path.with_extension("yaml.tmp");
        fs::write(&tmp_path, content).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            log_error!(self.ctx, "failed to save simulation state: {}", e);
        }
    }
}

impl StateStore for FileStore {
    fn load(&mut self, key: &VmKey) -> VmRecord {
        let key_text = key.to_string();
        if let Some(record) = self.records.get(&key_text) {
            return record.clone();
        }
        // the unreadable record stays on disk until the VM is saved
        if self.unreadable.contains_key(&key_text) {
            return VmRecord::new(key);
        }
        let record = VmRecord::new(key);
        self.records.insert(key_text, record.clone());
        self.persist();
        record
    }

    fn save(&mut self, key: &VmKey, record: &VmRecord) {
        let key_text = key.to_string();
        if self.unreadable.remove(&key_text).is_some() {
            log_debug!(self.ctx, "replacing unreadable record of vm {}", key_text);
        }
        self.records.insert(key_text, record.clone());
        self.persist();
    }

    fn keys(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    fn clear_all(&mut self) {
        self.records.clear();
        self.unreadable.clear();
        self.persist();
    }
}
