//! Persistence of VM simulation records.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::core::record::VmRecord;
use crate::core::vm_key::VmKey;

/// Keyed storage of VM records.
///
/// The simulator treats the store as synchronous and authoritative: every operation loads the record,
/// updates it and saves it back, no caching happens on the simulator side.
pub trait StateStore {
    /// Returns the record of specified VM, creating a default one on first access.
    fn load(&mut self, key: &VmKey) -> VmRecord;

    /// Replaces the record of specified VM.
    fn save(&mut self, key: &VmKey, record: &VmRecord);

    /// Returns keys of all known VMs in their text form.
    fn keys(&self) -> Vec<String>;

    /// Removes all records.
    fn clear_all(&mut self);
}

/// Store handle shared by simulator components.
///
/// Each read-resolve-write sequence holds a single mutable borrow, so sequences on one store never interleave.
pub type SharedStore = Rc<RefCell<Box<dyn StateStore>>>;

/// Store which keeps records in memory only.
#[derive(Default)]
pub struct MemoryStore {
    vms: BTreeMap<String, VmRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self, key: &VmKey) -> VmRecord {
        self.vms
            .entry(key.to_string())
            .or_insert_with(|| VmRecord::new(key))
            .clone()
    }

    fn save(&mut self, key: &VmKey, record: &VmRecord) {
        self.vms.insert(key.to_string(), record.clone());
    }

    fn keys(&self) -> Vec<String> {
        self.vms.keys().cloned().collect()
    }

    fn clear_all(&mut self) {
        self.vms.clear();
    }
}
