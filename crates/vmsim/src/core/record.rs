//! Per-VM simulation record and its event history.

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::power_state::{OperationKind, PendingOperation, PowerState};
use crate::core::timestamp::{format_timestamp, parse_timestamp};
use crate::core::vm_key::VmKey;

/// Derives the 31-bit random seed of VM from its key.
///
/// The seed is the MD5 digest of the key text taken as a big-endian integer modulo 2^31,
/// so the same VM gets the same simulation across restarts.
pub fn derive_seed(key: &VmKey) -> u32 {
    let digest = md5::compute(key.to_string());
    let value = BigEndian::read_u128(&digest.0);
    (value % (1u128 << 31)) as u32
}

/// Single entry of VM history.
///
/// The timestamp is kept as it was stored: malformed entries must not break queries over the rest of the history,
/// so parsing happens at read time via [`HistoryEvent::time`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub at: String,
}

impl HistoryEvent {
    pub fn new(kind: OperationKind, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            at: format_timestamp(at),
        }
    }

    /// Returns event time or `None` if the stored timestamp can't be parsed.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.at)
    }
}

/// Simulation state of a single VM.
///
/// Created with default values on first access. The power state and the pending operation are changed only by
/// the compute simulator, the history only grows when pending operations are resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmRecord {
    power_state: PowerState,
    seed: u32,
    #[serde(default)]
    last_start_utc: Option<String>,
    #[serde(default)]
    last_stop_utc: Option<String>,
    #[serde(default)]
    pending_operation: Option<PendingOperation>,
    #[serde(default)]
    history: Vec<HistoryEvent>,
}

impl VmRecord {
    /// Creates a deallocated VM record with the seed derived from VM key.
    pub fn new(key: &VmKey) -> Self {
        Self {
            power_state: PowerState::Deallocated,
            seed: derive_seed(key),
            last_start_utc: None,
            last_stop_utc: None,
            pending_operation: None,
            history: Vec::new(),
        }
    }

    /// Replaces the history. Used to import recorded activity.
    pub fn with_history(mut self, history: Vec<HistoryEvent>) -> Self {
        self.history = history;
        self
    }

    /// Sets a settled power state, dropping any pending operation.
    pub fn with_power_state(mut self, state: PowerState) -> Self {
        self.power_state = state;
        self.pending_operation = None;
        self
    }

    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn pending_operation(&self) -> Option<&PendingOperation> {
        self.pending_operation.as_ref()
    }

    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    /// Returns true if VM is in a transient state exactly when it has a pending operation.
    pub fn is_consistent(&self) -> bool {
        self.power_state.is_transitioning() == self.pending_operation.is_some()
    }

    /// Returns the time of the last completed start, if it is set and parseable.
    pub fn last_start(&self) -> Option<DateTime<Utc>> {
        self.last_start_utc.as_deref().and_then(parse_timestamp)
    }

    /// Returns the time of the last completed deallocation, if it is set and parseable.
    pub fn last_stop(&self) -> Option<DateTime<Utc>> {
        self.last_stop_utc.as_deref().and_then(parse_timestamp)
    }

    /// Moves VM to the transient state of `op`, replacing any pending operation.
    pub fn begin_operation(&mut self, op: OperationKind, resolve_at: DateTime<Utc>) {
        self.power_state = op.transient_state();
        self.pending_operation = Some(PendingOperation { op, resolve_at });
    }

    /// Applies the pending operation if its resolution time has come.
    ///
    /// Returns the applied operation, the record is left untouched otherwise.
    pub fn resolve_pending(&mut self, now: DateTime<Utc>) -> Option<OperationKind> {
        let op = match &self.pending_operation {
            Some(pending) if pending.is_due(now) => pending.op,
            _ => return None,
        };
        let event = HistoryEvent::new(op, now);
        match op {
            OperationKind::Start => self.last_start_utc = Some(event.at.clone()),
            OperationKind::Deallocate => self.last_stop_utc = Some(event.at.clone()),
        }
        self.power_state = op.target_state();
        self.history.push(event);
        self.pending_operation = None;
        Some(op)
    }
}
