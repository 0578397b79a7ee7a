//! Panel state kept across sessions in `runtime_state.yaml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vmsim::core::timestamp::{format_timestamp, parse_timestamp};

pub const RUNTIME_STATE_FILE: &str = "runtime_state.yaml";

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct RuntimeStateFile {
    #[serde(default)]
    auto_shutdown_snoozed_until: BTreeMap<String, String>,
}

/// Auto-shutdown snoozes of VMs.
pub struct RuntimeState {
    path: PathBuf,
    state: RuntimeStateFile,
}

impl RuntimeState {
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(RUNTIME_STATE_FILE);
        let state = if path.exists() {
            fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| {
                    if content.trim().is_empty() {
                        Ok(RuntimeStateFile::default())
                    } else {
                        serde_yaml::from_str(&content).map_err(anyhow::Error::from)
                    }
                })
                .unwrap_or_else(|e| {
                    log::warn!("failed to load {}: {}", path.display(), e);
                    RuntimeStateFile::default()
                })
        } else {
            RuntimeStateFile::default()
        };
        Self { path, state }
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.state)?;
        fs::write(&self.path, content).with_context(|| format!("failed to save {}", self.path.display()))
    }

    pub fn snoozed_until(&self, vm_key: &str) -> Option<DateTime<Utc>> {
        self.state
            .auto_shutdown_snoozed_until
            .get(vm_key)
            .and_then(|value| parse_timestamp(value))
    }

    /// Returns true if shutdown suggestions for VM are suppressed at `now`.
    pub fn is_snoozed(&self, vm_key: &str, now: DateTime<Utc>) -> bool {
        self.snoozed_until(vm_key).map_or(false, |until| now < until)
    }

    /// Sets or clears the snooze deadline of VM.
    pub fn set_snooze(&mut self, vm_key: &str, until: Option<DateTime<Utc>>) -> Result<()> {
        match until {
            Some(until) => {
                self.state
                    .auto_shutdown_snoozed_until
                    .insert(vm_key.to_string(), format_timestamp(until));
            }
            None => {
                self.state.auto_shutdown_snoozed_until.remove(vm_key);
            }
        }
        self.save()
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.state = RuntimeStateFile::default();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn snooze_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap();
        let until = now + Duration::hours(1);

        let mut state = RuntimeState::load(dir.path());
        assert!(!state.is_snoozed("s/rg/vm", now));
        state.set_snooze("s/rg/vm", Some(until)).unwrap();

        let state = RuntimeState::load(dir.path());
        assert_eq!(state.snoozed_until("s/rg/vm"), Some(until));
        assert!(state.is_snoozed("s/rg/vm", now));
        assert!(!state.is_snoozed("s/rg/vm", until));
        assert!(!state.is_snoozed("s/rg/other", now));
    }

    #[test]
    fn snooze_can_be_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap();
        let mut state = RuntimeState::load(dir.path());
        state.set_snooze("a", Some(now)).unwrap();
        state.set_snooze("b", Some(now)).unwrap();
        state.set_snooze("a", None).unwrap();
        assert_eq!(RuntimeState::load(dir.path()).snoozed_until("a"), None);
        state.clear_all().unwrap();
        assert_eq!(RuntimeState::load(dir.path()).snoozed_until("b"), None);
    }
}
