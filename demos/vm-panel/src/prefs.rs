//! Panel preferences stored in `ui_prefs.yaml`.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use vmsim::core::inactivity::InactivityPolicy;

pub const PREFS_FILE: &str = "ui_prefs.yaml";

/// Period over which runtime is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowChoice {
    /// Uptime of the current run.
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl WindowChoice {
    pub const ALL: [WindowChoice; 5] = [
        WindowChoice::Current,
        WindowChoice::Day,
        WindowChoice::Week,
        WindowChoice::Month,
        WindowChoice::Quarter,
    ];

    /// Returns window length, `None` for the current run.
    pub fn minutes(&self) -> Option<u32> {
        match self {
            WindowChoice::Current => None,
            WindowChoice::Day => Some(1440),
            WindowChoice::Week => Some(10080),
            WindowChoice::Month => Some(43200),
            WindowChoice::Quarter => Some(129600),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WindowChoice::Current => "Current Run",
            WindowChoice::Day => "Last 24 Hours",
            WindowChoice::Week => "Last 7 Days",
            WindowChoice::Month => "Last 30 Days",
            WindowChoice::Quarter => "Last 90 Days",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WindowChoice::Current => "current",
            WindowChoice::Day => "1d",
            WindowChoice::Week => "7d",
            WindowChoice::Month => "30d",
            WindowChoice::Quarter => "90d",
        }
    }
}

impl Display for WindowChoice {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for WindowChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowChoice::ALL
            .iter()
            .find(|choice| choice.code() == s)
            .copied()
            .ok_or_else(|| format!("unknown window {:?}, expected one of current, 1d, 7d, 30d, 90d", s))
    }
}

/// Holds raw preferences parsed from YAML file.
#[derive(Debug, Default, Deserialize)]
struct RawUiPrefs {
    inactivity_monitor_enabled: Option<bool>,
    monitor_window_minutes: Option<u32>,
    cpu_threshold: Option<f64>,
    net_threshold_mb: Option<f64>,
    metrics_window_choice: Option<WindowChoice>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UiPrefs {
    pub inactivity_monitor_enabled: bool,
    pub monitor_window_minutes: u32,
    pub cpu_threshold: f64,
    pub net_threshold_mb: f64,
    pub metrics_window_choice: WindowChoice,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self::from_raw(RawUiPrefs::default())
    }
}

impl UiPrefs {
    fn from_raw(raw: RawUiPrefs) -> Self {
        let policy = InactivityPolicy::default();
        Self {
            inactivity_monitor_enabled: raw.inactivity_monitor_enabled.unwrap_or(false),
            monitor_window_minutes: raw.monitor_window_minutes.unwrap_or(policy.window_minutes),
            cpu_threshold: raw.cpu_threshold.unwrap_or(policy.cpu_threshold),
            net_threshold_mb: raw.net_threshold_mb.unwrap_or(policy.net_threshold_mb),
            metrics_window_choice: raw.metrics_window_choice.unwrap_or(WindowChoice::Current),
        }
    }

    /// Loads preferences from the state directory, merging missing keys with defaults.
    ///
    /// Absent file is created with default values, unreadable file is reported and defaults are used.
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(PREFS_FILE);
        if !path.exists() {
            let prefs = Self::default();
            if let Err(e) = prefs.save(state_dir) {
                log::warn!("{:#}", e);
            }
            return prefs;
        }
        let raw = fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| {
                if content.trim().is_empty() {
                    Ok(RawUiPrefs::default())
                } else {
                    serde_yaml::from_str(&content).map_err(anyhow::Error::from)
                }
            });
        match raw {
            Ok(raw) => Self::from_raw(raw),
            Err(e) => {
                log::warn!("failed to load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = state_dir.join(PREFS_FILE);
        let content = serde_yaml::to_string(self)?;
        fs::write(&path, content).with_context(|| format!("failed to save {}", path.display()))
    }

    pub fn inactivity_policy(&self) -> InactivityPolicy {
        InactivityPolicy {
            window_minutes: self.monitor_window_minutes,
            cpu_threshold: self.cpu_threshold,
            net_threshold_mb: self.net_threshold_mb,
        }
    }
}
