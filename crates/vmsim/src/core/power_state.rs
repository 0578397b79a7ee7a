//! VM power states and in-flight operations.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Power state of virtual machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    #[serde(rename = "PowerState/deallocated")]
    Deallocated,
    #[serde(rename = "PowerState/starting")]
    Starting,
    #[serde(rename = "PowerState/running")]
    Running,
    #[serde(rename = "PowerState/deallocating")]
    Deallocating,
}

impl PowerState {
    /// Returns namespaced state code, e.g. `PowerState/running`.
    pub fn code(&self) -> &'static str {
        match self {
            PowerState::Deallocated => "PowerState/deallocated",
            PowerState::Starting => "PowerState/starting",
            PowerState::Running => "PowerState/running",
            PowerState::Deallocating => "PowerState/deallocating",
        }
    }

    pub fn is_running(&self) -> bool {
        *self == PowerState::Running
    }

    /// Returns true for the transient states which have a pending operation attached.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, PowerState::Starting | PowerState::Deallocating)
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown power state {0:?}")]
pub struct UnknownPowerState(pub String);

impl FromStr for PowerState {
    type Err = UnknownPowerState;

    /// Accepts both namespaced codes and bare names (`running`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("PowerState/").unwrap_or(s);
        match name.to_ascii_lowercase().as_str() {
            "deallocated" => Ok(PowerState::Deallocated),
            "starting" => Ok(PowerState::Starting),
            "running" => Ok(PowerState::Running),
            "deallocating" => Ok(PowerState::Deallocating),
            _ => Err(UnknownPowerState(s.to_string())),
        }
    }
}

/// Kind of power operation. Used both for pending operations and history events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Start,
    Deallocate,
}

impl OperationKind {
    /// Returns fully-qualified operation name as reported by activity log.
    pub fn operation_name(&self) -> &'static str {
        match self {
            OperationKind::Start => "Microsoft.Compute/virtualMachines/start",
            OperationKind::Deallocate => "Microsoft.Compute/virtualMachines/deallocate",
        }
    }

    /// Returns the transient state entered when the operation is requested.
    pub fn transient_state(&self) -> PowerState {
        match self {
            OperationKind::Start => PowerState::Starting,
            OperationKind::Deallocate => PowerState::Deallocating,
        }
    }

    /// Returns the state reached when the operation completes.
    pub fn target_state(&self) -> PowerState {
        match self {
            OperationKind::Start => PowerState::Running,
            OperationKind::Deallocate => PowerState::Deallocated,
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            OperationKind::Start => write!(f, "start"),
            OperationKind::Deallocate => write!(f, "deallocate"),
        }
    }
}

/// Asynchronous transition awaiting resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub op: OperationKind,
    pub resolve_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.resolve_at
    }
}
