//! Backend contract shared by the simulator and the cloud provider client.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::metrics::ActivityEvent;
use crate::core::power_state::PowerState;
use crate::core::telemetry::MetricSeries;
use crate::core::vm_key::VmKey;
use crate::core::window::MetricsQuery;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} is not implemented by this backend")]
    NotImplemented(&'static str),
}

/// Power management of VMs.
pub trait ComputeBackend {
    /// Returns the current power state of VM.
    fn get_power_state(&self, vm: &VmKey) -> Result<PowerState, BackendError>;

    /// Requests VM start. Returns immediately, the VM passes through the starting state.
    fn begin_start(&self, vm: &VmKey) -> Result<(), BackendError>;

    /// Requests VM deallocation. Returns immediately, the VM passes through the deallocating state.
    fn begin_deallocate(&self, vm: &VmKey) -> Result<(), BackendError>;

    /// Returns the time of the last completed start.
    fn get_running_since(&self, vm: &VmKey) -> Result<Option<DateTime<Utc>>, BackendError>;
}

/// Monitoring data of VMs.
pub trait MetricsBackend {
    /// Returns CPU and network series over the query window.
    fn query_metrics(&self, vm: &VmKey, query: &MetricsQuery) -> Result<MetricSeries, BackendError>;

    /// Returns start and deallocate events within `[start, end]` in time order.
    fn list_activity_events(
        &self,
        vm: &VmKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, BackendError>;

    /// Returns powered-on seconds within `[start, end]`.
    fn total_runtime_in_window(
        &self,
        vm: &VmKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, BackendError>;
}
