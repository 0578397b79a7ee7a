//! Placeholder for the real cloud provider backend.

use chrono::{DateTime, Utc};

use crate::core::backend::{BackendError, ComputeBackend, MetricsBackend};
use crate::core::metrics::ActivityEvent;
use crate::core::power_state::PowerState;
use crate::core::telemetry::MetricSeries;
use crate::core::vm_key::VmKey;
use crate::core::window::MetricsQuery;

/// Backend which talks to the cloud provider.
///
/// The provider SDK is not wired in, so every operation reports [`BackendError::NotImplemented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CloudBackend;

impl CloudBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CloudBackend {
    fn get_power_state(&self, _vm: &VmKey) -> Result<PowerState, BackendError> {
        Err(BackendError::NotImplemented("get_power_state"))
    }

    fn begin_start(&self, _vm: &VmKey) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("begin_start"))
    }

    fn begin_deallocate(&self, _vm: &VmKey) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("begin_deallocate"))
    }

    fn get_running_since(&self, _vm: &VmKey) -> Result<Option<DateTime<Utc>>, BackendError> {
        Err(BackendError::NotImplemented("get_running_since"))
    }
}

impl MetricsBackend for CloudBackend {
    fn query_metrics(&self, _vm: &VmKey, _query: &MetricsQuery) -> Result<MetricSeries, BackendError> {
        Err(BackendError::NotImplemented("query_metrics"))
    }

    fn list_activity_events(
        &self,
        _vm: &VmKey,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, BackendError> {
        Err(BackendError::NotImplemented("list_activity_events"))
    }

    fn total_runtime_in_window(
        &self,
        _vm: &VmKey,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<u64, BackendError> {
        Err(BackendError::NotImplemented("total_runtime_in_window"))
    }
}
