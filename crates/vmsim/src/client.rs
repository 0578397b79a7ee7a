//! Client which hides the selected backend behind the common backend traits.

use chrono::{DateTime, Utc};

use crate::core::backend::{BackendError, ComputeBackend, MetricsBackend};
use crate::core::config::BackendMode;
use crate::core::metrics::ActivityEvent;
use crate::core::power_state::PowerState;
use crate::core::telemetry::MetricSeries;
use crate::core::vm_key::VmKey;
use crate::core::window::MetricsQuery;
use crate::extensions::cloud_backend::CloudBackend;
use crate::simulation::VmSimulation;

/// Entry point used by the presentation layer for all VM operations.
pub struct VmClient {
    mode: BackendMode,
    compute: Box<dyn ComputeBackend>,
    metrics: Box<dyn MetricsBackend>,
}

impl VmClient {
    /// Creates client served by the simulation.
    pub fn simulated(sim: &VmSimulation) -> Self {
        Self {
            mode: BackendMode::Simulated,
            compute: Box::new(sim.compute()),
            metrics: Box::new(sim.metrics()),
        }
    }

    /// Creates client served by the cloud provider.
    pub fn cloud() -> Self {
        Self {
            mode: BackendMode::Cloud,
            compute: Box::new(CloudBackend::new()),
            metrics: Box::new(CloudBackend::new()),
        }
    }

    /// Creates client for the mode, the simulation is used only in simulated mode.
    pub fn from_mode(mode: BackendMode, sim: &VmSimulation) -> Self {
        match mode {
            BackendMode::Simulated => Self::simulated(sim),
            BackendMode::Cloud => Self::cloud(),
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    pub fn get_power_state(&self, vm: &VmKey) -> Result<PowerState, BackendError> {
        self.compute.get_power_state(vm)
    }

    pub fn begin_start(&self, vm: &VmKey) -> Result<(), BackendError> {
        self.compute.begin_start(vm)
    }

    pub fn begin_deallocate(&self, vm: &VmKey) -> Result<(), BackendError> {
        self.compute.begin_deallocate(vm)
    }

    pub fn get_running_since(&self, vm: &VmKey) -> Result<Option<DateTime<Utc>>, BackendError> {
        self.compute.get_running_since(vm)
    }

    pub fn query_metrics(&self, vm: &VmKey, query: &MetricsQuery) -> Result<MetricSeries, BackendError> {
        self.metrics.query_metrics(vm, query)
    }

    pub fn list_activity_events(
        &self,
        vm: &VmKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, BackendError> {
        self.metrics.list_activity_events(vm, start, end)
    }

    pub fn total_runtime_in_window(
        &self,
        vm: &VmKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, BackendError> {
        self.metrics.total_runtime_in_window(vm, start, end)
    }
}
