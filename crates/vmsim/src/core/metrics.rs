//! Simulated monitoring API: metrics, activity log and runtime accounting.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::backend::{BackendError, MetricsBackend};
use crate::core::compute::fast_forward;
use crate::core::config::SimulatorConfig;
use crate::core::context::SimulationContext;
use crate::core::power_state::OperationKind;
use crate::core::record::VmRecord;
use crate::core::runtime::{total_runtime, SegmentScan};
use crate::core::store::SharedStore;
use crate::core::telemetry::{MetricSeries, TelemetrySynthesizer};
use crate::core::timestamp::format_timestamp;
use crate::core::vm_key::VmKey;
use crate::core::window::{MetricsQuery, TimeWindow};
use crate::{log_debug, log_trace};

/// Entry of VM activity log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    /// Fully-qualified operation name, e.g. `Microsoft.Compute/virtualMachines/start`.
    pub operation: String,
}

impl ActivityEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: OperationKind) -> Self {
        Self {
            timestamp,
            operation: kind.operation_name().to_string(),
        }
    }
}

/// Answers monitoring queries over VM history.
///
/// Every query first fast-forwards pending state, so transitions completed before the query are visible in it.
pub struct MetricsSimulator {
    store: SharedStore,
    config: Rc<SimulatorConfig>,
    ctx: SimulationContext,
}

impl MetricsSimulator {
    pub fn new(store: SharedStore, config: Rc<SimulatorConfig>, ctx: SimulationContext) -> Self {
        Self { store, config, ctx }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    fn current_record(&self, vm: &VmKey) -> VmRecord {
        let mut store = self.store.borrow_mut();
        fast_forward(&mut **store, vm, &self.ctx)
    }

    /// Returns CPU and network series over the query window.
    pub fn query_metrics(&self, vm: &VmKey, query: &MetricsQuery) -> MetricSeries {
        let record = self.current_record(vm);
        let window = query.resolve(self.ctx.time(), self.config.default_window_minutes);
        log_trace!(
            self.ctx,
            "vm {}: metrics for [{}, {}]",
            vm,
            format_timestamp(window.start),
            format_timestamp(window.end)
        );
        TelemetrySynthesizer::new(&self.config, record.seed()).synthesize(record.history(), window)
    }

    /// Returns start and deallocate events within `[start, end]` sorted by time.
    ///
    /// `start` is clamped to the lookback limit, entries with malformed timestamps are skipped.
    pub fn list_activity_events(&self, vm: &VmKey, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ActivityEvent> {
        let record = self.current_record(vm);
        let window = TimeWindow::new(start, end).clamped();
        let mut events = Vec::new();
        for event in record.history() {
            match event.time() {
                Some(time) if window.contains(time) => events.push(ActivityEvent::new(time, event.kind)),
                Some(_) => {}
                None => log_debug!(self.ctx, "vm {}: skipping history entry with bad time {:?}", vm, event.at),
            }
        }
        events.sort_by_key(|event| event.timestamp);
        events
    }

    /// Returns powered-on seconds within `[start, end]`.
    ///
    /// A segment still open while VM is running is counted up to the current time.
    pub fn total_runtime_in_window(&self, vm: &VmKey, start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
        let record = self.current_record(vm);
        let scan = SegmentScan::from_history(record.history());
        if scan.malformed > 0 {
            log_debug!(self.ctx, "vm {}: skipped {} history entries with bad time", vm, scan.malformed);
        }
        if scan.unmatched_deallocations > 0 {
            log_debug!(
                self.ctx,
                "vm {}: ignored {} deallocations without preceding start",
                vm,
                scan.unmatched_deallocations
            );
        }
        let segments = scan.segments(record.power_state(), self.ctx.time());
        total_runtime(&segments, TimeWindow::new(start, end))
    }
}

impl MetricsBackend for MetricsSimulator {
    fn query_metrics(&self, vm: &VmKey, query: &MetricsQuery) -> Result<MetricSeries, BackendError> {
        Ok(MetricsSimulator::query_metrics(self, vm, query))
    }

    fn list_activity_events(
        &self,
        vm: &VmKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, BackendError> {
        Ok(MetricsSimulator::list_activity_events(self, vm, start, end))
    }

    fn total_runtime_in_window(
        &self,
        vm: &VmKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, BackendError> {
        Ok(MetricsSimulator::total_runtime_in_window(self, vm, start, end))
    }
}
