//! Simulated VM power management.

use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};

use crate::core::backend::{BackendError, ComputeBackend};
use crate::core::config::SimulatorConfig;
use crate::core::context::SimulationContext;
use crate::core::power_state::{OperationKind, PowerState};
use crate::core::random::{sample_uniform, seeded_rng, RandomStream};
use crate::core::record::VmRecord;
use crate::core::store::{SharedStore, StateStore};
use crate::core::timestamp::format_timestamp;
use crate::core::vm_key::VmKey;
use crate::{log_debug, log_info, log_trace};

/// Loads VM record and applies its pending operation if it is due at the current time.
///
/// The record is saved back only if something was resolved.
pub(crate) fn fast_forward(store: &mut dyn StateStore, vm: &VmKey, ctx: &SimulationContext) -> VmRecord {
    let now = ctx.time();
    let mut record = store.load(vm);
    let pending = match record.pending_operation() {
        Some(pending) => pending.clone(),
        None => return record,
    };
    log_trace!(
        ctx,
        "vm {}: checking pending {} due at {}",
        vm,
        pending.op,
        format_timestamp(pending.resolve_at)
    );
    if let Some(op) = record.resolve_pending(now) {
        log_info!(ctx, "vm {}: {} completed, now {}", vm, op, record.power_state());
        store.save(vm, &record);
    }
    record
}

/// Returns the delay after which the operation requested for VM completes.
///
/// The generator is re-created from the VM seed on each request, so a VM always gets the same delay per operation.
fn operation_delay(config: &SimulatorConfig, seed: u32, op: OperationKind) -> Duration {
    let (range, stream) = match op {
        OperationKind::Start => (config.start_delay, RandomStream::StartDelay),
        OperationKind::Deallocate => (config.deallocate_delay, RandomStream::DeallocateDelay),
    };
    let mut rng = seeded_rng(seed, stream);
    let secs = sample_uniform(&mut rng, range);
    Duration::milliseconds((secs * 1000.).round() as i64)
}

/// Simulates power state transitions of VMs.
///
/// Transitions are not driven by timers: a request stores the deadline and the transition is applied by the
/// first access at or after it.
pub struct ComputeSimulator {
    store: SharedStore,
    config: Rc<SimulatorConfig>,
    ctx: SimulationContext,
}

impl ComputeSimulator {
    pub fn new(store: SharedStore, config: Rc<SimulatorConfig>, ctx: SimulationContext) -> Self {
        Self { store, config, ctx }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Returns the power state of VM, completing the pending transition if its time has come.
    pub fn get_power_state(&self, vm: &VmKey) -> PowerState {
        let mut store = self.store.borrow_mut();
        fast_forward(&mut **store, vm, &self.ctx).power_state()
    }

    /// Requests VM start. Completes after 8-15 seconds with default config.
    ///
    /// Repeated request resets the deadline, a request while deallocating supersedes the deallocation.
    pub fn begin_start(&self, vm: &VmKey) {
        self.begin_operation(vm, OperationKind::Start);
    }

    /// Requests VM deallocation. Completes after 5-12 seconds with default config.
    pub fn begin_deallocate(&self, vm: &VmKey) {
        self.begin_operation(vm, OperationKind::Deallocate);
    }

    /// Returns the time of the last completed start.
    ///
    /// Pending transitions are not resolved here, so a VM which has just become running reports its previous start.
    pub fn get_running_since(&self, vm: &VmKey) -> Option<DateTime<Utc>> {
        self.store.borrow_mut().load(vm).last_start()
    }

    fn begin_operation(&self, vm: &VmKey, op: OperationKind) {
        let mut store = self.store.borrow_mut();
        let mut record = fast_forward(&mut **store, vm, &self.ctx);
        if let Some(pending) = record.pending_operation() {
            log_debug!(self.ctx, "vm {}: pending {} is superseded by {}", vm, pending.op, op);
        }
        let delay = operation_delay(&self.config, record.seed(), op);
        let resolve_at = self.ctx.time() + delay;
        record.begin_operation(op, resolve_at);
        store.save(vm, &record);
        log_info!(
            self.ctx,
            "vm {}: {} requested, {} for {:.3}s",
            vm,
            op,
            record.power_state(),
            delay.num_milliseconds() as f64 / 1000.
        );
    }
}

impl ComputeBackend for ComputeSimulator {
    fn get_power_state(&self, vm: &VmKey) -> Result<PowerState, BackendError> {
        Ok(ComputeSimulator::get_power_state(self, vm))
    }

    fn begin_start(&self, vm: &VmKey) -> Result<(), BackendError> {
        ComputeSimulator::begin_start(self, vm);
        Ok(())
    }

    fn begin_deallocate(&self, vm: &VmKey) -> Result<(), BackendError> {
        ComputeSimulator::begin_deallocate(self, vm);
        Ok(())
    }

    fn get_running_since(&self, vm: &VmKey) -> Result<Option<DateTime<Utc>>, BackendError> {
        Ok(ComputeSimulator::get_running_since(self, vm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_deterministic_and_in_range() {
        let config = SimulatorConfig::default();
        for seed in [0, 1, 42, 1 << 30] {
            let start = operation_delay(&config, seed, OperationKind::Start);
            assert_eq!(start, operation_delay(&config, seed, OperationKind::Start));
            assert!(start >= Duration::seconds(8) && start <= Duration::seconds(15));
            let stop = operation_delay(&config, seed, OperationKind::Deallocate);
            assert!(stop >= Duration::seconds(5) && stop <= Duration::seconds(12));
        }
    }
}
