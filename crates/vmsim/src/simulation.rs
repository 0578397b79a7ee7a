//! Simulation entry point.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use sugars::{rc, refcell};

use crate::core::clock::{Clock, SystemClock};
use crate::core::compute::{fast_forward, ComputeSimulator};
use crate::core::config::SimulatorConfig;
use crate::core::context::SimulationContext;
use crate::core::metrics::MetricsSimulator;
use crate::core::record::VmRecord;
use crate::core::store::{MemoryStore, SharedStore, StateStore};
use crate::core::vm_key::VmKey;
use crate::log_info;

/// Owns the state store, clock and config of VM simulation and creates simulator components.
///
/// Components created from the same simulation share its store, so a start requested via one compute handle
/// is visible to all metrics handles.
pub struct VmSimulation {
    store: SharedStore,
    clock: Rc<dyn Clock>,
    config: Rc<SimulatorConfig>,
    ctx: SimulationContext,
}

impl VmSimulation {
    pub fn new(store: Box<dyn StateStore>, clock: Rc<dyn Clock>, config: SimulatorConfig) -> Self {
        let ctx = SimulationContext::new("simulation", clock.clone());
        Self {
            store: rc!(refcell!(store)),
            clock,
            config: rc!(config),
            ctx,
        }
    }

    /// Creates simulation with in-memory store and wall clock.
    pub fn in_memory(config: SimulatorConfig) -> Self {
        Self::new(Box::new(MemoryStore::new()), rc!(SystemClock), config)
    }

    /// Creates new simulation context with specified name.
    pub fn create_context<S: AsRef<str>>(&self, name: S) -> SimulationContext {
        SimulationContext::new(name.as_ref(), self.clock.clone())
    }

    /// Creates compute simulator component.
    pub fn compute(&self) -> ComputeSimulator {
        ComputeSimulator::new(self.store.clone(), self.config.clone(), self.create_context("compute"))
    }

    /// Creates metrics simulator component.
    pub fn metrics(&self) -> MetricsSimulator {
        MetricsSimulator::new(self.store.clone(), self.config.clone(), self.create_context("metrics"))
    }

    /// Returns snapshot of VM record, with the pending operation resolved if it is due.
    pub fn vm_record(&self, vm: &VmKey) -> VmRecord {
        let mut store = self.store.borrow_mut();
        fast_forward(&mut **store, vm, &self.ctx)
    }

    /// Returns keys of all VMs known to the store.
    pub fn vm_keys(&self) -> Vec<String> {
        self.store.borrow().keys()
    }

    /// Removes all VM records.
    pub fn reset(&self) {
        self.store.borrow_mut().clear_all();
        log_info!(self.ctx, "simulation state cleared");
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
