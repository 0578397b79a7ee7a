//! Accessing simulation time from components.

use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::core::clock::Clock;

/// A facade for accessing the simulation clock from simulation components.
///
/// Each component gets its own context, the context name is used as a log target.
#[derive(Clone)]
pub struct SimulationContext {
    name: String,
    clock: Rc<dyn Clock>,
}

impl SimulationContext {
    pub(crate) fn new(name: &str, clock: Rc<dyn Clock>) -> Self {
        Self {
            name: name.to_owned(),
            clock,
        }
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
