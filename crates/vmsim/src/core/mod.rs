pub mod backend;
pub mod clock;
pub mod compute;
pub mod config;
pub mod context;
pub mod file_store;
pub mod inactivity;
pub mod metrics;
pub mod power_state;
pub mod random;
pub mod record;
pub mod runtime;
pub mod store;
pub mod telemetry;
pub mod timestamp;
pub mod vm_key;
pub mod window;
