//! Components which plug into the simulator interfaces.

pub mod cloud_backend;
