#![doc = include_str!("../readme.md")]

pub mod client;
pub mod core;
pub mod extensions;
pub mod log;
pub mod simulation;

pub use colored;
pub use simulation::VmSimulation;
