mod chunk_server_handler;
mod client_handler;
pub mod config;
pub mod controller;
pub mod controller_state;
pub mod liveness_monitor;
pub mod selection_policy;
#[cfg(test)]
mod test_support;

pub use controller::{Controller, ControllerSettings};
