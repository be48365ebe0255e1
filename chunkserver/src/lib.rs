pub mod chunk_server;
pub mod chunk_server_state;
mod client_handler;
pub mod config;
mod controller_service;
mod repair_handler;
#[cfg(test)]
mod test_support;

pub use chunk_server::{ChunkServer, ChunkServerSettings};
