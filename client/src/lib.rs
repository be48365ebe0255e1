pub mod chunk_joiner;
mod chunkserver_service;
pub mod client;
pub mod command_runner;
pub mod config;
mod controller_service;
pub mod error;
pub mod file_chunker;

pub use client::{Client, ClientSettings};
pub use error::ClientError;
