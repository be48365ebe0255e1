use std::{collections::BTreeMap, time::SystemTime};

use serde::Serialize;

use crate::controller_state::{ControllerState, chunk_server_details::ChunkServerRegistration};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChunkServerSnapshot {
    pub endpoint: String,
    pub host: String,
    pub port: i32,
    pub free_space: i64,
    pub chunks: Vec<String>,
}

impl From<&ChunkServerRegistration> for ChunkServerSnapshot {
    fn from(value: &ChunkServerRegistration) -> Self {
        Self {
            endpoint: value.endpoint.to_string(),
            host: value.host.clone(),
            port: value.port,
            free_space: value.free_space,
            chunks: value.chunks.iter().cloned().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileSnapshot {
    pub file_name: String,
    pub no_of_chunks: i32,
    pub file_size: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ControllerSnapshot {
    pub timestamp: SystemTime,
    pub chunk_servers: BTreeMap<u32, ChunkServerSnapshot>,
    pub clients: BTreeMap<u32, String>,
    pub files: Vec<FileSnapshot>,
}

impl ControllerSnapshot {
    pub fn holders_of(&self, chunk_name: &str) -> Vec<u32> {
        self.chunk_servers
            .iter()
            .filter(|(_, server)| server.chunks.iter().any(|c| c == chunk_name))
            .map(|(id, _)| *id)
            .collect()
    }
}

impl From<&ControllerState> for ControllerSnapshot {
    fn from(value: &ControllerState) -> Self {
        Self {
            timestamp: SystemTime::now(),
            chunk_servers: value
                .chunk_servers
                .iter()
                .map(|(id, registration)| (*id, registration.into()))
                .collect(),
            clients: value
                .clients
                .iter()
                .map(|(id, client)| (*id, client.endpoint.to_string()))
                .collect(),
            files: value
                .files
                .iter()
                .map(|info| FileSnapshot {
                    file_name: info.file_name.clone(),
                    no_of_chunks: info.no_of_chunks,
                    file_size: info.file_size,
                })
                .collect(),
        }
    }
}

// timestamps differ on every round, compare content only
impl PartialEq for ControllerSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.chunk_servers == other.chunk_servers
            && self.clients == other.clients
            && self.files == other.files
    }
}
