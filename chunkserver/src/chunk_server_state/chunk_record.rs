use std::{collections::BTreeMap, time::SystemTime};

use proto::chunk::chunk_name;
use storage::integrity::ChunkDigest;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub file_name: String,
    pub sequence_number: i32,
    pub version: i32,
    pub timestamp: SystemTime,
    pub digest: ChunkDigest,
}

impl ChunkRecord {
    pub fn new(file_name: &str, sequence_number: i32, version: i32, digest: ChunkDigest) -> Self {
        Self {
            file_name: file_name.to_owned(),
            sequence_number,
            version,
            timestamp: SystemTime::now(),
            digest,
        }
    }

    pub fn chunk_name(&self) -> String {
        chunk_name(&self.file_name, self.sequence_number)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoredFile {
    pub file_name: String,
    pub chunks: BTreeMap<i32, ChunkRecord>,
}

impl StoredFile {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            chunks: BTreeMap::new(),
        }
    }
}
