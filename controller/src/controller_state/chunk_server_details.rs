use std::{collections::BTreeSet, net::SocketAddr};

use proto::events::ChunkServerAddress;

#[derive(Debug, Clone)]
pub struct ChunkServerRegistration {
    pub id: u32,
    pub endpoint: SocketAddr,
    pub host: String,
    // no reverse lookup: the textual IP stands in for the hostname
    pub hostname: String,
    pub port: i32,
    pub free_space: i64,
    pub chunks: BTreeSet<String>,
}

impl ChunkServerRegistration {
    pub fn new(id: u32, endpoint: SocketAddr, port: i32) -> Self {
        let host = endpoint.ip().to_string();
        Self {
            id,
            endpoint,
            hostname: host.clone(),
            host,
            port,
            free_space: 0,
            chunks: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> ChunkServerAddress {
        ChunkServerAddress {
            host: self.host.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
        }
    }

    pub fn holds(&self, chunk_name: &str) -> bool {
        self.chunks.contains(chunk_name)
    }

    pub fn replace_chunks(&mut self, chunks: Vec<String>, free_space: i64) {
        self.chunks = chunks.into_iter().collect();
        self.free_space = free_space;
    }

    pub fn add_chunks(&mut self, chunks: Vec<String>, free_space: i64) {
        self.chunks.extend(chunks);
        self.free_space = free_space;
    }
}

#[derive(Debug, Clone)]
pub struct ClientRegistration {
    pub id: u32,
    pub endpoint: SocketAddr,
    pub port: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_replaces_and_minor_adds() {
        let mut registration = ChunkServerRegistration::new(1, "10.0.0.5:41000".parse().unwrap(), 5001);
        assert_eq!(registration.address().host, "10.0.0.5");
        assert_eq!(registration.address().port, 5001);
        assert_eq!(registration.address().hostname, "10.0.0.5");

        registration.replace_chunks(vec!["a_chunk1".into(), "a_chunk2".into()], 100);
        registration.add_chunks(vec!["b_chunk1".into(), "a_chunk1".into()], 90);
        assert_eq!(registration.chunks.len(), 3);
        assert_eq!(registration.free_space, 90);

        registration.replace_chunks(vec!["c_chunk1".into()], 80);
        assert!(registration.holds("c_chunk1"));
        assert!(!registration.holds("a_chunk1"));
    }
}
