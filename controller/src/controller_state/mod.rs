pub mod chunk_server_details;
pub mod state_snapshot;

use std::{collections::BTreeMap, net::SocketAddr};

use proto::events::FileInfo;
use rand::Rng;

use chunk_server_details::{ChunkServerRegistration, ClientRegistration};

#[derive(Debug, Default)]
pub struct ControllerState {
    pub chunk_servers: BTreeMap<u32, ChunkServerRegistration>,
    pub clients: BTreeMap<u32, ClientRegistration>,
    pub files: Vec<FileInfo>,
}

impl ControllerState {
    pub fn chunk_server_by_endpoint(&self, endpoint: &SocketAddr) -> Option<&ChunkServerRegistration> {
        self.chunk_servers
            .values()
            .find(|registration| registration.endpoint == *endpoint)
    }

    pub fn chunk_server_by_endpoint_mut(
        &mut self,
        endpoint: &SocketAddr,
    ) -> Option<&mut ChunkServerRegistration> {
        self.chunk_servers
            .values_mut()
            .find(|registration| registration.endpoint == *endpoint)
    }

    pub fn client_by_endpoint(&self, endpoint: &SocketAddr) -> Option<&ClientRegistration> {
        self.clients
            .values()
            .find(|registration| registration.endpoint == *endpoint)
    }

    // latest announcement wins
    pub fn file_info(&self, file_name: &str) -> Option<&FileInfo> {
        self.files.iter().rev().find(|info| info.file_name == file_name)
    }

    pub fn holders_of<'a>(&'a self, chunk_name: &'a str) -> impl Iterator<Item = u32> + 'a {
        self.chunk_servers
            .values()
            .filter(move |registration| registration.holds(chunk_name))
            .map(|registration| registration.id)
    }

    pub fn assign_chunk_server_id(&self, max_nodes: u32) -> Option<u32> {
        random_free_id(max_nodes, |id| self.chunk_servers.contains_key(&id))
    }

    pub fn assign_client_id(&self, max_nodes: u32) -> Option<u32> {
        random_free_id(max_nodes, |id| self.clients.contains_key(&id))
    }
}

fn random_free_id(max_nodes: u32, taken: impl Fn(u32) -> bool) -> Option<u32> {
    if (0..max_nodes).all(&taken) {
        return None;
    }
    let mut rng = rand::thread_rng();
    loop {
        let id = rng.gen_range(0..max_nodes);
        if !taken(id) {
            return Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: u32, port: u16, chunks: &[&str]) -> ChunkServerRegistration {
        let mut registration =
            ChunkServerRegistration::new(id, SocketAddr::from(([127, 0, 0, 1], port)), port as i32);
        registration.replace_chunks(chunks.iter().map(|c| c.to_string()).collect(), 0);
        registration
    }

    #[test]
    fn ids_never_collide_and_run_out() {
        let mut state = ControllerState::default();
        for _ in 0..5 {
            let id = state.assign_chunk_server_id(5).unwrap();
            assert!(id < 5);
            state.chunk_servers.insert(id, registration(id, 4000 + id as u16, &[]));
        }
        assert_eq!(state.chunk_servers.len(), 5);
        assert_eq!(state.assign_chunk_server_id(5), None);
        assert!(state.assign_client_id(5).is_some());
    }

    #[test]
    fn holders_are_listed_by_id() {
        let mut state = ControllerState::default();
        state.chunk_servers.insert(7, registration(7, 4007, &["f_chunk1"]));
        state.chunk_servers.insert(2, registration(2, 4002, &["f_chunk1", "f_chunk2"]));
        state.chunk_servers.insert(4, registration(4, 4004, &["f_chunk2"]));
        assert_eq!(state.holders_of("f_chunk1").collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(
            state
                .chunk_server_by_endpoint(&SocketAddr::from(([127, 0, 0, 1], 4004)))
                .map(|r| r.id),
            Some(4)
        );
    }

    #[test]
    fn latest_file_announcement_wins() {
        let mut state = ControllerState::default();
        for size in [10, 20] {
            state.files.push(FileInfo {
                file_name: "a".into(),
                no_of_chunks: 1,
                file_size: size,
            });
        }
        assert_eq!(state.file_info("a").map(|f| f.file_size), Some(20));
        assert!(state.file_info("b").is_none());
    }
}
