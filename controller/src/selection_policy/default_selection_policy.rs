use proto::constants::REPLICATION_FACTOR;

use super::ChunkServerSelectionPolicy;
use crate::controller_state::ControllerState;

#[derive(Debug, Default)]
pub struct DefaultSelectionPolicy;

impl ChunkServerSelectionPolicy for DefaultSelectionPolicy {
    fn select_for_store(&self, state: &ControllerState) -> Option<Vec<u32>> {
        if state.chunk_servers.len() < REPLICATION_FACTOR {
            return None;
        }
        let mut candidates: Vec<_> = state
            .chunk_servers
            .values()
            .map(|registration| (registration.id, registration.free_space))
            .collect();
        // stable sort keeps ascending id among equal free space
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        Some(
            candidates
                .into_iter()
                .take(REPLICATION_FACTOR)
                .map(|(id, _)| id)
                .collect(),
        )
    }

    fn select_repair_source(
        &self,
        state: &ControllerState,
        chunk_name: &str,
        exclude: Option<u32>,
    ) -> Option<u32> {
        state
            .holders_of(chunk_name)
            .find(|id| Some(*id) != exclude)
    }

    fn select_rereplication_target(&self, state: &ControllerState, chunk_name: &str) -> Option<u32> {
        state
            .chunk_servers
            .values()
            .filter(|registration| !registration.holds(chunk_name))
            .fold(None, |best: Option<(u32, i64)>, registration| match best {
                Some((_, free)) if free >= registration.free_space => best,
                _ => Some((registration.id, registration.free_space)),
            })
            .map(|(id, _)| id)
    }
}
