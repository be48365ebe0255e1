pub mod default_selection_policy;

use crate::controller_state::ControllerState;

pub trait ChunkServerSelectionPolicy {
    fn select_for_store(&self, state: &ControllerState) -> Option<Vec<u32>>;

    fn select_repair_source(
        &self,
        state: &ControllerState,
        chunk_name: &str,
        exclude: Option<u32>,
    ) -> Option<u32>;

    fn select_rereplication_target(&self, state: &ControllerState, chunk_name: &str) -> Option<u32>;
}
