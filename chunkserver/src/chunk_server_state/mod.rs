pub mod chunk_record;

use std::collections::{HashMap, HashSet};

use proto::chunk::parse_chunk_name;

use chunk_record::{ChunkRecord, StoredFile};

#[derive(Debug, Default)]
pub struct ChunkServerState {
    pub files: HashMap<String, StoredFile>,
    pub new_chunks: Vec<String>,
    pub pending_repairs: HashSet<String>,
}

impl ChunkServerState {
    pub fn record(&mut self, record: ChunkRecord) -> Option<ChunkRecord> {
        self.files
            .entry(record.file_name.clone())
            .or_insert_with(|| StoredFile::new(&record.file_name))
            .chunks
            .insert(record.sequence_number, record)
    }

    pub fn get(&self, chunk_name: &str) -> Option<&ChunkRecord> {
        let (file_name, sequence_number) = parse_chunk_name(chunk_name)?;
        self.files.get(file_name)?.chunks.get(&sequence_number)
    }

    pub fn get_mut(&mut self, chunk_name: &str) -> Option<&mut ChunkRecord> {
        let (file_name, sequence_number) = parse_chunk_name(chunk_name)?;
        self.files.get_mut(file_name)?.chunks.get_mut(&sequence_number)
    }

    pub fn chunk_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .values()
            .flat_map(|file| file.chunks.values().map(ChunkRecord::chunk_name))
            .collect();
        names.sort();
        names
    }

    pub fn note_new_chunk(&mut self, chunk_name: String) {
        if !self.new_chunks.contains(&chunk_name) {
            self.new_chunks.push(chunk_name);
        }
    }

    pub fn take_new_chunks(&mut self) -> Vec<String> {
        std::mem::take(&mut self.new_chunks)
    }
}

#[cfg(test)]
mod tests {
    use storage::integrity::ChunkDigest;

    use super::*;

    #[test]
    fn records_are_found_by_canonical_name() {
        let mut state = ChunkServerState::default();
        let digest = ChunkDigest::compute(b"abc");
        assert!(state.record(ChunkRecord::new("a.bin", 1, 1, digest.clone())).is_none());
        assert!(state.record(ChunkRecord::new("a.bin", 2, 1, digest.clone())).is_none());
        assert!(state.record(ChunkRecord::new("b.bin", 1, 1, digest.clone())).is_none());

        assert_eq!(state.files.len(), 2);
        assert_eq!(state.get("a.bin_chunk2").map(|r| r.sequence_number), Some(2));
        assert!(state.get("a.bin_chunk3").is_none());
        assert!(state.get("a.bin").is_none());
        assert_eq!(
            state.chunk_names(),
            vec!["a.bin_chunk1", "a.bin_chunk2", "b.bin_chunk1"]
        );
    }

    #[test]
    fn rewriting_a_chunk_replaces_the_record() {
        let mut state = ChunkServerState::default();
        state.record(ChunkRecord::new("a.bin", 1, 1, ChunkDigest::compute(b"old")));
        let previous = state.record(ChunkRecord::new("a.bin", 1, 2, ChunkDigest::compute(b"new")));
        assert_eq!(previous.map(|r| r.version), Some(1));
        assert_eq!(state.get("a.bin_chunk1").map(|r| r.version), Some(2));
        assert_eq!(state.chunk_names().len(), 1);
    }

    #[test]
    fn new_chunks_drain_once() {
        let mut state = ChunkServerState::default();
        state.note_new_chunk("a_chunk1".into());
        state.note_new_chunk("a_chunk1".into());
        state.note_new_chunk("a_chunk2".into());
        assert_eq!(state.take_new_chunks(), vec!["a_chunk1", "a_chunk2"]);
        assert!(state.take_new_chunks().is_empty());
    }
}
