use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use proto::{
    chunk::{chunk_name, parse_chunk_name},
    events::RetrieveChunkResponse,
};
use storage::integrity::hash_bytes;
use utilities::logger::{instrument, trace, warn};

use crate::error::ClientError;

pub struct ChunkJoiner {
    file_name: String,
    no_of_chunks: i32,
    chunks: BTreeMap<i32, Vec<u8>>,
}

impl ChunkJoiner {
    pub fn new(file_name: &str, no_of_chunks: i32) -> Self {
        Self {
            file_name: file_name.to_owned(),
            no_of_chunks,
            chunks: BTreeMap::new(),
        }
    }

    #[instrument(name = "chunk_joiner_join_chunk", skip(self, response), fields(chunk_name = %response.chunk_name))]
    pub fn join_chunk(&mut self, response: RetrieveChunkResponse) -> Result<(), ClientError> {
        let sequence_number = match parse_chunk_name(&response.chunk_name) {
            Some((file_name, sequence_number))
                if file_name == self.file_name && (1..=self.no_of_chunks).contains(&sequence_number) =>
            {
                sequence_number
            }
            _ => {
                warn!("Chunk does not belong to this file, ignoring");
                return Ok(());
            }
        };
        if hash_bytes(&response.chunk) != response.chunk_hash {
            return Err(ClientError::CorruptChunk {
                chunk_name: response.chunk_name,
            });
        }
        trace!(len = response.chunk.len(), "Chunk joined");
        self.chunks.insert(sequence_number, response.chunk);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.len() == self.no_of_chunks.max(0) as usize
    }

    pub fn missing(&self) -> Vec<String> {
        (1..=self.no_of_chunks)
            .filter(|sequence_number| !self.chunks.contains_key(sequence_number))
            .map(|sequence_number| chunk_name(&self.file_name, sequence_number))
            .collect()
    }

    pub fn assemble(self) -> Vec<u8> {
        self.chunks.into_values().flatten().collect()
    }

    pub async fn write_to(self, output_dir: &Path) -> Result<PathBuf, ClientError> {
        let file_name = Path::new(&self.file_name)
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| ClientError::FileNotFound(PathBuf::from(&self.file_name)))?;
        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(file_name);
        tokio::fs::write(&path, self.assemble()).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(name: &str, bytes: &[u8]) -> RetrieveChunkResponse {
        RetrieveChunkResponse {
            chunk_name: name.to_owned(),
            chunk: bytes.to_vec(),
            chunk_hash: hash_bytes(bytes),
        }
    }

    #[test]
    fn hash_mismatch_is_refused() {
        let mut joiner = ChunkJoiner::new("a.txt", 1);
        let mut bad = response("a.txt_chunk1", b"expected");
        bad.chunk = b"tampered".to_vec();
        assert!(matches!(
            joiner.join_chunk(bad),
            Err(ClientError::CorruptChunk { chunk_name }) if chunk_name == "a.txt_chunk1"
        ));
        assert!(!joiner.is_complete());
    }

    #[test]
    fn foreign_chunks_are_ignored_and_gaps_are_listed() {
        let mut joiner = ChunkJoiner::new("a.txt", 3);
        joiner.join_chunk(response("b.txt_chunk1", b"x")).unwrap();
        joiner.join_chunk(response("a.txt_chunk4", b"x")).unwrap();
        joiner.join_chunk(response("a.txt_chunk2", b"middle")).unwrap();
        assert!(!joiner.is_complete());
        assert_eq!(joiner.missing(), vec!["a.txt_chunk1", "a.txt_chunk3"]);
    }

    #[tokio::test]
    async fn assembled_file_lands_in_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut joiner = ChunkJoiner::new("notes.txt", 2);
        joiner.join_chunk(response("notes.txt_chunk2", b" world")).unwrap();
        joiner.join_chunk(response("notes.txt_chunk1", b"hello")).unwrap();
        let path = joiner.write_to(&dir.path().join("out")).await.unwrap();
        assert_eq!(path, dir.path().join("out").join("notes.txt"));
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"hello world");
    }
}
