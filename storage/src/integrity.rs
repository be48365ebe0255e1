//! Per-slice and whole-chunk SHA-256 digests, rendered as lowercase hex.
use proto::constants::SLICE_SIZE;
use sha2::{Digest, Sha256};

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkDigest {
    pub slice_hashes: Vec<String>,
    pub chunk_hash: String,
}

impl ChunkDigest {
    pub fn compute(chunk: &[u8]) -> Self {
        Self {
            slice_hashes: chunk.chunks(SLICE_SIZE).map(hash_bytes).collect(),
            chunk_hash: hash_bytes(chunk),
        }
    }

    pub fn verify(&self, chunk: &[u8]) -> IntegrityReport {
        let actual = ChunkDigest::compute(chunk);
        let slice_count = self.slice_hashes.len().max(actual.slice_hashes.len());
        let corrupted_slices = (0..slice_count)
            .filter(|&index| self.slice_hashes.get(index) != actual.slice_hashes.get(index))
            .collect();
        IntegrityReport {
            chunk_hash_matches: self.chunk_hash == actual.chunk_hash,
            corrupted_slices,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityReport {
    pub corrupted_slices: Vec<usize>,
    pub chunk_hash_matches: bool,
}

impl IntegrityReport {
    pub fn is_corrupted(&self) -> bool {
        !self.corrupted_slices.is_empty() || !self.chunk_hash_matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn hashing_is_deterministic() {
        let chunk = sample(64_000);
        let first = ChunkDigest::compute(&chunk);
        let second = ChunkDigest::compute(&chunk);
        assert_eq!(first, second);
        assert_eq!(first.slice_hashes.len(), 8);
        assert_eq!(first.chunk_hash.len(), 64);
        assert!(!first.verify(&chunk).is_corrupted());
    }

    #[test]
    fn short_last_slice_gets_its_own_digest() {
        let digest = ChunkDigest::compute(&sample(SLICE_SIZE * 2 + 1));
        assert_eq!(digest.slice_hashes.len(), 3);
    }

    #[test]
    fn any_single_byte_flip_is_caught_in_its_slice_and_the_whole_chunk() {
        let chunk = sample(21_999);
        let digest = ChunkDigest::compute(&chunk);
        for position in [0, SLICE_SIZE - 1, SLICE_SIZE, 15_123, chunk.len() - 1] {
            let mut mutated = chunk.clone();
            mutated[position] ^= 0x01;
            let report = digest.verify(&mutated);
            assert!(report.is_corrupted());
            assert!(!report.chunk_hash_matches);
            assert_eq!(report.corrupted_slices, vec![position / SLICE_SIZE]);
        }
    }

    #[test]
    fn truncation_marks_the_missing_slices() {
        let chunk = sample(SLICE_SIZE * 3);
        let digest = ChunkDigest::compute(&chunk);
        let report = digest.verify(&chunk[..SLICE_SIZE]);
        assert_eq!(report.corrupted_slices, vec![1, 2]);
        assert!(!report.chunk_hash_matches);
    }

    #[test]
    fn known_digest_of_empty_input() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
