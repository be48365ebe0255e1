/// Maximum number of bytes in one chunk.
pub const CHUNK_SIZE: usize = 64_000;
/// Integrity hashing granularity inside a chunk.
pub const SLICE_SIZE: usize = 8_000;
pub const REPLICATION_FACTOR: usize = 3;
/// Exclusive upper bound of the ids the controller hands out.
pub const MAX_NODES: u32 = 30;
pub const CHUNK_SUFFIX: &str = "_chunk";

pub const STATUS_SUCCESS: i32 = 0;
pub const STATUS_FAILURE: i32 = -1;
