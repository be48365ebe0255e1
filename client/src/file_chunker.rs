use proto::constants::CHUNK_SIZE;

#[derive(Clone, Debug, PartialEq)]
pub struct FileChunk<'a> {
    pub sequence_number: i32,
    pub bytes: &'a [u8],
}

pub struct FileChunker<'a> {
    data: &'a [u8],
    chunk_size: usize,
    current_index: usize,
}

impl<'a> FileChunker<'a> {
    pub fn new(data: &'a [u8]) -> FileChunker<'a> {
        Self::with_chunk_size(data, CHUNK_SIZE)
    }

    pub fn with_chunk_size(data: &'a [u8], chunk_size: usize) -> FileChunker<'a> {
        FileChunker {
            data,
            chunk_size: chunk_size.max(1),
            current_index: 0,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(self.chunk_size)
    }
}

impl<'a> Iterator for FileChunker<'a> {
    type Item = FileChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.current_index * self.chunk_size;
        if start >= self.data.len() {
            return None;
        }
        let end = (start + self.chunk_size).min(self.data.len());
        self.current_index += 1;
        Some(FileChunk {
            sequence_number: self.current_index as i32,
            bytes: &self.data[start..end],
        })
    }
}
