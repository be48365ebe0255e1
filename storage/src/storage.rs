use std::error::Error;

pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

pub trait Storage {
    async fn write(&self, chunk_name: &str, chunk: &[u8]) -> Result<u64>;
    async fn read(&self, chunk_name: &str) -> Result<Vec<u8>>;
    async fn available_chunks(&self) -> Result<Vec<String>>;
    fn available_storage(&self) -> Result<u64>;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub async fn storage_test(storage: impl Storage) -> Result<()> {
        let chunk_name = "notes.txt_chunk1";
        let original_data = b"hello world";

        let written = storage.write(chunk_name, original_data).await?;
        assert_eq!(written as usize, original_data.len());
        assert_eq!(storage.available_chunks().await?, vec![chunk_name.to_string()]);
        assert_eq!(storage.read(chunk_name).await?, original_data);

        // replacing keeps a single entry
        storage.write(chunk_name, b"HELLO").await?;
        assert_eq!(storage.read(chunk_name).await?, b"HELLO");
        assert_eq!(storage.available_chunks().await?.len(), 1);

        assert!(storage.available_storage()? > 0);
        assert!(storage.read("notes.txt_chunk2").await.is_err());
        Ok(())
    }
}
