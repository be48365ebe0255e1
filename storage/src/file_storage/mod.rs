mod platform_utility;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{instrument, trace};

use crate::{
    file_storage::platform_utility::available_storage,
    storage::{Result, Storage},
};

#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if fs::try_exists(&root).await? && !fs::metadata(&root).await?.is_dir() {
            return Err(format!("{} is in use and not a directory", root.display()).into());
        }
        fs::create_dir_all(&root).await?;
        Ok(FileStorage { root })
    }

    // names arrive from the network, keep them inside root
    fn chunk_path(&self, chunk_name: &str) -> Result<PathBuf> {
        if chunk_name.is_empty()
            || chunk_name == "."
            || chunk_name == ".."
            || chunk_name.contains(['/', '\\', '\0'])
        {
            return Err(format!("invalid chunk name {chunk_name:?}").into());
        }
        Ok(self.root.join(chunk_name))
    }
}

impl Storage for FileStorage {
    #[instrument(name = "file_storage_write", skip(self, chunk), fields(len = chunk.len()))]
    async fn write(&self, chunk_name: &str, chunk: &[u8]) -> Result<u64> {
        let chunk_path = self.chunk_path(chunk_name)?;
        fs::write(&chunk_path, chunk).await?;
        trace!(%chunk_name, "Chunk written");
        Ok(chunk.len() as u64)
    }

    #[instrument(name = "file_storage_read", skip(self))]
    async fn read(&self, chunk_name: &str) -> Result<Vec<u8>> {
        let chunk_path = self.chunk_path(chunk_name)?;
        Ok(fs::read(chunk_path).await?)
    }

    async fn available_chunks(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut chunk_names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => chunk_names.push(name),
                Err(name) => trace!(?name, "Skipping non utf-8 file name"),
            }
        }
        chunk_names.sort();
        Ok(chunk_names)
    }

    fn available_storage(&self) -> Result<u64> {
        available_storage(&self.root)
    }
}
