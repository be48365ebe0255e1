use std::{io::ErrorKind, path::Path, sync::Arc};

use utilities::logger::{info, instrument, trace};

use crate::{client::Client, error::ClientError, file_chunker::FileChunker};

pub struct StoreFileHandler {
    client: Arc<Client>,
}

impl StoreFileHandler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    #[instrument(name = "store_file", skip(self))]
    pub async fn store_file(&self, local_file_path: &str) -> Result<String, ClientError> {
        let data = match tokio::fs::read(local_file_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ClientError::FileNotFound(local_file_path.into()));
            }
            Err(e) => return Err(e.into()),
        };
        let file_name = Path::new(local_file_path)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ClientError::FileNotFound(local_file_path.into()))?
            .to_owned();
        let chunker = FileChunker::new(&data);
        let no_of_chunks = chunker.chunk_count();
        info!(%file_name, file_size = data.len(), %no_of_chunks, "Storing file");
        self.client
            .announce_file(&file_name, no_of_chunks, data.len())
            .await?;

        for chunk in chunker {
            let replica_set = self.client.request_chunk_servers().await?;
            trace!(sequence_number = chunk.sequence_number, "Got replica set");
            self.client
                .store_chunk(
                    &file_name,
                    chunk.sequence_number,
                    chunk.bytes.to_vec(),
                    &replica_set,
                )
                .await?;
        }
        Ok(file_name)
    }
}
