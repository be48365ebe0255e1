use std::{path::PathBuf, sync::Arc, time::Duration};

use futures::future::try_join_all;
use proto::{chunk::chunk_name, events::RetrieveChunkResponse};
use tokio::{sync::mpsc, time::timeout};
use utilities::logger::{Instrument, error, info, instrument, trace};

use crate::{chunk_joiner::ChunkJoiner, client::Client, error::ClientError};

pub struct FetchFileHandler {
    client: Arc<Client>,
}

impl FetchFileHandler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    #[instrument(name = "fetch_file", skip(self))]
    pub async fn fetch_file(&self, file_name: &str) -> Result<PathBuf, ClientError> {
        let locations = self.client.request_file_locations(file_name).await?;
        trace!(chunk_servers = ?locations.chunk_servers, "Got chunk locations");
        if let Some(index) = locations
            .chunk_servers
            .iter()
            .position(|holder| holder.is_missing())
        {
            return Err(ClientError::MissingReplica {
                chunk_name: chunk_name(file_name, index as i32 + 1),
            });
        }

        let no_of_chunks = locations.chunk_servers.len() as i32;
        let arrivals = self.client.expect_chunks(file_name).await?;
        let assembler = tokio::spawn(
            assemble(
                ChunkJoiner::new(file_name, no_of_chunks),
                arrivals,
                self.client.settings.reply_timeout,
            )
            .in_current_span(),
        );

        let requests = locations
            .chunk_servers
            .iter()
            .enumerate()
            .map(|(index, holder)| {
                let chunk_name = chunk_name(file_name, index as i32 + 1);
                async move { self.client.request_chunk(&chunk_name, holder).await }
            });
        if let Err(e) = try_join_all(requests).await {
            assembler.abort();
            self.client.stop_chunk_arrivals(file_name).await;
            return Err(e);
        }

        let joined = assembler.await;
        self.client.stop_chunk_arrivals(file_name).await;
        let joiner = match joined {
            Ok(joiner) => joiner?,
            Err(e) => {
                error!(error = %e, "Assembler task failed");
                return Err(ClientError::TimedOut {
                    waiting_for: format!("chunks of {file_name}"),
                });
            }
        };
        let path = joiner.write_to(&self.client.settings.output_dir).await?;
        info!(path = %path.display(), file_size = locations.file_size, "File reassembled");
        Ok(path)
    }
}

async fn assemble(
    mut joiner: ChunkJoiner,
    mut arrivals: mpsc::UnboundedReceiver<RetrieveChunkResponse>,
    reply_timeout: Duration,
) -> Result<ChunkJoiner, ClientError> {
    while !joiner.is_complete() {
        match timeout(reply_timeout, arrivals.recv()).await {
            Ok(Some(response)) => joiner.join_chunk(response)?,
            _ => {
                return Err(ClientError::TimedOut {
                    waiting_for: joiner.missing().join(", "),
                });
            }
        }
    }
    Ok(joiner)
}
