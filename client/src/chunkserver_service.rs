use proto::{
    Event,
    events::{ChunkServerAddress, ReplicaEndpoint, StoreChunk},
};
use utilities::logger::{info, instrument};

use crate::{client::Client, error::ClientError};

impl Client {
    #[instrument(name = "client_store_chunk", skip(self, chunk, replica_set), fields(len = chunk.len()))]
    pub(crate) async fn store_chunk(
        &self,
        file_name: &str,
        sequence_number: i32,
        chunk: Vec<u8>,
        replica_set: &[ChunkServerAddress],
    ) -> Result<(), ClientError> {
        let Some((head, rest)) = replica_set.split_first() else {
            return Err(ClientError::InvalidReplicaSet(0));
        };
        let node = self.node().ok_or(ClientError::NotConnected)?;
        let connection = self.connections.get_or_connect(&head.endpoint(), node).await?;
        let instruction = StoreChunk {
            sequence_number,
            version: 1,
            file_name: file_name.to_owned(),
            chunk,
            next_chunk_servers: rest.iter().map(ReplicaEndpoint::from).collect(),
        };
        if let Err(e) = connection.send(&Event::StoreChunk(instruction)).await {
            self.connections.remove_connection(&connection).await;
            return Err(e.into());
        }
        info!(head = %head.endpoint(), "Chunk sent to replica chain");
        Ok(())
    }

    #[instrument(name = "client_request_chunk", skip(self, holder), fields(holder = %holder.endpoint()))]
    pub(crate) async fn request_chunk(
        &self,
        chunk_name: &str,
        holder: &ChunkServerAddress,
    ) -> Result<(), ClientError> {
        let node = self.node().ok_or(ClientError::NotConnected)?;
        let connection = self
            .connections
            .get_or_connect(&holder.endpoint(), node)
            .await?;
        let request = Event::RetrieveChunkRequest {
            chunk_name: chunk_name.to_owned(),
        };
        if let Err(e) = connection.send(&request).await {
            self.connections.remove_connection(&connection).await;
            return Err(e.into());
        }
        Ok(())
    }
}
