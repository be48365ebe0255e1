use proto::{
    Event,
    constants::REPLICATION_FACTOR,
    events::{ChunkServerAddress, FileInfo, RetrieveFileResponse},
};
use utilities::logger::{debug, instrument};

use crate::{client::Client, error::ClientError};

impl Client {
    #[instrument(name = "client_announce_file", skip(self))]
    pub(crate) async fn announce_file(
        &self,
        file_name: &str,
        no_of_chunks: usize,
        file_size: usize,
    ) -> Result<(), ClientError> {
        let file_info = FileInfo {
            file_name: file_name.to_owned(),
            no_of_chunks: i32::try_from(no_of_chunks)
                .map_err(|_| ClientError::FileTooLarge(file_size))?,
            file_size: i32::try_from(file_size).map_err(|_| ClientError::FileTooLarge(file_size))?,
        };
        self.controller()?
            .send(&Event::SendFileInfo(file_info))
            .await?;
        Ok(())
    }

    #[instrument(name = "client_request_chunk_servers", skip(self))]
    pub(crate) async fn request_chunk_servers(&self) -> Result<Vec<ChunkServerAddress>, ClientError> {
        let controller = self.controller()?;
        let rx = self.expect_replica_set().await;
        controller.send(&Event::ClientRequestsChunkServers).await?;
        let replica_set = self.wait_for(rx, "replica set").await?;
        if replica_set.len() != REPLICATION_FACTOR {
            return Err(ClientError::InvalidReplicaSet(replica_set.len()));
        }
        debug!(?replica_set, "Replica set received");
        Ok(replica_set)
    }

    #[instrument(name = "client_request_file_locations", skip(self))]
    pub(crate) async fn request_file_locations(
        &self,
        file_name: &str,
    ) -> Result<RetrieveFileResponse, ClientError> {
        let controller = self.controller()?;
        let rx = self.expect_file_locations(file_name).await;
        controller
            .send(&Event::RetrieveFileRequest {
                file_name: file_name.to_owned(),
            })
            .await?;
        self.wait_for(rx, &format!("locations of {file_name}")).await
    }
}
