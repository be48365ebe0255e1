use std::sync::Arc;

use proto::{
    Event,
    chunk::chunk_name,
    events::{RetrieveChunkResponse, StoreChunk},
};
use storage::{integrity::ChunkDigest, storage::Storage};
use utilities::{
    logger::{error, info, instrument, warn},
    transport::TcpConnection,
};

use crate::{chunk_server::ChunkServer, chunk_server_state::chunk_record::ChunkRecord};

impl ChunkServer {
    #[instrument(name = "chunk_server_store_chunk", skip(self, store_chunk), fields(file_name = %store_chunk.file_name, sequence_number = store_chunk.sequence_number, remaining = store_chunk.next_chunk_servers.len()))]
    pub(crate) async fn store_chunk(&self, mut store_chunk: StoreChunk) {
        let remaining = store_chunk.next_chunk_servers.len();
        if remaining > 2 {
            warn!(%remaining, "Invalid replica chain length, dropping store instruction");
            return;
        }
        let chunk_name = chunk_name(&store_chunk.file_name, store_chunk.sequence_number);
        if let Err(e) = self.store.write(&chunk_name, &store_chunk.chunk).await {
            error!(%chunk_name, error = %e, "Error while writing chunk to disk");
            return;
        }
        let record = ChunkRecord::new(
            &store_chunk.file_name,
            store_chunk.sequence_number,
            store_chunk.version,
            ChunkDigest::compute(&store_chunk.chunk),
        );
        {
            let mut state = self.state.lock().await;
            if let Some(previous) = state.record(record) {
                warn!(%chunk_name, previous_version = previous.version, version = store_chunk.version, "Chunk stored again, replacing record");
            }
            state.note_new_chunk(chunk_name.clone());
        }
        info!(%chunk_name, len = store_chunk.chunk.len(), "Chunk stored");

        if store_chunk.next_chunk_servers.is_empty() {
            info!(%chunk_name, "Last replica written, replication complete");
            return;
        }
        let next = store_chunk.next_chunk_servers.remove(0);
        self.forward_store(&next.endpoint(), &chunk_name, store_chunk)
            .await;
    }

    async fn forward_store(&self, endpoint: &str, chunk_name: &str, store_chunk: StoreChunk) {
        let Some(node) = self.handle() else {
            return;
        };
        let connection = match self.connections.get_or_connect(endpoint, node).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(%chunk_name, %endpoint, error = %e, "Error while connecting to next replica");
                return;
            }
        };
        let remaining = store_chunk.next_chunk_servers.len();
        match connection.send(&Event::StoreChunk(store_chunk)).await {
            Ok(()) => info!(%chunk_name, %endpoint, %remaining, "Forwarded chunk to next replica"),
            Err(e) => {
                error!(%chunk_name, %endpoint, error = %e, "Error while forwarding chunk");
                self.connections.remove_connection(&connection).await;
            }
        }
    }

    // corruption is reported before the reply, which still carries the stored hash
    #[instrument(name = "chunk_server_retrieve_chunk", skip(self, origin), fields(peer = %origin.peer_addr()))]
    pub(crate) async fn retrieve_chunk(&self, chunk_name: &str, origin: &Arc<TcpConnection>) {
        let Some(record) = self.state.lock().await.get(chunk_name).cloned() else {
            error!(%chunk_name, "Retrieve request for a chunk this server does not hold");
            return;
        };
        let chunk = match self.store.read(chunk_name).await {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(%chunk_name, error = %e, "Error while reading chunk from disk");
                Vec::new()
            }
        };

        let report = record.digest.verify(&chunk);
        for slice in &report.corrupted_slices {
            warn!(%chunk_name, %slice, "Slice hash mismatch");
        }
        if !report.chunk_hash_matches {
            warn!(%chunk_name, "Chunk hash mismatch");
        }
        if report.is_corrupted() {
            self.report_corruption(chunk_name).await;
        }

        let response = Event::RetrieveChunkResponse(RetrieveChunkResponse {
            chunk_name: chunk_name.to_owned(),
            chunk,
            chunk_hash: record.digest.chunk_hash,
        });
        if let Err(e) = origin.send(&response).await {
            error!(%chunk_name, error = %e, "Error while sending chunk");
        }
    }

    async fn report_corruption(&self, chunk_name: &str) {
        let Some(controller) = self.controller_connection() else {
            error!(%chunk_name, "Not registered with a controller, corruption not reported");
            return;
        };
        let report = Event::ReportChunkCorruption {
            chunk_name: chunk_name.to_owned(),
        };
        match controller.send(&report).await {
            Ok(()) => info!(%chunk_name, "Reported corrupt chunk to controller"),
            Err(e) => error!(%chunk_name, error = %e, "Error while reporting corruption"),
        }
    }
}
