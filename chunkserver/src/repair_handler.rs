use proto::{
    Event,
    chunk::parse_chunk_name,
    events::{FixCorruptChunk, RetrieveChunkResponse},
};
use storage::{
    integrity::{ChunkDigest, hash_bytes},
    storage::Storage,
};
use utilities::logger::{error, info, instrument, warn};

use crate::{chunk_server::ChunkServer, chunk_server_state::chunk_record::ChunkRecord};

impl ChunkServer {
    #[instrument(name = "chunk_server_fix_corrupt_chunk", skip(self, fix), fields(chunk_name = %fix.chunk_name, source = %fix.source.endpoint()))]
    pub(crate) async fn fix_corrupt_chunk(&self, fix: FixCorruptChunk) {
        let Some(node) = self.handle() else {
            return;
        };
        if fix.source.is_missing() {
            warn!("Repair instruction without a source, dropping");
            return;
        }
        let source = fix.source.endpoint();
        self.state
            .lock()
            .await
            .pending_repairs
            .insert(fix.chunk_name.clone());
        let request = Event::RetrieveChunkRequest {
            chunk_name: fix.chunk_name.clone(),
        };
        let sent = match self.connections.get_or_connect(&source, node).await {
            Ok(connection) => connection.send(&request).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match sent {
            Ok(()) => info!("Requested chunk from repair source"),
            Err(e) => {
                error!(error = %e, "Error while requesting chunk from repair source");
                self.state
                    .lock()
                    .await
                    .pending_repairs
                    .remove(&fix.chunk_name);
            }
        }
    }

    // bytes not matching the hash the source sent are discarded
    #[instrument(name = "chunk_server_apply_repair", skip(self, response), fields(chunk_name = %response.chunk_name, len = response.chunk.len()))]
    pub(crate) async fn apply_repair(&self, response: RetrieveChunkResponse) {
        let chunk_name = response.chunk_name;
        if !self.state.lock().await.pending_repairs.remove(&chunk_name) {
            warn!("Chunk response without a pending repair, dropping");
            return;
        }
        if hash_bytes(&response.chunk) != response.chunk_hash {
            warn!("Repair source sent a chunk that does not match its hash, not overwriting");
            return;
        }
        let Some((file_name, sequence_number)) = parse_chunk_name(&chunk_name) else {
            warn!("Repair response for an invalid chunk name");
            return;
        };
        if let Err(e) = self.store.write(&chunk_name, &response.chunk).await {
            error!(error = %e, "Error while writing repaired chunk");
            return;
        }
        let digest = ChunkDigest::compute(&response.chunk);
        let mut state = self.state.lock().await;
        match state.get_mut(&chunk_name) {
            Some(record) => {
                record.digest = digest;
                record.timestamp = std::time::SystemTime::now();
                info!("Chunk repaired from replica");
            }
            None => {
                state.record(ChunkRecord::new(file_name, sequence_number, 1, digest));
                state.note_new_chunk(chunk_name.clone());
                info!("New replica copied from peer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proto::events::ChunkServerAddress;

    use super::*;
    use crate::test_support::{FakeController, sample_chunk, start_chunk_server, store_instruction};

    fn source(addr: std::net::SocketAddr) -> ChunkServerAddress {
        ChunkServerAddress {
            host: addr.ip().to_string(),
            hostname: addr.ip().to_string(),
            port: addr.port() as i32,
        }
    }

    #[tokio::test]
    async fn corrupt_chunk_is_overwritten_and_later_reads_are_clean() {
        let controller = FakeController::start().await;
        let good = start_chunk_server(&controller).await;
        let bad = start_chunk_server(&controller).await;
        let chunk = sample_chunk(30_000);
        for server in [&good, &bad] {
            server
                .node
                .store_chunk(store_instruction("img.png", 1, &chunk, vec![]))
                .await;
        }
        let mut damaged = chunk.clone();
        damaged[0] ^= 0x80;
        tokio::fs::write(bad.chunk_dir().join("img.png_chunk1"), &damaged)
            .await
            .unwrap();

        bad.node
            .fix_corrupt_chunk(FixCorruptChunk {
                chunk_name: "img.png_chunk1".into(),
                source: source(good.listen_addr),
            })
            .await;
        for _ in 0..250 {
            if tokio::fs::read(bad.chunk_dir().join("img.png_chunk1"))
                .await
                .unwrap()
                == chunk
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let record = bad.node.chunk_record("img.png_chunk1").await.unwrap();
        assert_eq!(record.digest.chunk_hash, hash_bytes(&chunk));

        let mut reader = controller.client_to(bad.listen_addr).await;
        reader
            .send(Event::RetrieveChunkRequest {
                chunk_name: "img.png_chunk1".into(),
            })
            .await;
        match reader.next_event().await {
            Event::RetrieveChunkResponse(response) => assert_eq!(response.chunk, chunk),
            other => panic!("unexpected {other:?}"),
        }
        assert!(
            controller
                .events_matching(|event| matches!(event, Event::ReportChunkCorruption { .. }))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn repair_of_an_unheld_chunk_creates_a_new_replica() {
        let controller = FakeController::start().await;
        let holder = start_chunk_server(&controller).await;
        let target = start_chunk_server(&controller).await;
        let chunk = sample_chunk(12_345);
        holder
            .node
            .store_chunk(store_instruction("lost.bin", 3, &chunk, vec![]))
            .await;

        target
            .node
            .fix_corrupt_chunk(FixCorruptChunk {
                chunk_name: "lost.bin_chunk3".into(),
                source: source(holder.listen_addr),
            })
            .await;
        target.wait_for_chunk("lost.bin_chunk3").await;
        let record = target.node.chunk_record("lost.bin_chunk3").await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.digest.chunk_hash, hash_bytes(&chunk));
        assert_eq!(
            target.node.state.lock().await.take_new_chunks(),
            vec!["lost.bin_chunk3"]
        );
    }

    #[tokio::test]
    async fn mismatching_or_unrequested_responses_change_nothing() {
        let controller = FakeController::start().await;
        let server = start_chunk_server(&controller).await;

        server
            .node
            .apply_repair(RetrieveChunkResponse {
                chunk_name: "a.bin_chunk1".into(),
                chunk: b"abc".to_vec(),
                chunk_hash: hash_bytes(b"abc"),
            })
            .await;
        assert!(server.node.chunk_names().await.is_empty());

        server
            .node
            .state
            .lock()
            .await
            .pending_repairs
            .insert("a.bin_chunk1".into());
        server
            .node
            .apply_repair(RetrieveChunkResponse {
                chunk_name: "a.bin_chunk1".into(),
                chunk: b"abc".to_vec(),
                chunk_hash: hash_bytes(b"abd"),
            })
            .await;
        assert!(server.node.chunk_names().await.is_empty());
        assert!(!server.chunk_dir().join("a.bin_chunk1").exists());
    }
}
