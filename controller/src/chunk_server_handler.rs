use proto::{
    Event,
    chunk::parse_chunk_name,
    events::{FixCorruptChunk, MajorHeartbeat, MinorHeartbeat, Registration},
};
use utilities::{
    logger::{debug, error, info, instrument, warn},
    transport::TcpConnection,
};

use crate::controller::{Controller, RegistrationKind};

impl Controller {
    #[instrument(name = "controller_chunk_server_registration", skip(self, registration, origin), fields(peer = %origin.peer_addr()))]
    pub(crate) async fn handle_chunk_server_registration(
        &self,
        registration: Registration,
        origin: &TcpConnection,
    ) {
        let report = self
            .register(RegistrationKind::ChunkServer, registration, origin)
            .await;
        if let Err(e) = origin
            .send(&Event::ReportChunkServerRegistration(report))
            .await
        {
            error!(error = %e, "Error while sending chunk server registration report");
        }
    }

    #[instrument(name = "controller_major_heartbeat", skip(self, heartbeat, origin), fields(peer = %origin.peer_addr(), chunks = heartbeat.chunks.len()))]
    pub(crate) async fn handle_major_heartbeat(
        &self,
        heartbeat: MajorHeartbeat,
        origin: &TcpConnection,
    ) {
        let mut state = self.state.lock().await;
        match state.chunk_server_by_endpoint_mut(&origin.peer_addr()) {
            Some(registration) => {
                registration.replace_chunks(heartbeat.chunks, heartbeat.free_space);
                debug!(id = registration.id, free_space = heartbeat.free_space, "Chunk list replaced");
            }
            None => warn!("Major heartbeat from an unregistered chunk server"),
        }
    }

    #[instrument(name = "controller_minor_heartbeat", skip(self, heartbeat, origin), fields(peer = %origin.peer_addr(), delta = heartbeat.delta))]
    pub(crate) async fn handle_minor_heartbeat(
        &self,
        heartbeat: MinorHeartbeat,
        origin: &TcpConnection,
    ) {
        let mut state = self.state.lock().await;
        match state.chunk_server_by_endpoint_mut(&origin.peer_addr()) {
            Some(registration) => {
                if heartbeat.delta as usize != heartbeat.new_chunks.len() {
                    warn!(
                        listed = heartbeat.new_chunks.len(),
                        "Minor heartbeat delta does not match the listed chunks"
                    );
                }
                registration.add_chunks(heartbeat.new_chunks, heartbeat.free_space);
                debug!(id = registration.id, free_space = heartbeat.free_space, "Chunk list extended");
            }
            None => warn!("Minor heartbeat from an unregistered chunk server"),
        }
    }

    #[instrument(name = "controller_coordinate_repair", skip(self, origin), fields(peer = %origin.peer_addr()))]
    pub(crate) async fn coordinate_repair(&self, chunk_name: &str, origin: &TcpConnection) {
        let fix = {
            let state = self.state.lock().await;
            let reporter = state
                .chunk_server_by_endpoint(&origin.peer_addr())
                .map(|registration| registration.id);
            match parse_chunk_name(chunk_name) {
                Some((file_name, sequence_number)) => {
                    info!(%file_name, sequence_number, ?reporter, "Corruption reported")
                }
                None => warn!("Corruption reported for a malformed chunk name"),
            }
            let source = self
                .selection_policy
                .select_repair_source(&state, chunk_name, reporter)
                .and_then(|id| state.chunk_servers.get(&id));
            match source {
                Some(source) => FixCorruptChunk {
                    chunk_name: chunk_name.to_owned(),
                    source: source.address(),
                },
                None => {
                    error!("No other holder of the chunk, repair cannot proceed");
                    return;
                }
            }
        };
        info!(source = %fix.source.endpoint(), "Sending repair source");
        if let Err(e) = origin.send(&Event::FixCorruptChunk(fix)).await {
            error!(error = %e, "Error while sending repair instructions");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{ControllerPeer, PeerHandle, quiet_settings, start_controller, wait_for};

    #[tokio::test]
    async fn corruption_report_names_another_holder() {
        let (controller, addr) = start_controller(quiet_settings()).await;
        let mut reporter = PeerHandle::connect(addr).await;
        let mut healthy = PeerHandle::connect(addr).await;
        assert!(reporter.register_chunk_server(7201).await.is_success());
        assert!(healthy.register_chunk_server(7202).await.is_success());
        reporter.major_heartbeat(&["notes.txt_chunk1"], 10).await;
        healthy.major_heartbeat(&["notes.txt_chunk1"], 10).await;
        wait_for(&controller, |s| s.holders_of("notes.txt_chunk1").len() == 2).await;

        reporter
            .send(Event::ReportChunkCorruption {
                chunk_name: "notes.txt_chunk1".into(),
            })
            .await;
        match reporter.next_event().await {
            Event::FixCorruptChunk(fix) => {
                assert_eq!(fix.chunk_name, "notes.txt_chunk1");
                assert_eq!(fix.source.port, 7202);
            }
            other => panic!("unexpected {other:?}"),
        }
        healthy.expect_silence(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn corruption_without_another_holder_gets_no_reply() {
        let (controller, addr) = start_controller(quiet_settings()).await;
        let mut reporter = PeerHandle::connect(addr).await;
        assert!(reporter.register_chunk_server(7301).await.is_success());
        reporter.major_heartbeat(&["solo_chunk1"], 10).await;
        wait_for(&controller, |s| s.holders_of("solo_chunk1").len() == 1).await;

        reporter
            .send(Event::ReportChunkCorruption {
                chunk_name: "solo_chunk1".into(),
            })
            .await;
        reporter.expect_silence(Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn minor_heartbeats_add_and_major_heartbeats_replace() {
        let (controller, addr) = start_controller(quiet_settings()).await;
        let mut server = PeerHandle::connect(addr).await;
        assert!(server.register_chunk_server(7401).await.is_success());
        server.major_heartbeat(&["a_chunk1"], 10).await;
        server
            .send(Event::MinorHeartbeat(MinorHeartbeat {
                new_chunks: vec!["b_chunk1".into()],
                free_space: 9,
                delta: 1,
            }))
            .await;
        wait_for(&controller, |s| {
            s.chunk_servers
                .values()
                .any(|c| c.chunks == vec!["a_chunk1".to_string(), "b_chunk1".to_string()] && c.free_space == 9)
        })
        .await;

        server.major_heartbeat(&["c_chunk1"], 8).await;
        wait_for(&controller, |s| {
            s.chunk_servers
                .values()
                .any(|c| c.chunks == vec!["c_chunk1".to_string()])
        })
        .await;
    }
}
