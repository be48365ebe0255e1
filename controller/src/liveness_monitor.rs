use std::sync::Arc;

use futures::future::join_all;
use proto::{Event, events::FixCorruptChunk};
use tokio::{sync::mpsc, time::interval};
use utilities::logger::{Instrument, debug, error, info, info_span, warn};

use crate::{
    controller::Controller,
    controller_state::{chunk_server_details::ChunkServerRegistration, state_snapshot::ControllerSnapshot},
};

pub struct LivenessMonitor {
    controller: Arc<Controller>,
    snapshot_sender: Option<mpsc::Sender<ControllerSnapshot>>,
}

impl LivenessMonitor {
    pub fn new(
        controller: Arc<Controller>,
        snapshot_sender: Option<mpsc::Sender<ControllerSnapshot>>,
    ) -> Self {
        Self {
            controller,
            snapshot_sender,
        }
    }

    pub fn start(self) {
        tokio::spawn(async move {
            let mut ticker = interval(self.controller.settings.liveness_interval);
            loop {
                ticker.tick().await;
                self.run_round()
                    .instrument(info_span!("controller_liveness_round"))
                    .await;
            }
        });
    }

    pub(crate) async fn run_round(&self) {
        let controller = &self.controller;
        let targets: Vec<(u32, std::net::SocketAddr)> = {
            let state = controller.state.lock().await;
            state
                .chunk_servers
                .values()
                .map(|registration| (registration.id, registration.endpoint))
                .collect()
        };
        let probes = targets.into_iter().map(|(id, endpoint)| async move {
            let alive = match controller.connections.get(&endpoint).await {
                Some(connection) => match connection.send(&Event::LivenessHeartbeat).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(%id, %endpoint, error = %e, "Liveness probe failed");
                        false
                    }
                },
                None => {
                    warn!(%id, %endpoint, "No connection to probe");
                    false
                }
            };
            debug!(%id, alive, "Probed chunk server");
            (id, alive)
        });
        let dead: Vec<u32> = join_all(probes)
            .await
            .into_iter()
            .filter_map(|(id, alive)| (!alive).then_some(id))
            .collect();

        for id in dead {
            let purged = controller.state.lock().await.chunk_servers.remove(&id);
            let Some(purged) = purged else {
                continue;
            };
            info!(%id, endpoint = %purged.endpoint, chunks = purged.chunks.len(), "Purged dead chunk server");
            if let Some(connection) = controller.connections.remove(&purged.endpoint).await {
                connection.close().await;
            }
            if controller.settings.rereplicate_on_purge {
                self.rereplicate(&purged).await;
            }
        }

        if let Some(sender) = &self.snapshot_sender {
            if let Err(e) = sender.send(controller.snapshot().await).await {
                error!(error = %e, "Error while queueing state snapshot");
            }
        }
    }

    async fn rereplicate(&self, purged: &ChunkServerRegistration) {
        let controller = &self.controller;
        for chunk_name in &purged.chunks {
            let instruction = {
                let state = controller.state.lock().await;
                let source = controller
                    .selection_policy
                    .select_repair_source(&state, chunk_name, None)
                    .and_then(|id| state.chunk_servers.get(&id));
                let target = controller
                    .selection_policy
                    .select_rereplication_target(&state, chunk_name)
                    .and_then(|id| state.chunk_servers.get(&id));
                match (source, target) {
                    (Some(source), Some(target)) => Some((
                        target.id,
                        target.endpoint,
                        FixCorruptChunk {
                            chunk_name: chunk_name.clone(),
                            source: source.address(),
                        },
                    )),
                    _ => None,
                }
            };
            let Some((target_id, target_endpoint, fix)) = instruction else {
                warn!(%chunk_name, "Chunk is under-replicated, no source or target available");
                continue;
            };
            let Some(connection) = controller.connections.get(&target_endpoint).await else {
                warn!(%chunk_name, %target_id, "No connection to re-replication target");
                continue;
            };
            info!(%chunk_name, %target_id, source = %fix.source.endpoint(), "Re-replicating chunk");
            if let Err(e) = connection.send(&Event::FixCorruptChunk(fix)).await {
                error!(%chunk_name, %target_id, error = %e, "Error while sending re-replication request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        ControllerSettings,
        test_support::{ControllerPeer, PeerHandle, quiet_settings, start_controller, wait_for},
    };

    #[tokio::test]
    async fn closed_server_is_purged_and_its_chunks_are_copied_elsewhere() {
        let (controller, addr) = start_controller(quiet_settings()).await;
        let mut doomed = PeerHandle::connect(addr).await;
        let mut source = PeerHandle::connect(addr).await;
        let mut target = PeerHandle::connect(addr).await;
        assert!(doomed.register_chunk_server(7501).await.is_success());
        assert!(source.register_chunk_server(7502).await.is_success());
        assert!(target.register_chunk_server(7503).await.is_success());
        doomed.major_heartbeat(&["f_chunk1"], 10).await;
        source.major_heartbeat(&["f_chunk1"], 10).await;
        target.major_heartbeat(&[], 500).await;
        wait_for(&controller, |s| {
            s.holders_of("f_chunk1").len() == 2 && s.chunk_servers.values().any(|c| c.free_space == 500)
        })
        .await;

        doomed.connection().close().await;
        let monitor = LivenessMonitor::new(controller.clone(), None);
        // the reader notices the close and evicts; a later round purges
        for _ in 0..50 {
            monitor.run_round().await;
            if controller.snapshot().await.chunk_servers.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.chunk_servers.len(), 2);
        assert!(snapshot.chunk_servers.values().all(|c| c.port != 7501));

        match target.next_non_probe_event().await {
            Event::FixCorruptChunk(fix) => {
                assert_eq!(fix.chunk_name, "f_chunk1");
                assert_eq!(fix.source.port, 7502);
            }
            other => panic!("unexpected {other:?}"),
        }
        // the probes themselves
        assert!(matches!(source.next_event().await, Event::LivenessHeartbeat));
    }

    #[tokio::test]
    async fn live_servers_survive_rounds_and_snapshots_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("state.log");
        let settings = ControllerSettings {
            liveness_interval: Duration::from_millis(50),
            state_log_file: Some(log.clone()),
            ..ControllerSettings::default()
        };
        let (controller, addr) = start_controller(settings).await;
        let mut server = PeerHandle::connect(addr).await;
        assert!(server.register_chunk_server(7601).await.is_success());
        server.major_heartbeat(&["g_chunk1"], 42).await;

        for _ in 0..3 {
            assert!(matches!(server.next_event().await, Event::LivenessHeartbeat));
        }
        assert_eq!(controller.snapshot().await.chunk_servers.len(), 1);

        let mut logged = String::new();
        for _ in 0..100 {
            logged = tokio::fs::read_to_string(&log).await.unwrap_or_default();
            if logged.contains("g_chunk1") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let last: serde_json::Value =
            serde_json::from_str(logged.lines().last().unwrap()).unwrap();
        let servers = last["chunk_servers"].as_object().unwrap();
        assert_eq!(servers.len(), 1);
        let server_entry = servers.values().next().unwrap();
        assert_eq!(server_entry["port"], 7601);
        assert_eq!(server_entry["free_space"], 42);
    }
}
