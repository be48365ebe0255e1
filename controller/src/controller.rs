use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use proto::{
    Event,
    constants::MAX_NODES,
    events::{Registration, RegistrationReport},
};
use tokio::sync::Mutex;
use utilities::{
    logger::{debug, info, warn},
    result::Result,
    state_logger::StateLogger,
    transport::{ConnectionCache, Node, TcpConnection, TcpServer},
};

use crate::{
    controller_state::{
        ControllerState,
        chunk_server_details::{ChunkServerRegistration, ClientRegistration},
        state_snapshot::ControllerSnapshot,
    },
    liveness_monitor::LivenessMonitor,
    selection_policy::{
        ChunkServerSelectionPolicy, default_selection_policy::DefaultSelectionPolicy,
    },
};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub liveness_interval: Duration,
    pub max_nodes: u32,
    pub rereplicate_on_purge: bool,
    pub state_log_file: Option<PathBuf>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_secs(10),
            max_nodes: MAX_NODES,
            rereplicate_on_purge: true,
            state_log_file: None,
        }
    }
}

pub struct Controller {
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) connections: ConnectionCache,
    pub(crate) selection_policy: Box<dyn ChunkServerSelectionPolicy + Send + Sync>,
    pub(crate) settings: ControllerSettings,
}

pub(crate) enum RegistrationKind {
    ChunkServer,
    Client,
}

impl Controller {
    pub fn new(settings: ControllerSettings) -> Arc<Self> {
        Self::with_policy(settings, Box::new(DefaultSelectionPolicy))
    }

    pub fn with_policy(
        settings: ControllerSettings,
        selection_policy: Box<dyn ChunkServerSelectionPolicy + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ControllerState::default()),
            connections: ConnectionCache::default(),
            selection_policy,
            settings,
        })
    }

    pub async fn start(self: &Arc<Self>, listen_addrs: &str) -> Result<SocketAddr> {
        let server = TcpServer::bind(listen_addrs).await?;
        let local_addr = server.spawn(self.clone())?;
        let snapshot_sender = match &self.settings.state_log_file {
            Some(path) => Some(StateLogger::<ControllerSnapshot>::start(path).await?),
            None => None,
        };
        LivenessMonitor::new(self.clone(), snapshot_sender).start();
        info!(%local_addr, "Controller started");
        Ok(local_addr)
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let state = self.state.lock().await;
        ControllerSnapshot::from(&*state)
    }

    // only from a tracked connection whose peer ip matches the claim, once per endpoint
    pub(crate) async fn register(
        &self,
        kind: RegistrationKind,
        registration: Registration,
        origin: &TcpConnection,
    ) -> RegistrationReport {
        let endpoint = origin.peer_addr();
        if registration.ip != endpoint.ip() {
            warn!(claimed = %registration.ip, actual = %endpoint.ip(), "Registration address mismatch");
            return RegistrationReport::failure(format!(
                "Registration request unsuccessful. Claimed address {} does not match connection address {}",
                registration.ip,
                endpoint.ip()
            ));
        }
        if !self.connections.contains(&endpoint).await {
            warn!(%endpoint, "Registration over an untracked connection");
            return RegistrationReport::failure(
                "Registration request unsuccessful. Connection is not tracked, retry",
            );
        }
        let mut state = self.state.lock().await;
        let max_nodes = self.settings.max_nodes;
        match kind {
            RegistrationKind::ChunkServer => {
                if state.chunk_server_by_endpoint(&endpoint).is_some() {
                    return RegistrationReport::failure(
                        "Registration request unsuccessful. Chunk server is already registered",
                    );
                }
                let Some(id) = state.assign_chunk_server_id(max_nodes) else {
                    return RegistrationReport::failure(
                        "Registration request unsuccessful. No chunk server ids left",
                    );
                };
                state.chunk_servers.insert(
                    id,
                    ChunkServerRegistration::new(id, endpoint, registration.port),
                );
                info!(%id, %endpoint, port = registration.port, "Chunk server registered");
                RegistrationReport::success(format!(
                    "Registration request successful. The number of chunk servers currently registered is ({})",
                    state.chunk_servers.len()
                ))
            }
            RegistrationKind::Client => {
                if state.client_by_endpoint(&endpoint).is_some() {
                    return RegistrationReport::failure(
                        "Registration request unsuccessful. Client is already registered",
                    );
                }
                let Some(id) = state.assign_client_id(max_nodes) else {
                    return RegistrationReport::failure(
                        "Registration request unsuccessful. No client ids left",
                    );
                };
                state.clients.insert(
                    id,
                    ClientRegistration {
                        id,
                        endpoint,
                        port: registration.port,
                    },
                );
                info!(%id, %endpoint, "Client registered");
                RegistrationReport::success(format!(
                    "Registration request successful. The number of clients currently registered is ({})",
                    state.clients.len()
                ))
            }
        }
    }
}

#[async_trait]
impl Node for Controller {
    fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    async fn on_event(&self, event: Event, origin: Arc<TcpConnection>) {
        match event {
            Event::RegisterChunkServer(registration) => {
                self.handle_chunk_server_registration(registration, &origin)
                    .await
            }
            Event::RegisterClient(registration) => {
                self.handle_client_registration(registration, &origin).await
            }
            Event::ClientRequestsChunkServers => self.send_chunk_servers_to_client(&origin).await,
            Event::SendFileInfo(file_info) => self.add_file(file_info).await,
            Event::RetrieveFileRequest { file_name } => {
                self.route_file_retrieval(&file_name, &origin).await
            }
            Event::MajorHeartbeat(heartbeat) => self.handle_major_heartbeat(heartbeat, &origin).await,
            Event::MinorHeartbeat(heartbeat) => self.handle_minor_heartbeat(heartbeat, &origin).await,
            Event::ReportChunkCorruption { chunk_name } => {
                self.coordinate_repair(&chunk_name, &origin).await
            }
            other => {
                warn!(event_type = %other.event_type(), peer = %origin.peer_addr(), "Unexpected event for controller, dropping");
            }
        }
    }

    async fn on_disconnect(&self, origin: &TcpConnection) {
        self.connections.remove_connection(origin).await;
        let endpoint = origin.peer_addr();
        let mut state = self.state.lock().await;
        // chunk servers stay registered until the next liveness round
        state.clients.retain(|_, client| client.endpoint != endpoint);
        debug!(%endpoint, "Connection closed");
    }
}
