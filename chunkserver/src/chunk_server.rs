use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock, Weak},
    time::Duration,
};

use async_trait::async_trait;
use proto::{
    Event,
    chunk::parse_chunk_name,
    events::{Registration, RegistrationReport},
};
use storage::{file_storage::FileStorage, integrity::ChunkDigest, storage::Storage};
use tokio::{
    sync::{Mutex, oneshot},
    time::timeout,
};
use utilities::{
    logger::{debug, error, info, instrument, trace, warn},
    result::Result,
    transport::{ConnectionCache, Node, TcpConnection, TcpServer},
};

use crate::{
    chunk_server_state::{ChunkServerState, chunk_record::ChunkRecord},
    controller_service::HeartbeatLoop,
};

#[derive(Debug, Clone)]
pub struct ChunkServerSettings {
    pub id: String,
    pub chunk_dir: PathBuf,
    pub major_heartbeat: Duration,
    pub minor_heartbeat: Duration,
    pub registration_timeout: Duration,
}

pub struct ChunkServer {
    pub(crate) settings: ChunkServerSettings,
    pub(crate) store: FileStorage,
    pub(crate) state: Mutex<ChunkServerState>,
    pub(crate) connections: ConnectionCache,
    pub(crate) controller: OnceLock<Arc<TcpConnection>>,
    registration_waiter: Mutex<Option<oneshot::Sender<RegistrationReport>>>,
    me: Weak<ChunkServer>,
}

impl ChunkServer {
    pub async fn new(settings: ChunkServerSettings) -> Result<Arc<Self>> {
        let store = FileStorage::new(&settings.chunk_dir).await?;
        let state = Self::scan_existing_chunks(&store).await?;
        Ok(Arc::new_cyclic(|me| Self {
            settings,
            store,
            state: Mutex::new(state),
            connections: ConnectionCache::default(),
            controller: OnceLock::new(),
            registration_waiter: Mutex::new(None),
            me: me.clone(),
        }))
    }

    #[instrument(name = "chunk_server_scan", skip(store))]
    async fn scan_existing_chunks(store: &FileStorage) -> Result<ChunkServerState> {
        let mut state = ChunkServerState::default();
        for name in store.available_chunks().await? {
            let Some((file_name, sequence_number)) = parse_chunk_name(&name) else {
                trace!(%name, "Ignoring non chunk file");
                continue;
            };
            let bytes = store.read(&name).await?;
            state.record(ChunkRecord::new(
                file_name,
                sequence_number,
                1,
                ChunkDigest::compute(&bytes),
            ));
        }
        let names = state.chunk_names();
        if !names.is_empty() {
            info!(count = names.len(), "Indexed chunks found on disk");
        }
        Ok(state)
    }

    pub async fn start(
        self: &Arc<Self>,
        listen_addrs: &str,
        controller_addrs: &str,
    ) -> Result<SocketAddr> {
        let server = TcpServer::bind(listen_addrs).await?;
        let local_addr = server.spawn(self.clone())?;
        self.register(controller_addrs, local_addr.port()).await?;
        HeartbeatLoop::new(self.clone()).start();
        info!(%local_addr, id = %self.settings.id, "Chunk server started");
        Ok(local_addr)
    }

    #[instrument(name = "chunk_server_register", skip(self))]
    async fn register(self: &Arc<Self>, controller_addrs: &str, port: u16) -> Result<()> {
        let connection = self
            .connections
            .get_or_connect(controller_addrs, self.clone())
            .await?;
        let (tx, rx) = oneshot::channel();
        *self.registration_waiter.lock().await = Some(tx);
        connection
            .send(&Event::RegisterChunkServer(Registration {
                ip: connection.local_addr().ip(),
                port: port as i32,
            }))
            .await?;
        let report = match timeout(self.settings.registration_timeout, rx).await {
            Ok(Ok(report)) => report,
            Ok(Err(_)) => return Err("registration reply channel dropped".into()),
            Err(_) => return Err("timed out waiting for the registration report".into()),
        };
        if !report.is_success() {
            error!(info = %report.info, "Registration denied by controller");
            return Err(format!("registration denied: {}", report.info).into());
        }
        info!(info = %report.info, "Registered with controller");
        let _ = self.controller.set(connection);
        Ok(())
    }

    pub(crate) fn handle(&self) -> Option<Arc<ChunkServer>> {
        self.me.upgrade()
    }

    pub(crate) fn controller_connection(&self) -> Option<&Arc<TcpConnection>> {
        self.controller.get()
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub async fn chunk_names(&self) -> Vec<String> {
        self.state.lock().await.chunk_names()
    }

    pub async fn chunk_record(&self, chunk_name: &str) -> Option<ChunkRecord> {
        self.state.lock().await.get(chunk_name).cloned()
    }

    pub(crate) fn free_space(&self) -> i64 {
        match self.store.available_storage() {
            Ok(kb) => kb as i64,
            Err(e) => {
                error!(error = %e, "Error while reading free space");
                0
            }
        }
    }

    async fn handle_registration_report(&self, report: RegistrationReport) {
        match self.registration_waiter.lock().await.take() {
            Some(waiter) => {
                let _ = waiter.send(report);
            }
            None => warn!(info = %report.info, "Registration report nobody waits for"),
        }
    }
}

#[async_trait]
impl Node for ChunkServer {
    fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    async fn on_event(&self, event: Event, origin: Arc<TcpConnection>) {
        match event {
            Event::StoreChunk(store_chunk) => self.store_chunk(store_chunk).await,
            Event::RetrieveChunkRequest { chunk_name } => {
                self.retrieve_chunk(&chunk_name, &origin).await
            }
            Event::FixCorruptChunk(fix) => self.fix_corrupt_chunk(fix).await,
            Event::RetrieveChunkResponse(response) => self.apply_repair(response).await,
            Event::ReportChunkServerRegistration(report) => {
                self.handle_registration_report(report).await
            }
            Event::LivenessHeartbeat => debug!("Liveness probe received"),
            other => {
                warn!(event_type = %other.event_type(), peer = %origin.peer_addr(), "Unexpected event for chunk server, dropping");
            }
        }
    }
}
