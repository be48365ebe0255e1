use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use proto::{
    Event,
    events::{RegistrationReport, ReplicaEndpoint, StoreChunk},
};
use tempfile::TempDir;
use tokio::sync::Mutex;
use utilities::transport::{ConnectionCache, Node, PeerHandle, TcpConnection, TcpServer};

use crate::chunk_server::{ChunkServer, ChunkServerSettings};

struct Recorder {
    connections: ConnectionCache,
    events: Mutex<Vec<Event>>,
    deny_registration: bool,
}

#[async_trait]
impl Node for Recorder {
    fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    async fn on_event(&self, event: Event, origin: Arc<TcpConnection>) {
        if let Event::RegisterChunkServer(_) = &event {
            let report = if self.deny_registration {
                RegistrationReport::failure("Registration request unsuccessful. Denied")
            } else {
                RegistrationReport::success("Registration request successful")
            };
            let _ = origin
                .send(&Event::ReportChunkServerRegistration(report))
                .await;
        }
        self.events.lock().await.push(event);
    }
}

pub struct FakeController {
    recorder: Arc<Recorder>,
    pub addr: SocketAddr,
}

impl FakeController {
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    pub async fn start_denying() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(deny_registration: bool) -> Self {
        let recorder = Arc::new(Recorder {
            connections: ConnectionCache::default(),
            events: Mutex::new(Vec::new()),
            deny_registration,
        });
        let addr = TcpServer::bind("127.0.0.1:0")
            .await
            .unwrap()
            .spawn(recorder.clone())
            .unwrap();
        Self { recorder, addr }
    }

    pub fn node(&self) -> Arc<dyn Node> {
        self.recorder.clone()
    }

    pub async fn events_matching(&self, filter: impl Fn(&Event) -> bool) -> Vec<Event> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.recorder
            .events
            .lock()
            .await
            .iter()
            .filter(|event| filter(event))
            .cloned()
            .collect()
    }

    pub async fn client_to(&self, addr: SocketAddr) -> PeerHandle {
        PeerHandle::connect(addr).await
    }
}

pub struct ChunkServerHandle {
    pub node: Arc<ChunkServer>,
    pub listen_addr: SocketAddr,
    chunk_dir: PathBuf,
    _dir: Option<TempDir>,
}

impl ChunkServerHandle {
    pub fn chunk_dir(&self) -> &Path {
        &self.chunk_dir
    }

    pub async fn wait_for_chunk(&self, chunk_name: &str) {
        for _ in 0..250 {
            if self.node.chunk_record(chunk_name).await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{chunk_name} never arrived at {}", self.listen_addr);
    }
}

pub fn settings(chunk_dir: &Path) -> ChunkServerSettings {
    ChunkServerSettings {
        id: "test-chunk-server".into(),
        chunk_dir: chunk_dir.to_path_buf(),
        major_heartbeat: Duration::from_secs(3600),
        minor_heartbeat: Duration::from_secs(3600),
        registration_timeout: Duration::from_secs(5),
    }
}

pub async fn start_chunk_server(controller: &FakeController) -> ChunkServerHandle {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = start_chunk_server_with(controller, settings(dir.path())).await;
    handle._dir = Some(dir);
    handle
}

pub async fn start_chunk_server_with(
    controller: &FakeController,
    settings: ChunkServerSettings,
) -> ChunkServerHandle {
    let chunk_dir = settings.chunk_dir.clone();
    let node = ChunkServer::new(settings).await.unwrap();
    let listen_addr = node
        .start("127.0.0.1:0", &controller.addr.to_string())
        .await
        .unwrap();
    ChunkServerHandle {
        node,
        listen_addr,
        chunk_dir,
        _dir: None,
    }
}

pub fn replica(addr: SocketAddr) -> ReplicaEndpoint {
    ReplicaEndpoint {
        host: addr.ip().to_string(),
        port: addr.port() as i32,
    }
}

pub fn store_instruction(
    file_name: &str,
    sequence_number: i32,
    chunk: &[u8],
    next_chunk_servers: Vec<ReplicaEndpoint>,
) -> StoreChunk {
    StoreChunk {
        sequence_number,
        version: 1,
        file_name: file_name.to_owned(),
        chunk: chunk.to_vec(),
        next_chunk_servers,
    }
}

pub fn sample_chunk(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 253) as u8).collect()
}
