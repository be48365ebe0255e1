use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock, Weak},
    time::Duration,
};

use async_trait::async_trait;
use proto::{
    Event,
    chunk::parse_chunk_name,
    events::{ChunkServerAddress, Registration, RegistrationReport, RetrieveChunkResponse, RetrieveFileResponse},
};
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    time::timeout,
};
use utilities::{
    logger::{info, instrument, warn},
    transport::{ConnectionCache, Node, TcpConnection, TcpServer},
};

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub output_dir: PathBuf,
    pub reply_timeout: Duration,
}

#[derive(Default)]
struct PendingReplies {
    registration: Option<oneshot::Sender<RegistrationReport>>,
    replica_sets: VecDeque<oneshot::Sender<Vec<ChunkServerAddress>>>,
    file_locations: HashMap<String, Vec<oneshot::Sender<RetrieveFileResponse>>>,
    chunk_arrivals: HashMap<String, mpsc::UnboundedSender<RetrieveChunkResponse>>,
}

pub struct Client {
    pub(crate) settings: ClientSettings,
    pub(crate) connections: ConnectionCache,
    controller: OnceLock<Arc<TcpConnection>>,
    pending: Mutex<PendingReplies>,
    me: Weak<Client>,
}

impl Client {
    pub fn new(settings: ClientSettings) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            settings,
            connections: ConnectionCache::default(),
            controller: OnceLock::new(),
            pending: Mutex::new(PendingReplies::default()),
            me: me.clone(),
        })
    }

    pub async fn start(
        self: &Arc<Self>,
        listen_addrs: &str,
        controller_addrs: &str,
    ) -> Result<SocketAddr, ClientError> {
        let server = TcpServer::bind(listen_addrs).await?;
        let local_addr = server.spawn(self.clone())?;
        self.register(controller_addrs, local_addr.port()).await?;
        info!(%local_addr, "Client started");
        Ok(local_addr)
    }

    #[instrument(name = "client_register", skip(self))]
    async fn register(self: &Arc<Self>, controller_addrs: &str, port: u16) -> Result<(), ClientError> {
        let connection = self
            .connections
            .get_or_connect(controller_addrs, self.clone())
            .await?;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.registration = Some(tx);
        connection
            .send(&Event::RegisterClient(Registration {
                ip: connection.local_addr().ip(),
                port: port as i32,
            }))
            .await?;
        let report = self.wait_for(rx, "registration report").await?;
        if !report.is_success() {
            return Err(ClientError::RegistrationDenied(report.info));
        }
        info!(info = %report.info, "Registered with controller");
        let _ = self.controller.set(connection);
        Ok(())
    }

    pub(crate) fn node(&self) -> Option<Arc<Client>> {
        self.me.upgrade()
    }

    pub(crate) fn controller(&self) -> Result<&Arc<TcpConnection>, ClientError> {
        self.controller.get().ok_or(ClientError::NotConnected)
    }

    pub(crate) async fn wait_for<T>(
        &self,
        rx: oneshot::Receiver<T>,
        waiting_for: &str,
    ) -> Result<T, ClientError> {
        match timeout(self.settings.reply_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            _ => Err(ClientError::TimedOut {
                waiting_for: waiting_for.to_owned(),
            }),
        }
    }

    pub(crate) async fn expect_replica_set(&self) -> oneshot::Receiver<Vec<ChunkServerAddress>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.replica_sets.push_back(tx);
        rx
    }

    pub(crate) async fn expect_file_locations(
        &self,
        file_name: &str,
    ) -> oneshot::Receiver<RetrieveFileResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .file_locations
            .entry(file_name.to_owned())
            .or_default()
            .push(tx);
        rx
    }

    // one retrieval per file name at a time, chunks carry no request id
    pub(crate) async fn expect_chunks(
        &self,
        file_name: &str,
    ) -> Result<mpsc::UnboundedReceiver<RetrieveChunkResponse>, ClientError> {
        let mut pending = self.pending.lock().await;
        if pending.chunk_arrivals.contains_key(file_name) {
            return Err(ClientError::FetchInProgress(file_name.to_owned()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        pending.chunk_arrivals.insert(file_name.to_owned(), tx);
        Ok(rx)
    }

    pub(crate) async fn stop_chunk_arrivals(&self, file_name: &str) {
        self.pending.lock().await.chunk_arrivals.remove(file_name);
    }

    async fn deliver_replica_set(&self, replica_set: Vec<ChunkServerAddress>) {
        let mut pending = self.pending.lock().await;
        // waiters that timed out have dropped their receiver
        while let Some(waiter) = pending.replica_sets.pop_front() {
            if waiter.send(replica_set.clone()).is_ok() {
                return;
            }
        }
        warn!("Replica set arrived with nobody waiting");
    }

    async fn deliver_file_locations(&self, response: RetrieveFileResponse) {
        let waiters = self
            .pending
            .lock()
            .await
            .file_locations
            .remove(&response.file_name)
            .unwrap_or_default();
        if waiters.is_empty() {
            warn!(file_name = %response.file_name, "File locations arrived with nobody waiting");
        }
        for waiter in waiters {
            let _ = waiter.send(response.clone());
        }
    }

    async fn deliver_chunk(&self, response: RetrieveChunkResponse) {
        let Some(file_name) = parse_chunk_name(&response.chunk_name)
            .map(|(file_name, _)| file_name.to_owned())
        else {
            warn!(chunk_name = %response.chunk_name, "Chunk with an invalid name");
            return;
        };
        let pending = self.pending.lock().await;
        match pending.chunk_arrivals.get(&file_name) {
            Some(arrivals) => {
                if arrivals.send(response).is_err() {
                    warn!(%file_name, "Chunk arrived after the retrieval ended");
                }
            }
            None => warn!(chunk_name = %response.chunk_name, "Chunk arrived with nobody waiting"),
        }
    }
}

#[async_trait]
impl Node for Client {
    fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    async fn on_event(&self, event: Event, origin: Arc<TcpConnection>) {
        match event {
            Event::ReportClientRegistration(report) => {
                match self.pending.lock().await.registration.take() {
                    Some(waiter) => {
                        let _ = waiter.send(report);
                    }
                    None => warn!(info = %report.info, "Registration report nobody waits for"),
                }
            }
            Event::ControllerSendsClientChunkServers(replica_set) => {
                self.deliver_replica_set(replica_set).await
            }
            Event::RetrieveFileResponse(response) => self.deliver_file_locations(response).await,
            Event::RetrieveChunkResponse(response) => self.deliver_chunk(response).await,
            other => {
                warn!(event_type = %other.event_type(), peer = %origin.peer_addr(), "Unexpected event for client, dropping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Arc<Client> {
        Client::new(ClientSettings {
            output_dir: PathBuf::from("unused"),
            reply_timeout: Duration::from_millis(100),
        })
    }

    #[tokio::test]
    async fn second_retrieval_of_the_same_file_is_refused_while_one_runs() {
        let client = client();
        let mut first = client.expect_chunks("report.pdf").await.unwrap();
        let second = client.expect_chunks("report.pdf").await;
        assert!(matches!(second, Err(ClientError::FetchInProgress(name)) if name == "report.pdf"));
        // other files are unaffected
        assert!(client.expect_chunks("other.bin").await.is_ok());

        // the first retrieval still receives its chunks
        client
            .deliver_chunk(RetrieveChunkResponse {
                chunk_name: "report.pdf_chunk1".into(),
                chunk: b"abc".to_vec(),
                chunk_hash: String::new(),
            })
            .await;
        assert_eq!(first.recv().await.unwrap().chunk_name, "report.pdf_chunk1");

        client.stop_chunk_arrivals("report.pdf").await;
        assert!(client.expect_chunks("report.pdf").await.is_ok());
    }
}
