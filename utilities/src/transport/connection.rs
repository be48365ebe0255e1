use std::{
    net::SocketAddr,
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use proto::{
    Event,
    framing::{FrameError, read_frame, write_frame},
};
use tokio::{
    io::{AsyncWriteExt, BufReader, BufWriter},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    task::AbortHandle,
};
use tracing::{Instrument, debug, info_span, trace, warn};

use super::{connection_cache::ConnectionCache, error::TransportError, node::Node};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

enum Writer {
    // write half not used yet
    Idle(OwnedWriteHalf),
    Ready(BufWriter<OwnedWriteHalf>),
    Shutdown,
}

/// One duplex stream to a peer.
///
/// A dedicated reader task decodes incoming frames and hands them to the
/// owning [`Node`] in arrival order. Sends from any number of tasks are
/// serialized by the writer lock, which is held for a whole frame.
pub struct TcpConnection {
    id: u64,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    writer: Mutex<Writer>,
    closed: AtomicBool,
    reader: OnceLock<AbortHandle>,
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl TcpConnection {
    pub async fn connect(endpoint: &str, node: Arc<dyn Node>) -> Result<Arc<Self>, TransportError> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_owned(),
                source,
            })?;
        let (connection, read_half) = Self::wrap(stream)?;
        connection.spawn_reader(read_half, node);
        Ok(connection)
    }

    pub async fn establish(
        stream: TcpStream,
        node: Arc<dyn Node>,
        cache: &ConnectionCache,
    ) -> Result<Arc<Self>, TransportError> {
        let (connection, read_half) = Self::wrap(stream)?;
        cache.insert(connection.clone()).await;
        connection.spawn_reader(read_half, node);
        Ok(connection)
    }

    fn wrap(stream: TcpStream) -> Result<(Arc<Self>, OwnedReadHalf), TransportError> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let (read_half, write_half) = stream.into_split();
        let connection = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer_addr,
            local_addr,
            writer: Mutex::new(Writer::Idle(write_half)),
            closed: AtomicBool::new(false),
            reader: OnceLock::new(),
        });
        Ok((connection, read_half))
    }

    fn spawn_reader(self: &Arc<Self>, read_half: OwnedReadHalf, node: Arc<dyn Node>) {
        let span = info_span!("connection_reader", peer = %self.peer_addr, id = self.id);
        let handle = tokio::spawn(
            Self::read_loop(Arc::downgrade(self), BufReader::new(read_half), node).instrument(span),
        );
        let _ = self.reader.set(handle.abort_handle());
    }

    async fn read_loop(
        connection: Weak<TcpConnection>,
        mut read_half: BufReader<OwnedReadHalf>,
        node: Arc<dyn Node>,
    ) {
        loop {
            let payload = match read_frame(&mut read_half).await {
                Ok(payload) => payload,
                Err(FrameError::Empty) => {
                    warn!("Dropping zero length frame");
                    continue;
                }
                Err(FrameError::Closed) => {
                    debug!("Peer closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Reader stopped");
                    break;
                }
            };
            let Some(origin) = connection.upgrade() else {
                break;
            };
            match Event::decode(&payload) {
                Ok(event) => {
                    trace!(event_type = %event.event_type(), "Received event");
                    node.on_event(event, origin).await;
                }
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable frame");
                }
            }
        }
        if let Some(origin) = connection.upgrade() {
            origin.closed.store(true, Ordering::Release);
            node.on_disconnect(&origin).await;
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn send(&self, event: &Event) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed(self.peer_addr));
        }
        let payload = event.encode().map_err(|source| TransportError::Encode {
            event_type: event.event_type(),
            source,
        })?;
        let mut slot = self.writer.lock().await;
        if matches!(*slot, Writer::Idle(_)) {
            if let Writer::Idle(write_half) = std::mem::replace(&mut *slot, Writer::Shutdown) {
                *slot = Writer::Ready(BufWriter::new(write_half));
            }
        }
        let Writer::Ready(writer) = &mut *slot else {
            return Err(TransportError::Closed(self.peer_addr));
        };
        write_frame(writer, &payload).await?;
        writer.flush().await?;
        trace!(peer = %self.peer_addr, event_type = %event.event_type(), "Sent event");
        Ok(())
    }

    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(reader) = self.reader.get() {
            reader.abort();
        }
        let mut slot = self.writer.lock().await;
        match std::mem::replace(&mut *slot, Writer::Shutdown) {
            Writer::Idle(mut write_half) => {
                let _ = write_half.shutdown().await;
            }
            Writer::Ready(mut writer) => {
                let _ = writer.shutdown().await;
            }
            Writer::Shutdown => {}
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::{net::TcpListener, sync::mpsc};

    struct Recorder {
        connections: ConnectionCache,
        events: mpsc::UnboundedSender<Event>,
        disconnects: mpsc::UnboundedSender<SocketAddr>,
    }

    #[async_trait]
    impl Node for Recorder {
        fn connections(&self) -> &ConnectionCache {
            &self.connections
        }
        async fn on_event(&self, event: Event, _origin: Arc<TcpConnection>) {
            let _ = self.events.send(event);
        }
        async fn on_disconnect(&self, origin: &TcpConnection) {
            self.connections.remove_connection(origin).await;
            let _ = self.disconnects.send(origin.peer_addr());
        }
    }

    fn recorder() -> (
        Arc<Recorder>,
        mpsc::UnboundedReceiver<Event>,
        mpsc::UnboundedReceiver<SocketAddr>,
    ) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (disconnects, disconnects_rx) = mpsc::unbounded_channel();
        let node = Arc::new(Recorder {
            connections: ConnectionCache::default(),
            events,
            disconnects,
        });
        (node, events_rx, disconnects_rx)
    }

    #[tokio::test]
    async fn concurrent_senders_never_interleave_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (server_node, mut received, _) = recorder();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let cache = server_node.connections().clone();
            TcpConnection::establish(stream, server_node, &cache)
                .await
                .unwrap()
        });

        let (client_node, _, _) = recorder();
        let connection = TcpConnection::connect(&addr.to_string(), client_node)
            .await
            .unwrap();
        let _server_side = accept.await.unwrap();

        let mut senders = Vec::new();
        for i in 0..8 {
            let connection = connection.clone();
            senders.push(tokio::spawn(async move {
                let event = Event::RetrieveChunkRequest {
                    chunk_name: format!("file_chunk{i}"),
                };
                for _ in 0..25 {
                    connection.send(&event).await.unwrap();
                }
            }));
        }
        for sender in senders {
            sender.await.unwrap();
        }
        for _ in 0..200 {
            let event = received.recv().await.unwrap();
            assert!(matches!(event, Event::RetrieveChunkRequest { .. }));
        }
    }

    #[tokio::test]
    async fn closing_one_side_fires_the_disconnect_hook_and_evicts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (server_node, _, mut disconnects) = recorder();
        let server_cache = server_node.connections().clone();
        let accept = {
            let server_cache = server_cache.clone();
            tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                TcpConnection::establish(stream, server_node, &server_cache)
                    .await
                    .unwrap()
            })
        };
        let (client_node, _, _) = recorder();
        let connection = TcpConnection::connect(&addr.to_string(), client_node)
            .await
            .unwrap();
        let server_side = accept.await.unwrap();
        assert!(server_cache.contains(&server_side.peer_addr()).await);

        connection.close().await;
        let gone = disconnects.recv().await.unwrap();
        assert_eq!(gone, connection.local_addr());
        assert!(!server_cache.contains(&gone).await);
        assert!(server_side.is_closed());
        assert!(matches!(
            server_side.send(&Event::LivenessHeartbeat).await,
            Err(TransportError::Closed(_))
        ));
    }
}
