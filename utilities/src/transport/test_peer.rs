use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use proto::Event;
use tokio::{sync::mpsc, time::timeout};

use super::{connection::TcpConnection, connection_cache::ConnectionCache, node::Node};

struct Inbox {
    connections: ConnectionCache,
    events: mpsc::UnboundedSender<Event>,
}

#[async_trait]
impl Node for Inbox {
    fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    async fn on_event(&self, event: Event, _origin: Arc<TcpConnection>) {
        let _ = self.events.send(event);
    }
}

pub struct PeerHandle {
    connection: Arc<TcpConnection>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl PeerHandle {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(Inbox {
            connections: ConnectionCache::default(),
            events,
        });
        let connection = TcpConnection::connect(&addr.to_string(), inbox)
            .await
            .unwrap();
        Self {
            connection,
            events: events_rx,
        }
    }

    pub fn connection(&self) -> &Arc<TcpConnection> {
        &self.connection
    }

    pub async fn send(&self, event: Event) {
        self.connection.send(&event).await.unwrap();
    }

    pub async fn next_event(&mut self) -> Event {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("no event within 5s")
            .expect("peer channel closed")
    }

    // skips liveness probes
    pub async fn next_non_probe_event(&mut self) -> Event {
        loop {
            match self.next_event().await {
                Event::LivenessHeartbeat => continue,
                event => return event,
            }
        }
    }

    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(Some(event)) = timeout(wait, self.events.recv()).await {
            panic!("unexpected event {event:?}");
        }
    }
}
