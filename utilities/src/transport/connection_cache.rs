use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use tokio::sync::Mutex;
use tracing::trace;

use super::{connection::TcpConnection, error::TransportError, node::Node};

#[derive(Clone, Debug, Default)]
pub struct ConnectionCache {
    store: Arc<Mutex<HashMap<SocketAddr, Arc<TcpConnection>>>>,
    // one dial at a time per endpoint
    dialing: Arc<Mutex<HashMap<SocketAddr, Arc<Mutex<()>>>>>,
}

impl ConnectionCache {
    pub async fn get(&self, addr: &SocketAddr) -> Option<Arc<TcpConnection>> {
        self.store.lock().await.get(addr).cloned()
    }

    pub async fn contains(&self, addr: &SocketAddr) -> bool {
        self.store.lock().await.contains_key(addr)
    }

    pub async fn insert(&self, connection: Arc<TcpConnection>) {
        self.store
            .lock()
            .await
            .insert(connection.peer_addr(), connection);
    }

    pub async fn remove(&self, addr: &SocketAddr) -> Option<Arc<TcpConnection>> {
        self.store.lock().await.remove(addr)
    }

    pub async fn remove_connection(&self, connection: &TcpConnection) -> bool {
        let mut store = self.store.lock().await;
        match store.get(&connection.peer_addr()) {
            Some(cached) if cached.id() == connection.id() => {
                store.remove(&connection.peer_addr());
                true
            }
            _ => false,
        }
    }

    async fn live(&self, addr: &SocketAddr) -> Option<Arc<TcpConnection>> {
        let connection = self.get(addr).await?;
        if !connection.is_closed() {
            return Some(connection);
        }
        self.remove_connection(&connection).await;
        None
    }

    pub async fn get_or_connect(
        &self,
        endpoint: &str,
        node: Arc<dyn Node>,
    ) -> Result<Arc<TcpConnection>, TransportError> {
        let addr = tokio::net::lookup_host(endpoint)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_owned(),
                source,
            })?
            .next()
            .ok_or_else(|| TransportError::Unresolved(endpoint.to_owned()))?;
        if let Some(connection) = self.live(&addr).await {
            trace!(%addr, "Connection already present");
            return Ok(connection);
        }
        let slot = self.dialing.lock().await.entry(addr).or_default().clone();
        let _dialing = slot.lock().await;
        // a concurrent caller may have finished dialing while we waited
        if let Some(connection) = self.live(&addr).await {
            trace!(%addr, "Connection opened by a concurrent caller");
            return Ok(connection);
        }
        trace!(%addr, "Opening a new connection");
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_owned(),
                source,
            })?;
        TcpConnection::establish(stream, node, self).await
    }
}
