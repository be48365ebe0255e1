use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{Instrument, Span, debug, error, info};

use super::{connection::TcpConnection, error::TransportError, node::Node};

pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: address.to_owned(),
                source,
            })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn start_and_accept(self, node: Arc<dyn Node>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Listening for connections");
        }
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Error while accepting a connection");
                    continue;
                }
            };
            debug!(%peer, "Accepted connection");
            let node = node.clone();
            tokio::spawn(
                async move {
                    let cache = node.connections().clone();
                    if let Err(e) = TcpConnection::establish(stream, node, &cache).await {
                        error!(%peer, error = %e, "Error while setting up accepted connection");
                    }
                }
                .instrument(Span::current()),
            );
        }
    }

    pub fn spawn(self, node: Arc<dyn Node>) -> Result<SocketAddr, TransportError> {
        let addr = self.local_addr()?;
        tokio::spawn(self.start_and_accept(node).instrument(Span::current()));
        Ok(addr)
    }
}
