use std::sync::Arc;

use async_trait::async_trait;
use proto::Event;

use super::{connection::TcpConnection, connection_cache::ConnectionCache};

#[async_trait]
pub trait Node: Send + Sync + 'static {
    fn connections(&self) -> &ConnectionCache;

    async fn on_event(&self, event: Event, origin: Arc<TcpConnection>);

    async fn on_disconnect(&self, origin: &TcpConnection) {
        self.connections().remove_connection(origin).await;
    }
}
