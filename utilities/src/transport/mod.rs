mod connection;
mod connection_cache;
mod error;
mod node;
mod server;
#[cfg(any(test, feature = "test-util"))]
mod test_peer;

pub use connection::TcpConnection;
pub use connection_cache::ConnectionCache;
pub use error::TransportError;
pub use node::Node;
pub use server::TcpServer;
#[cfg(any(test, feature = "test-util"))]
pub use test_peer::PeerHandle;
