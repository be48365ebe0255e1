use std::net::SocketAddr;

use proto::{EncodeError, EventType, framing::FrameError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not resolve {0}")]
    Unresolved(String),
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {event_type}: {source}")]
    Encode {
        event_type: EventType,
        #[source]
        source: EncodeError,
    },
    #[error("connection to {0} is closed")]
    Closed(SocketAddr),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
