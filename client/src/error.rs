use std::{io, path::PathBuf};

use thiserror::Error;
use utilities::transport::TransportError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("timed out waiting for {waiting_for}")]
    TimedOut { waiting_for: String },
    #[error("registration denied: {0}")]
    RegistrationDenied(String),
    #[error("not connected to a controller")]
    NotConnected,
    #[error("no chunk server holds {chunk_name}")]
    MissingReplica { chunk_name: String },
    #[error("{chunk_name} does not match its hash")]
    CorruptChunk { chunk_name: String },
    #[error("{0} is already being retrieved")]
    FetchInProgress(String),
    #[error("replica set has {0} chunk servers")]
    InvalidReplicaSet(usize),
    #[error("file too large to describe: {0} bytes")]
    FileTooLarge(usize),
    #[error("{} not found", .0.display())]
    FileNotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
