use std::path::PathBuf;
use thiserror::Error;

use crate::chord::types::NodeId;

#[derive(Error, Debug)]
pub enum ChordFsError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Chord protocol error: {0}")]
    Chord(#[from] ChordError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures talking to a peer. Always treated as "peer down" by the caller.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("Call rejected by {address}: {reason}")]
    Rejected { address: String, reason: String },

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("gRPC error: {0}")]
    Grpc(String),
}

#[derive(Error, Debug)]
pub enum ChordError {
    #[error("Lookup for {id} did not converge within {steps} steps")]
    RoutingExhausted { id: NodeId, steps: usize },

    #[error("Failed to join ring: {0}")]
    JoinFailed(String),

    #[error("Request refused: {0}")]
    NotActive(String),

    #[error("File id {id} is not owned by this node")]
    NotOwner { id: NodeId },

    #[error("Handoff failed: {0}")]
    HandoffFailed(String),

    #[error("Ring state actor is unavailable")]
    ActorUnavailable,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Message(#[from] MessageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
}

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid message format: {0}")]
    InvalidFormat(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
