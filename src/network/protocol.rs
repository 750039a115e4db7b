use crate::chord::types::{File, FileBatch, NodeId};

/// Token returned by a liveness probe.
pub const ALIVE_TOKEN: &str = "all_good";

/// Every call a peer can make on a node.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRequest {
    GetSuccessor { id: NodeId },
    GetPredecessor,
    Notify { candidate: String },
    /// `sent_at` is the caller's clock in milliseconds, echoed back.
    LivenessProbe { sent_at: i64 },
    GetRingSize,
    StoreFile { file: File },
    GetSuccessorList,
    BulkInstall { files: FileBatch },
    GetTransferSet { new_predecessor: NodeId },
    GetUserIdentifier,
}

impl PeerRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerRequest::GetSuccessor { .. } => "GetSuccessor",
            PeerRequest::GetPredecessor => "GetPredecessor",
            PeerRequest::Notify { .. } => "Notify",
            PeerRequest::LivenessProbe { .. } => "LivenessProbe",
            PeerRequest::GetRingSize => "GetRingSize",
            PeerRequest::StoreFile { .. } => "StoreFile",
            PeerRequest::GetSuccessorList => "GetSuccessorList",
            PeerRequest::BulkInstall { .. } => "BulkInstall",
            PeerRequest::GetTransferSet { .. } => "GetTransferSet",
            PeerRequest::GetUserIdentifier => "GetUserIdentifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerResponse {
    Successor { is_final: bool, address: String },
    Predecessor(Option<String>),
    Ack,
    Alive { token: String, sent_at: i64 },
    RingSize(u32),
    SuccessorList(Vec<String>),
    TransferSet(FileBatch),
    UserIdentifier(String),
}
