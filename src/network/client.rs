use log::debug;
use std::sync::Arc;

use crate::chord::types::{File, FileBatch, NodeId};
use crate::error::NetworkError;
use crate::network::protocol::{PeerRequest, PeerResponse};
use crate::network::transport::PeerTransport;

/// Typed wrapper over a [`PeerTransport`], one method per request kind.
#[derive(Clone)]
pub struct PeerClient {
    transport: Arc<dyn PeerTransport>,
}

impl PeerClient {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self { transport }
    }

    pub async fn find_successor(&self, address: &str, id: NodeId) -> Result<(bool, String), NetworkError> {
        match self.transport.call(address, PeerRequest::GetSuccessor { id }).await? {
            PeerResponse::Successor { is_final, address } => Ok((is_final, address)),
            _ => Err(NetworkError::UnexpectedResponse("GetSuccessor")),
        }
    }

    pub async fn get_predecessor(&self, address: &str) -> Result<Option<String>, NetworkError> {
        match self.transport.call(address, PeerRequest::GetPredecessor).await? {
            PeerResponse::Predecessor(predecessor) => Ok(predecessor),
            _ => Err(NetworkError::UnexpectedResponse("GetPredecessor")),
        }
    }

    pub async fn notify(&self, address: &str, candidate: &str) -> Result<(), NetworkError> {
        let request = PeerRequest::Notify {
            candidate: candidate.to_string(),
        };
        match self.transport.call(address, request).await? {
            PeerResponse::Ack => Ok(()),
            _ => Err(NetworkError::UnexpectedResponse("Notify")),
        }
    }

    /// Any successful reply counts as alive, whatever the token says.
    pub async fn is_alive(&self, address: &str) -> bool {
        let sent_at = chrono::Utc::now().timestamp_millis();
        match self.transport.call(address, PeerRequest::LivenessProbe { sent_at }).await {
            Ok(PeerResponse::Alive { token, sent_at }) => {
                let rtt = chrono::Utc::now().timestamp_millis() - sent_at;
                debug!("{} answered liveness probe with {:?} in {}ms", address, token, rtt);
                true
            }
            Ok(_) => true,
            Err(e) => {
                debug!("Liveness probe to {} failed: {}", address, e);
                false
            }
        }
    }

    pub async fn ring_size(&self, address: &str) -> Result<u32, NetworkError> {
        match self.transport.call(address, PeerRequest::GetRingSize).await? {
            PeerResponse::RingSize(bits) => Ok(bits),
            _ => Err(NetworkError::UnexpectedResponse("GetRingSize")),
        }
    }

    pub async fn store_file(&self, address: &str, file: File) -> Result<(), NetworkError> {
        match self.transport.call(address, PeerRequest::StoreFile { file }).await? {
            PeerResponse::Ack => Ok(()),
            _ => Err(NetworkError::UnexpectedResponse("StoreFile")),
        }
    }

    pub async fn successor_list(&self, address: &str) -> Result<Vec<String>, NetworkError> {
        match self.transport.call(address, PeerRequest::GetSuccessorList).await? {
            PeerResponse::SuccessorList(list) => Ok(list),
            _ => Err(NetworkError::UnexpectedResponse("GetSuccessorList")),
        }
    }

    pub async fn bulk_install(&self, address: &str, files: FileBatch) -> Result<(), NetworkError> {
        match self.transport.call(address, PeerRequest::BulkInstall { files }).await? {
            PeerResponse::Ack => Ok(()),
            _ => Err(NetworkError::UnexpectedResponse("BulkInstall")),
        }
    }

    pub async fn transfer_set(&self, address: &str, new_predecessor: NodeId) -> Result<FileBatch, NetworkError> {
        match self
            .transport
            .call(address, PeerRequest::GetTransferSet { new_predecessor })
            .await?
        {
            PeerResponse::TransferSet(files) => Ok(files),
            _ => Err(NetworkError::UnexpectedResponse("GetTransferSet")),
        }
    }

    pub async fn user_identifier(&self, address: &str) -> Result<String, NetworkError> {
        match self.transport.call(address, PeerRequest::GetUserIdentifier).await? {
            PeerResponse::UserIdentifier(label) => Ok(label),
            _ => Err(NetworkError::UnexpectedResponse("GetUserIdentifier")),
        }
    }
}
