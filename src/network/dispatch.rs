use log::{debug, warn};

use crate::chord::actor::ChordHandle;
use crate::chord::types::NodeStatus;
use crate::error::ChordError;
use crate::network::protocol::{PeerRequest, PeerResponse, ALIVE_TOKEN};

/// The single inbound entry point: admits a peer request for the node's
/// current status and answers it from the ring actor.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    handle: ChordHandle,
}

impl Dispatcher {
    pub fn new(handle: ChordHandle) -> Self {
        Self { handle }
    }

    pub async fn handle(&self, request: PeerRequest) -> Result<PeerResponse, ChordError> {
        let status = self.handle.status().await?;
        if !admits(status, &request) {
            warn!("{} refused {} while {}", self.handle.address(), request.kind(), status);
            return Err(ChordError::NotActive(format!(
                "{} cannot serve {} while {}",
                self.handle.address(),
                request.kind(),
                status
            )));
        }
        debug!("{} handling {}", self.handle.address(), request.kind());

        let response = match request {
            PeerRequest::GetSuccessor { id } => {
                let (is_final, address) = self.handle.find_successor(id).await?;
                PeerResponse::Successor { is_final, address }
            }
            PeerRequest::GetPredecessor => PeerResponse::Predecessor(self.handle.predecessor().await?),
            PeerRequest::Notify { candidate } => {
                self.handle.notify(candidate).await?;
                PeerResponse::Ack
            }
            PeerRequest::LivenessProbe { sent_at } => PeerResponse::Alive {
                token: ALIVE_TOKEN.to_string(),
                sent_at,
            },
            PeerRequest::GetRingSize => PeerResponse::RingSize(self.handle.space().bits()),
            PeerRequest::StoreFile { file } => {
                self.handle.store_file(file).await?;
                PeerResponse::Ack
            }
            PeerRequest::GetSuccessorList => PeerResponse::SuccessorList(self.handle.successor_list().await?),
            PeerRequest::BulkInstall { files } => {
                self.handle.bulk_install(files).await?;
                PeerResponse::Ack
            }
            PeerRequest::GetTransferSet { new_predecessor } => {
                PeerResponse::TransferSet(self.handle.take_transfer_set(new_predecessor).await?)
            }
            PeerRequest::GetUserIdentifier => PeerResponse::UserIdentifier(self.handle.label().to_string()),
        };
        Ok(response)
    }
}

fn admits(status: NodeStatus, request: &PeerRequest) -> bool {
    match status {
        NodeStatus::Stopped => false,
        NodeStatus::Uninitialized => matches!(
            request,
            PeerRequest::LivenessProbe { .. } | PeerRequest::GetRingSize | PeerRequest::GetUserIdentifier
        ),
        NodeStatus::Leaving => !matches!(
            request,
            PeerRequest::StoreFile { .. } | PeerRequest::BulkInstall { .. } | PeerRequest::GetTransferSet { .. }
        ),
        NodeStatus::Joining | NodeStatus::Active => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::types::{ChordState, File, IdSpace, NodeId};
    use crate::storage::MemoryContentStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn dispatcher() -> (Dispatcher, ChordHandle) {
        let space = IdSpace::new(8).unwrap();
        let state = ChordState::new(space, "127.0.0.1:9000".into(), "alice".into(), 3);
        let (handle, actor) = ChordHandle::new(state, Arc::new(MemoryContentStore::new()));
        tokio::spawn(actor.run());
        (Dispatcher::new(handle.clone()), handle)
    }

    fn file() -> File {
        File {
            id: NodeId::from_u64(9),
            name: "notes.txt".into(),
            content: Bytes::from_static(b"hi"),
        }
    }

    #[tokio::test]
    async fn uninitialized_node_answers_only_identity_requests() {
        let (dispatcher, _) = dispatcher();

        assert_eq!(
            dispatcher.handle(PeerRequest::GetRingSize).await.unwrap(),
            PeerResponse::RingSize(8)
        );
        assert_eq!(
            dispatcher.handle(PeerRequest::GetUserIdentifier).await.unwrap(),
            PeerResponse::UserIdentifier("alice".into())
        );
        assert!(matches!(
            dispatcher.handle(PeerRequest::LivenessProbe { sent_at: 7 }).await.unwrap(),
            PeerResponse::Alive { sent_at: 7, .. }
        ));
        assert!(matches!(
            dispatcher.handle(PeerRequest::GetPredecessor).await,
            Err(ChordError::NotActive(_))
        ));
    }

    #[tokio::test]
    async fn leaving_node_refuses_new_data() {
        let (dispatcher, handle) = dispatcher();
        handle.create().await.unwrap();
        dispatcher.handle(PeerRequest::StoreFile { file: file() }).await.unwrap();

        handle.set_status(NodeStatus::Leaving).await.unwrap();
        assert!(dispatcher.handle(PeerRequest::StoreFile { file: file() }).await.is_err());
        assert!(dispatcher
            .handle(PeerRequest::GetTransferSet {
                new_predecessor: NodeId::from_u64(10)
            })
            .await
            .is_err());
        assert!(dispatcher.handle(PeerRequest::GetSuccessorList).await.is_ok());

        handle.set_status(NodeStatus::Stopped).await.unwrap();
        assert!(dispatcher.handle(PeerRequest::LivenessProbe { sent_at: 0 }).await.is_err());
    }
}
