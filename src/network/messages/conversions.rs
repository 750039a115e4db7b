use crate::chord::types::{File, FileBatch, NodeId};
use crate::error::MessageError;
use crate::network::messages::chord::{
    self as wire, peer_request, peer_response, BulkInstallRequest, Empty, FileEntry,
    FindSuccessorRequest, FindSuccessorResponse, HeartbeatRequest, HeartbeatResponse,
    IdentifierResponse, KeyFiles, NotifyRequest, PredecessorResponse, RingSizeResponse,
    StoreFileRequest, SuccessorListResponse, TransferSetRequest, TransferSetResponse,
};
use crate::network::protocol::{PeerRequest, PeerResponse};

impl From<File> for FileEntry {
    fn from(file: File) -> Self {
        FileEntry {
            id: file.id.to_bytes().to_vec(),
            name: file.name,
            content: file.content,
        }
    }
}

impl TryFrom<FileEntry> for File {
    type Error = MessageError;

    fn try_from(entry: FileEntry) -> Result<Self, Self::Error> {
        Ok(File {
            id: NodeId::from_bytes(&entry.id)?,
            name: entry.name,
            content: entry.content,
        })
    }
}

fn batch_to_wire(batch: FileBatch) -> Vec<KeyFiles> {
    batch
        .into_iter()
        .map(|(key, files)| KeyFiles {
            key: key.to_bytes().to_vec(),
            files: files.into_iter().map(FileEntry::from).collect(),
        })
        .collect()
}

fn batch_from_wire(entries: Vec<KeyFiles>) -> Result<FileBatch, MessageError> {
    let mut batch = FileBatch::new();
    for entry in entries {
        let key = NodeId::from_bytes(&entry.key)?;
        let files = entry
            .files
            .into_iter()
            .map(File::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        batch.entry(key).or_default().extend(files);
    }
    Ok(batch)
}

impl From<PeerRequest> for wire::PeerRequest {
    fn from(request: PeerRequest) -> Self {
        use peer_request::Kind;
        let kind = match request {
            PeerRequest::GetSuccessor { id } => Kind::GetSuccessor(FindSuccessorRequest {
                id: id.to_bytes().to_vec(),
            }),
            PeerRequest::GetPredecessor => Kind::GetPredecessor(Empty {}),
            PeerRequest::Notify { candidate } => Kind::Notify(NotifyRequest { address: candidate }),
            PeerRequest::LivenessProbe { sent_at } => {
                Kind::LivenessProbe(HeartbeatRequest { timestamp: sent_at })
            }
            PeerRequest::GetRingSize => Kind::GetRingSize(Empty {}),
            PeerRequest::StoreFile { file } => Kind::StoreFile(StoreFileRequest {
                file: Some(file.into()),
            }),
            PeerRequest::GetSuccessorList => Kind::GetSuccessorList(Empty {}),
            PeerRequest::BulkInstall { files } => Kind::BulkInstall(BulkInstallRequest {
                entries: batch_to_wire(files),
            }),
            PeerRequest::GetTransferSet { new_predecessor } => {
                Kind::GetTransferSet(TransferSetRequest {
                    new_predecessor_id: new_predecessor.to_bytes().to_vec(),
                })
            }
            PeerRequest::GetUserIdentifier => Kind::GetUserIdentifier(Empty {}),
        };
        wire::PeerRequest { kind: Some(kind) }
    }
}

impl TryFrom<wire::PeerRequest> for PeerRequest {
    type Error = MessageError;

    fn try_from(request: wire::PeerRequest) -> Result<Self, Self::Error> {
        use peer_request::Kind;
        let kind = request.kind.ok_or(MessageError::MissingField("PeerRequest.kind"))?;
        Ok(match kind {
            Kind::GetSuccessor(req) => PeerRequest::GetSuccessor {
                id: NodeId::from_bytes(&req.id)?,
            },
            Kind::GetPredecessor(_) => PeerRequest::GetPredecessor,
            Kind::Notify(req) => PeerRequest::Notify {
                candidate: req.address,
            },
            Kind::LivenessProbe(req) => PeerRequest::LivenessProbe {
                sent_at: req.timestamp,
            },
            Kind::GetRingSize(_) => PeerRequest::GetRingSize,
            Kind::StoreFile(req) => PeerRequest::StoreFile {
                file: req
                    .file
                    .ok_or(MessageError::MissingField("StoreFileRequest.file"))?
                    .try_into()?,
            },
            Kind::GetSuccessorList(_) => PeerRequest::GetSuccessorList,
            Kind::BulkInstall(req) => PeerRequest::BulkInstall {
                files: batch_from_wire(req.entries)?,
            },
            Kind::GetTransferSet(req) => PeerRequest::GetTransferSet {
                new_predecessor: NodeId::from_bytes(&req.new_predecessor_id)?,
            },
            Kind::GetUserIdentifier(_) => PeerRequest::GetUserIdentifier,
        })
    }
}

impl From<PeerResponse> for wire::PeerResponse {
    fn from(response: PeerResponse) -> Self {
        use peer_response::Kind;
        let kind = match response {
            PeerResponse::Successor { is_final, address } => {
                Kind::Successor(FindSuccessorResponse { is_final, address })
            }
            PeerResponse::Predecessor(address) => Kind::Predecessor(PredecessorResponse {
                address: address.unwrap_or_default(),
            }),
            PeerResponse::Ack => Kind::Ack(Empty {}),
            PeerResponse::Alive { token, sent_at } => Kind::Alive(HeartbeatResponse {
                token,
                timestamp: sent_at,
            }),
            PeerResponse::RingSize(bits) => Kind::RingSize(RingSizeResponse { bits }),
            PeerResponse::SuccessorList(addresses) => {
                Kind::SuccessorList(SuccessorListResponse { addresses })
            }
            PeerResponse::TransferSet(files) => Kind::TransferSet(TransferSetResponse {
                entries: batch_to_wire(files),
            }),
            PeerResponse::UserIdentifier(label) => {
                Kind::UserIdentifier(IdentifierResponse { label })
            }
        };
        wire::PeerResponse { kind: Some(kind) }
    }
}

impl TryFrom<wire::PeerResponse> for PeerResponse {
    type Error = MessageError;

    fn try_from(response: wire::PeerResponse) -> Result<Self, Self::Error> {
        use peer_response::Kind;
        let kind = response
            .kind
            .ok_or(MessageError::MissingField("PeerResponse.kind"))?;
        Ok(match kind {
            Kind::Successor(res) => PeerResponse::Successor {
                is_final: res.is_final,
                address: res.address,
            },
            Kind::Predecessor(res) => {
                PeerResponse::Predecessor(Some(res.address).filter(|a| !a.is_empty()))
            }
            Kind::Ack(_) => PeerResponse::Ack,
            Kind::Alive(res) => PeerResponse::Alive {
                token: res.token,
                sent_at: res.timestamp,
            },
            Kind::RingSize(res) => PeerResponse::RingSize(res.bits),
            Kind::SuccessorList(res) => PeerResponse::SuccessorList(res.addresses),
            Kind::TransferSet(res) => PeerResponse::TransferSet(batch_from_wire(res.entries)?),
            Kind::UserIdentifier(res) => PeerResponse::UserIdentifier(res.label),
        })
    }
}
