//! Wire messages for the `chord.ChordNode/Dispatch` RPC.
//!
//! Every peer call travels as one `PeerRequest` whose oneof names the
//! request kind, answered by one `PeerResponse`. Node ids are 32 big-endian
//! bytes; addresses are `ip:port` strings.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindSuccessorRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyRequest {
    #[prost(string, tag = "1")]
    pub address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatRequest {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileEntry {
    #[prost(bytes = "vec", tag = "1")]
    pub id: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "3")]
    pub content: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StoreFileRequest {
    #[prost(message, optional, tag = "1")]
    pub file: ::core::option::Option<FileEntry>,
}

/// All files stored under one key.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyFiles {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub files: ::prost::alloc::vec::Vec<FileEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BulkInstallRequest {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<KeyFiles>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferSetRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub new_predecessor_id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerRequest {
    #[prost(oneof = "peer_request::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10")]
    pub kind: ::core::option::Option<peer_request::Kind>,
}

pub mod peer_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        GetSuccessor(super::FindSuccessorRequest),
        #[prost(message, tag = "2")]
        GetPredecessor(super::Empty),
        #[prost(message, tag = "3")]
        Notify(super::NotifyRequest),
        #[prost(message, tag = "4")]
        LivenessProbe(super::HeartbeatRequest),
        #[prost(message, tag = "5")]
        GetRingSize(super::Empty),
        #[prost(message, tag = "6")]
        StoreFile(super::StoreFileRequest),
        #[prost(message, tag = "7")]
        GetSuccessorList(super::Empty),
        #[prost(message, tag = "8")]
        BulkInstall(super::BulkInstallRequest),
        #[prost(message, tag = "9")]
        GetTransferSet(super::TransferSetRequest),
        #[prost(message, tag = "10")]
        GetUserIdentifier(super::Empty),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindSuccessorResponse {
    #[prost(bool, tag = "1")]
    pub is_final: bool,
    #[prost(string, tag = "2")]
    pub address: ::prost::alloc::string::String,
}

/// An empty address means "no predecessor".
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PredecessorResponse {
    #[prost(string, tag = "1")]
    pub address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatResponse {
    #[prost(string, tag = "1")]
    pub token: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RingSizeResponse {
    #[prost(uint32, tag = "1")]
    pub bits: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SuccessorListResponse {
    #[prost(string, repeated, tag = "1")]
    pub addresses: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferSetResponse {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<KeyFiles>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IdentifierResponse {
    #[prost(string, tag = "1")]
    pub label: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerResponse {
    #[prost(oneof = "peer_response::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub kind: ::core::option::Option<peer_response::Kind>,
}

pub mod peer_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Successor(super::FindSuccessorResponse),
        #[prost(message, tag = "2")]
        Predecessor(super::PredecessorResponse),
        #[prost(message, tag = "3")]
        Ack(super::Empty),
        #[prost(message, tag = "4")]
        Alive(super::HeartbeatResponse),
        #[prost(message, tag = "5")]
        RingSize(super::RingSizeResponse),
        #[prost(message, tag = "6")]
        SuccessorList(super::SuccessorListResponse),
        #[prost(message, tag = "7")]
        TransferSet(super::TransferSetResponse),
        #[prost(message, tag = "8")]
        UserIdentifier(super::IdentifierResponse),
    }
}

include!(concat!(env!("OUT_DIR"), "/chord.ChordNode.rs"));
