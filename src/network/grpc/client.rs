use async_trait::async_trait;
use log::debug;

use crate::error::NetworkError;
use crate::network::grpc::MAX_MESSAGE_SIZE;
use crate::network::messages::chord::{self as wire, chord_node_client::ChordNodeClient};
use crate::network::protocol::{PeerRequest, PeerResponse};
use crate::network::transport::PeerTransport;

/// gRPC transport: one connection per call to `http://{address}`.
#[derive(Debug, Clone, Default)]
pub struct GrpcTransport;

impl GrpcTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerTransport for GrpcTransport {
    async fn call(&self, address: &str, request: PeerRequest) -> Result<PeerResponse, NetworkError> {
        let kind = request.kind();
        let mut client = ChordNodeClient::connect(format!("http://{}", address))
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", address, e)))?
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);

        debug!("Sending {} to {}", kind, address);
        let response = client
            .dispatch(wire::PeerRequest::from(request))
            .await
            .map_err(|status| NetworkError::Rejected {
                address: address.to_string(),
                reason: status.message().to_string(),
            })?;

        PeerResponse::try_from(response.into_inner())
            .map_err(|e| NetworkError::Grpc(format!("malformed {} reply from {}: {}", kind, address, e)))
    }
}
