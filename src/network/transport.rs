use async_trait::async_trait;

use crate::error::NetworkError;
use crate::network::protocol::{PeerRequest, PeerResponse};

/// Caller side of the peer RPC surface.
///
/// One call is one request/response exchange. Any error means the peer is
/// treated as down by the caller.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn call(&self, address: &str, request: PeerRequest) -> Result<PeerResponse, NetworkError>;
}
