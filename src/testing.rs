//! In-process ring support for tests and local experiments.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chord::types::{IdSpace, NodeId};
use crate::error::NetworkError;
use crate::network::dispatch::Dispatcher;
use crate::network::protocol::{PeerRequest, PeerResponse};
use crate::network::transport::PeerTransport;

#[derive(Default)]
struct Peers {
    dispatchers: HashMap<String, Dispatcher>,
    down: HashSet<String>,
}

/// A transport that delivers calls straight to registered dispatchers.
/// Addresses marked down behave like crashed hosts.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    peers: Arc<RwLock<Peers>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, address: &str, dispatcher: Dispatcher) {
        let mut peers = self.peers.write().await;
        peers.down.remove(address);
        peers.dispatchers.insert(address.to_string(), dispatcher);
    }

    /// Make `address` unreachable, as if its process died.
    pub async fn kill(&self, address: &str) {
        self.peers.write().await.down.insert(address.to_string());
    }
}

#[async_trait]
impl PeerTransport for LocalNetwork {
    async fn call(&self, address: &str, request: PeerRequest) -> Result<PeerResponse, NetworkError> {
        let dispatcher = {
            let peers = self.peers.read().await;
            if peers.down.contains(address) {
                return Err(NetworkError::PeerUnreachable(address.to_string()));
            }
            peers
                .dispatchers
                .get(address)
                .cloned()
                .ok_or_else(|| NetworkError::PeerUnreachable(address.to_string()))?
        };

        dispatcher.handle(request).await.map_err(|e| NetworkError::Rejected {
            address: address.to_string(),
            reason: e.to_string(),
        })
    }
}

const ADDRESS_SEARCH_SPACE: u32 = 1 << 24;

/// An address whose identifier in `space` is `id`. Searches the 2^24
/// addresses of 10.0.0.0/8, so `space` should be small enough for `id` to
/// be hit.
///
/// # Panics
///
/// When no address in that range hashes to `id`.
pub fn address_with_id(space: IdSpace, id: u64) -> String {
    search_address(space, NodeId::from_u64(id), ADDRESS_SEARCH_SPACE).unwrap_or_else(|| {
        panic!(
            "no address in 10.0.0.0/8 hashes to {} in a ring of 2^{}",
            id,
            space.bits()
        )
    })
}

fn search_address(space: IdSpace, target: NodeId, limit: u32) -> Option<String> {
    (0..limit)
        .map(|n| format!("10.{}.{}.{}:7000", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff))
        .find(|address| space.id_of(address) == target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted_addresses_hash_to_their_target() {
        let space = IdSpace::new(4).unwrap();
        for id in 0..16 {
            assert_eq!(space.id_of(&address_with_id(space, id)), NodeId::from_u64(id));
        }
    }

    #[test]
    fn search_gives_up_on_ids_outside_the_ring() {
        let space = IdSpace::new(4).unwrap();
        assert_eq!(search_address(space, NodeId::from_u64(16), 4096), None);
        assert!(search_address(space, NodeId::from_u64(15), 4096).is_some());
    }

    #[tokio::test]
    async fn unknown_and_killed_peers_are_unreachable() {
        let network = LocalNetwork::new();
        assert!(matches!(
            network.call("10.0.0.1:7000", PeerRequest::GetRingSize).await,
            Err(NetworkError::PeerUnreachable(_))
        ));
        network.kill("10.0.0.1:7000").await;
        assert!(network.call("10.0.0.1:7000", PeerRequest::GetRingSize).await.is_err());
    }
}
