use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chord::actor::ChordHandle;
use crate::chord::routing;
use crate::chord::types::{
    batch_file_count, ChordState, File, IdSpace, NodeId, NodeReport, NodeSnapshot, NodeStatus,
};
use crate::chord::workers::{run_finger_maintainer, run_predecessor_checker, run_stabilize_worker};
use crate::chord::{
    CHECK_PREDECESSOR_INTERVAL_MS, FIX_FINGERS_INTERVAL_MS, MAX_STEPS, STABILIZE_INTERVAL_MS, SUCCESSOR_LIST_SIZE,
};
use crate::error::ChordError;
use crate::network::client::PeerClient;
use crate::network::dispatch::Dispatcher;
use crate::network::transport::PeerTransport;
use crate::storage::ContentStore;

/// Per-node tunables, fixed for the node's lifetime.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub label: String,
    pub successor_list_size: usize,
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    pub check_predecessor_interval: Duration,
    pub max_steps: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            label: String::new(),
            successor_list_size: SUCCESSOR_LIST_SIZE,
            stabilize_interval: Duration::from_millis(STABILIZE_INTERVAL_MS),
            fix_fingers_interval: Duration::from_millis(FIX_FINGERS_INTERVAL_MS),
            check_predecessor_interval: Duration::from_millis(CHECK_PREDECESSOR_INTERVAL_MS),
            max_steps: MAX_STEPS,
        }
    }
}

/// A ring member: the state actor plus the means to reach peers.
///
/// Cloning is cheap; every clone drives the same actor. A node starts
/// `Uninitialized` and becomes a ring member through [`ChordNode::create`] or
/// [`ChordNode::join`].
#[derive(Clone)]
pub struct ChordNode {
    handle: ChordHandle,
    client: PeerClient,
    settings: NodeSettings,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ChordNode {
    /// Build the node and spawn its state actor.
    pub fn new(
        address: String,
        space: IdSpace,
        settings: NodeSettings,
        transport: Arc<dyn PeerTransport>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        let state = ChordState::new(space, address, settings.label.clone(), settings.successor_list_size);
        let (handle, actor) = ChordHandle::new(state, store);
        tokio::spawn(actor.run());
        let (shutdown, _) = watch::channel(false);

        Self {
            handle,
            client: PeerClient::new(transport),
            settings,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Ask `bootstrap` for the ring's identifier width.
    pub async fn fetch_ring_space(transport: Arc<dyn PeerTransport>, bootstrap: &str) -> Result<IdSpace, ChordError> {
        let bits = PeerClient::new(transport)
            .ring_size(bootstrap)
            .await
            .map_err(|e| ChordError::JoinFailed(format!("could not fetch ring size from {}: {}", bootstrap, e)))?;
        IdSpace::new(bits).map_err(|e| ChordError::JoinFailed(format!("{} reported a bad ring size: {}", bootstrap, e)))
    }

    pub fn address(&self) -> &str {
        self.handle.address()
    }

    pub fn node_id(&self) -> NodeId {
        self.handle.node_id()
    }

    pub fn space(&self) -> IdSpace {
        self.handle.space()
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn handle(&self) -> &ChordHandle {
        &self.handle
    }

    pub fn client(&self) -> &PeerClient {
        &self.client
    }

    /// Inbound request handler to register with a server or a local network.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.handle.clone())
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub async fn status(&self) -> Result<NodeStatus, ChordError> {
        self.handle.status().await
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot, ChordError> {
        self.handle.snapshot().await
    }

    /// Snapshot plus the operator label of every peer it references.
    /// Peers that do not answer are left out of the label map.
    pub async fn report(&self) -> Result<NodeReport, ChordError> {
        let snapshot = self.handle.snapshot().await?;
        let mut labels = BTreeMap::new();
        labels.insert(self.address().to_string(), self.handle.label().to_string());

        let referenced = snapshot
            .predecessor
            .iter()
            .chain(snapshot.successors.iter().flatten())
            .chain(snapshot.fingers.iter().flatten());
        for address in referenced {
            if labels.contains_key(address) {
                continue;
            }
            match self.client.user_identifier(address).await {
                Ok(label) => {
                    labels.insert(address.clone(), label);
                }
                Err(e) => debug!("No label for {}: {}", address, e),
            }
        }
        Ok(NodeReport { snapshot, labels })
    }

    /// Start a new ring with this node as its only member.
    pub async fn create(&self) -> Result<(), ChordError> {
        self.handle.create().await
    }

    /// Join the ring `bootstrap` belongs to and take over the keys we now own.
    pub async fn join(&self, bootstrap: &str) -> Result<(), ChordError> {
        info!("Node {} joining through {}", self.node_id(), bootstrap);
        self.handle.begin_join().await?;

        let successor = routing::find(&self.client, self.node_id(), bootstrap, self.settings.max_steps)
            .await
            .map_err(|e| ChordError::JoinFailed(format!("could not locate successor via {}: {}", bootstrap, e)))?;
        self.handle.set_successor(successor.clone()).await?;
        info!("Node {} found successor {}", self.node_id(), successor);

        match self.client.transfer_set(&successor, self.node_id()).await {
            Ok(files) => {
                let count = batch_file_count(&files);
                let installed = self.handle.bulk_install(files).await?;
                if installed < count {
                    warn!("Installed {} of {} files taken over from {}", installed, count, successor);
                }
            }
            Err(e) => error!("Could not fetch transfer set from {}: {}", successor, e),
        }

        self.handle.set_status(NodeStatus::Active).await?;
        info!("Node {} joined the ring", self.node_id());
        Ok(())
    }

    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(run_stabilize_worker(self.clone(), self.shutdown_signal())),
            tokio::spawn(run_finger_maintainer(self.clone(), self.shutdown_signal())),
            tokio::spawn(run_predecessor_checker(self.clone(), self.shutdown_signal())),
        ]
    }

    /// Resolve the address of the node owning `name`.
    pub async fn lookup(&self, name: &str) -> Result<(NodeId, String), ChordError> {
        let id = self.space().id_of(name);
        let owner = routing::find(&self.client, id, self.address(), self.settings.max_steps).await?;
        debug!("{} (id {}) is owned by {}", name, id, owner);
        Ok((id, owner))
    }

    /// Route `content` to the owner of `name` and store it there.
    /// Returns the owner's address.
    pub async fn store(&self, name: &str, content: bytes::Bytes) -> Result<String, ChordError> {
        let (id, owner) = self.lookup(name).await?;
        let file = File {
            id,
            name: name.to_string(),
            content,
        };
        self.client.store_file(&owner, file).await?;
        info!("Stored {} at {}", name, owner);
        Ok(owner)
    }

    /// Graceful exit. Local data is discarded only after a successor
    /// acknowledges the handoff; otherwise the node stays `Active`.
    pub async fn leave(&self) -> Result<(), ChordError> {
        let me = self.address().to_string();
        let successors = self.handle.successor_list().await?;

        let mut candidates: Vec<String> = Vec::new();
        for address in successors {
            if address != me && !candidates.contains(&address) {
                candidates.push(address);
            }
        }

        let files = self.handle.begin_leave().await?;
        if candidates.is_empty() {
            info!("Node {} is alone in the ring, discarding local data", self.node_id());
            self.handle.discard_all().await?;
            self.stop().await?;
            return Ok(());
        }

        let count = batch_file_count(&files);
        info!("Node {} leaving, handing off {} files", self.node_id(), count);

        let mut acked = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 && !self.client.is_alive(candidate).await {
                continue;
            }
            match self.client.bulk_install(candidate, files.clone()).await {
                Ok(()) => {
                    acked = Some(candidate.clone());
                    break;
                }
                Err(e) => warn!("Handoff to {} failed: {}", candidate, e),
            }
        }

        match acked {
            Some(successor) => {
                self.handle.discard_all().await?;
                self.stop().await?;
                info!("Node {} handed {} files to {} and stopped", self.node_id(), count, successor);
                Ok(())
            }
            None => {
                self.handle.set_status(NodeStatus::Active).await?;
                error!("Node {} could not hand off its data, staying in the ring", self.node_id());
                Err(ChordError::HandoffFailed(format!(
                    "no successor accepted {} files",
                    count
                )))
            }
        }
    }

    /// Refuse further requests and tell the workers to exit.
    pub async fn stop(&self) -> Result<(), ChordError> {
        self.handle.set_status(NodeStatus::Stopped).await?;
        self.shutdown.send_replace(true);
        Ok(())
    }
}
