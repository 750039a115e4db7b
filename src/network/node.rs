use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::chord::node::ChordNode;
use crate::chord::types::IdSpace;
use crate::config::NodeConfig;
use crate::error::{ChordFsError, ConfigError, NetworkError};
use crate::network::grpc::thread::GrpcThread;
use crate::network::grpc::GrpcTransport;
use crate::network::transport::PeerTransport;
use crate::storage::FsContentStore;

const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A node served over gRPC, with its content on local disk.
pub struct ChordPeer {
    node: ChordNode,
    local_addr: SocketAddr,
    grpc_handle: Option<JoinHandle<Result<(), NetworkError>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl ChordPeer {
    /// Bind, serve, then create or join a ring as `config` says.
    pub async fn start(config: NodeConfig) -> Result<Self, ChordFsError> {
        config.validate()?;

        let listener = TcpListener::bind(config.listen_address())
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("bind {}: {}", config.listen_address(), e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        let address = format!("{}:{}", config.host, local_addr.port());

        let transport: Arc<dyn PeerTransport> = Arc::new(GrpcTransport::new());
        let space = match (config.ring_bits, &config.bootstrap) {
            (Some(bits), None) => IdSpace::new(bits)?,
            (None, Some(bootstrap)) => ChordNode::fetch_ring_space(transport.clone(), bootstrap).await?,
            _ => return Err(ConfigError::Invalid("exactly one of ring_bits and bootstrap is required".into()).into()),
        };

        let store = Arc::new(FsContentStore::new(&config.data_dir));
        let node = ChordNode::new(address, space, config.settings(), transport, store);
        info!("Node {} at {} (ring of 2^{})", node.node_id(), node.address(), space.bits());

        let mut peer = Self {
            node,
            local_addr,
            grpc_handle: None,
            shutdown_tx: None,
            workers: Vec::new(),
        };
        peer.start_grpc_server(listener).await?;

        let joined = match &config.bootstrap {
            Some(bootstrap) => peer.node.join(bootstrap).await,
            None => peer.node.create().await,
        };
        if let Err(e) = joined {
            error!("Node {} could not enter the ring: {}", peer.node.node_id(), e);
            peer.shutdown().await;
            return Err(e.into());
        }

        peer.workers = peer.node.spawn_workers();
        Ok(peer)
    }

    async fn start_grpc_server(&mut self, listener: TcpListener) -> Result<(), NetworkError> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let grpc_thread = GrpcThread::new(self.node.dispatcher(), listener, shutdown_rx, ready_tx);
        self.grpc_handle = Some(tokio::spawn(grpc_thread.run()));
        self.shutdown_tx = Some(shutdown_tx);

        match tokio::time::timeout(SERVER_STARTUP_TIMEOUT, ready_rx).await {
            Ok(Ok(())) => {
                info!("gRPC server is ready and listening on {}", self.local_addr);
                Ok(())
            }
            Ok(Err(_)) => Err(NetworkError::Grpc("Server failed to initialize".into())),
            Err(_) => Err(NetworkError::Grpc("Server startup timed out".into())),
        }
    }

    pub fn node(&self) -> &ChordNode {
        &self.node
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C, then leave the ring gracefully and stop the
    /// server. A failed handoff keeps the node serving.
    pub async fn run(&mut self) -> Result<(), ChordFsError> {
        let mut stopped = self.node.shutdown_signal();
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| NetworkError::ConnectionFailed(format!("signal handler: {}", e)))?;
                    info!("Interrupt received, leaving the ring");
                    match self.node.leave().await {
                        Ok(()) => break,
                        Err(e) => error!("Leave failed, still serving (interrupt again to retry): {}", e),
                    }
                }
                _ = stopped.changed() => break,
            }
        }
        self.shutdown().await;
        Ok(())
    }

    /// Stop the node: refuse requests, wait for the workers to exit, then
    /// release the listener.
    pub async fn shutdown(&mut self) {
        let aborted = self.stop_workers().await;
        if aborted > 0 {
            warn!("Aborted {} workers that did not stop in time", aborted);
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.grpc_handle.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("gRPC server error: {}", e),
                Err(e) => error!("gRPC server task failed: {}", e),
            }
        }
        info!("Node {} shut down", self.node.node_id());
    }

    /// Signal the workers and wait for each to return. Returns how many had
    /// to be aborted.
    async fn stop_workers(&mut self) -> usize {
        if let Err(e) = self.node.stop().await {
            error!("Could not mark node {} stopped: {}", self.node.node_id(), e);
        }
        let mut aborted = 0;
        for mut worker in self.workers.drain(..) {
            match tokio::time::timeout(WORKER_STOP_TIMEOUT, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Worker task failed: {}", e),
                Err(_) => {
                    worker.abort();
                    aborted += 1;
                }
            }
        }
        aborted
    }
}
