use crate::error::NetworkError;
use crate::network::dispatch::Dispatcher;
use crate::network::grpc::server::ChordGrpcServer;
use crate::network::grpc::MAX_MESSAGE_SIZE;
use crate::network::messages::chord::chord_node_server::ChordNodeServer;
use futures::FutureExt;
use log::{error, info};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

/// Serves the peer RPC surface on an already bound listener until the
/// shutdown channel fires.
pub struct GrpcThread {
    dispatcher: Dispatcher,
    listener: TcpListener,
    shutdown_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<()>,
}

impl GrpcThread {
    pub fn new(
        dispatcher: Dispatcher,
        listener: TcpListener,
        shutdown_rx: oneshot::Receiver<()>,
        ready_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            dispatcher,
            listener,
            shutdown_rx,
            ready_tx,
        }
    }

    pub async fn run(self) -> Result<(), NetworkError> {
        let addr = self
            .listener
            .local_addr()
            .map_err(|e| NetworkError::Grpc(format!("Listener has no local address: {}", e)))?;
        info!("Starting gRPC server on {}", addr);

        let service = ChordNodeServer::new(ChordGrpcServer::new(self.dispatcher))
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);
        let server = Server::builder()
            .tcp_nodelay(true)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .add_service(service);

        let _ = self.ready_tx.send(());

        match server
            .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), self.shutdown_rx.map(|_| ()))
            .await
        {
            Ok(_) => {
                info!("gRPC server on {} shut down gracefully", addr);
                Ok(())
            }
            Err(e) => {
                error!("gRPC server encountered a fatal error: {:?}", e);
                Err(NetworkError::Grpc(format!("Server error: {}", e)))
            }
        }
    }
}
