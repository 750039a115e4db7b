use log::debug;
use tonic::{Request, Response, Status};

use crate::error::ChordError;
use crate::network::dispatch::Dispatcher;
use crate::network::messages::chord::{self as wire, chord_node_server::ChordNode as ChordNodeService};
use crate::network::protocol::PeerRequest;

#[derive(Debug)]
pub struct ChordGrpcServer {
    dispatcher: Dispatcher,
}

impl ChordGrpcServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

fn to_status(error: ChordError) -> Status {
    match error {
        ChordError::NotActive(reason) => Status::unavailable(reason),
        e @ ChordError::NotOwner { .. } => Status::failed_precondition(e.to_string()),
        ChordError::Message(e) => Status::invalid_argument(e.to_string()),
        e => Status::internal(e.to_string()),
    }
}

#[tonic::async_trait]
impl ChordNodeService for ChordGrpcServer {
    async fn dispatch(&self, request: Request<wire::PeerRequest>) -> Result<Response<wire::PeerResponse>, Status> {
        let request = PeerRequest::try_from(request.into_inner()).map_err(|e| {
            debug!("Dropping malformed request: {}", e);
            Status::invalid_argument(e.to_string())
        })?;

        self.dispatcher
            .handle(request)
            .await
            .map(|response| Response::new(response.into()))
            .map_err(to_status)
    }
}
