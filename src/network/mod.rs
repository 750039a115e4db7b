pub mod client;
pub mod dispatch;
pub mod grpc;
pub mod messages;
pub mod node;
pub mod protocol;
pub mod transport;
