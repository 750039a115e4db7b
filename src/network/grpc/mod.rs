pub mod client;
pub mod server;
pub mod thread;

pub use client::GrpcTransport;

/// Upper bound on an encoded request or response; bulk transfers carry file
/// contents.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;
