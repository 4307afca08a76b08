pub mod connection;
pub mod error;
pub mod message;

pub use connection::RpcConnection;
pub use error::RpcError;
pub use message::{Incoming, Notification, Request};
