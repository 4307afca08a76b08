use crate::player::types::StreamId;
use crate::rpc::RpcError;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Player not found: {0}")]
    NotFound(StreamId),
    #[error("Connection pool is not ready")]
    PoolNotReady,
    #[error("Handshake with {id} failed: {reason}")]
    Handshake { id: StreamId, reason: String },
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
