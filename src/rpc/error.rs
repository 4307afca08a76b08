#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Connection closed")]
    Closed,
    #[error("Timeout: {0}")]
    Timeout(String),
}
