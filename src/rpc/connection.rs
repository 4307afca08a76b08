use std::collections::HashMap;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{future, Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::error::RpcError;
use super::message::{Incoming, Notification, Request};

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, RpcError>>>>>;

/// One JSON-RPC session over a WebSocket.
///
/// Requests are matched to responses by id. Everything the server pushes
/// without an id is forwarded, in arrival order, to the notification
/// receiver handed out at construction. The receiver ends when the
/// connection closes.
#[derive(Debug)]
pub struct RpcConnection {
    label: String,
    outbound: mpsc::UnboundedSender<String>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    timeout: Option<Duration>,
}

impl RpcConnection {
    pub async fn connect(
        url: &str,
        label: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), RpcError> {
        let label = label.into();
        tracing::info!("[{}] connecting to {}", label, url);

        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (sink, stream) = ws.split();

        let writer = sink.with(|text: String| future::ready(Ok::<_, WsError>(Message::text(text))));

        let reader_label = label.clone();
        let reader = stream.filter_map(move |frame| {
            let text = match frame {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok(),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("[{}] WebSocket error: {}", reader_label, e);
                    None
                }
            };
            future::ready(text)
        });

        Ok(Self::from_parts(writer, reader, label, timeout))
    }

    /// Builds a connection over an arbitrary text sink/stream pair.
    pub fn from_parts<W, R>(
        writer: W,
        reader: R,
        label: impl Into<String>,
        timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>)
    where
        W: Sink<String> + Send + 'static,
        W::Error: Display,
        R: Stream<Item = String> + Send + 'static,
    {
        let label = label.into();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(Box::pin(writer), outbound_rx, label.clone()));
        tokio::spawn(read_loop(
            Box::pin(reader),
            Arc::clone(&pending),
            notify_tx,
            Arc::clone(&closed),
            label.clone(),
        ));

        (
            Self {
                label,
                outbound,
                pending,
                closed,
                timeout,
            },
            notify_rx,
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let request = Request::new(method, params);
        let text = serde_json::to_string(&request)?;
        let (tx, rx) = oneshot::channel();

        self.pending.lock().insert(request.id.clone(), tx);
        if self.is_closed() || self.outbound.send(text).is_err() {
            self.pending.lock().remove(&request.id);
            return Err(RpcError::Closed);
        }
        tracing::trace!("[{}] -> {} ({})", self.label, method, request.id);

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.lock().remove(&request.id);
                    return Err(RpcError::Timeout(format!("{} after {:?}", method, limit)));
                }
            },
            None => rx.await,
        };

        reply.map_err(|_| RpcError::Closed)?
    }

    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T, RpcError> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends a request without waiting for its response.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        let text = serde_json::to_string(&Request::new(method, params))?;
        self.outbound.send(text).map_err(|_| RpcError::Closed)
    }
}

async fn write_loop<W>(mut writer: Pin<Box<W>>, mut outbound: mpsc::UnboundedReceiver<String>, label: String)
where
    W: Sink<String>,
    W::Error: Display,
{
    while let Some(text) = outbound.recv().await {
        if let Err(e) = writer.send(text).await {
            tracing::error!("[{}] failed to send: {}", label, e);
            break;
        }
    }
    let _ = writer.close().await;
}

async fn read_loop<R>(
    mut reader: Pin<Box<R>>,
    pending: Pending,
    notifications: mpsc::UnboundedSender<Notification>,
    closed: Arc<AtomicBool>,
    label: String,
) where
    R: Stream<Item = String>,
{
    while let Some(text) = reader.next().await {
        match Incoming::parse(&text) {
            Ok(Incoming::Response { id, outcome }) => {
                let waiter = pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(outcome);
                    }
                    None => tracing::trace!("[{}] unclaimed response {}", label, id),
                }
            }
            Ok(Incoming::Notification(notification)) => {
                tracing::trace!("[{}] <- {}", label, notification.method);
                let _ = notifications.send(notification);
            }
            Err(e) => tracing::warn!("[{}] ignoring message: {}", label, e),
        }
    }

    closed.store(true, Ordering::SeqCst);
    tracing::info!("[{}] connection closed", label);
    for (_, tx) in pending.lock().drain() {
        let _ = tx.send(Err(RpcError::Closed));
    }
}
