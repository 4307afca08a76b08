use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::message::{BusMessage, Topic};

type Callback = Arc<dyn Fn(&BusMessage) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Channel(mpsc::UnboundedSender<BusMessage>),
    Callback(Callback),
}

struct Entry {
    id: u64,
    topic: Topic,
    sink: Sink,
}

/// Publish/subscribe hub between the backend connections and their consumers.
///
/// `broadcast` delivers to every subscriber of the exact topic, in
/// registration order, before it returns. Nothing is replayed to late
/// subscribers. Callback subscribers run on the broadcasting task: a slow
/// callback delays the broadcaster, and a panicking one unwinds into it.
pub struct Mediator {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Mediator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn subscribe(self: &Arc<Self>, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.register(topic, Sink::Channel(tx));
        Subscription {
            id,
            topic,
            rx,
            mediator: Arc::downgrade(self),
        }
    }

    pub fn on<F>(self: &Arc<Self>, topic: Topic, callback: F) -> Listener
    where
        F: Fn(&BusMessage) + Send + Sync + 'static,
    {
        let id = self.register(topic, Sink::Callback(Arc::new(callback)));
        Listener {
            id,
            mediator: Arc::downgrade(self),
        }
    }

    /// Delivers `payload` to the current subscribers of `topic`; returns how
    /// many were reached.
    pub fn broadcast(&self, topic: Topic, payload: BusMessage) -> usize {
        let sinks: Vec<Sink> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.sink.clone())
            .collect();

        tracing::trace!("broadcast on {} to {} subscriber(s)", topic, sinks.len());

        let mut delivered = 0;
        for sink in sinks {
            match sink {
                Sink::Channel(tx) => {
                    if tx.send(payload.clone()).is_ok() {
                        delivered += 1;
                    }
                }
                Sink::Callback(callback) => {
                    callback(&payload);
                    delivered += 1;
                }
            }
        }
        delivered
    }

    pub fn publish(&self, payload: impl Into<BusMessage>) -> usize {
        let payload = payload.into();
        self.broadcast(payload.topic(), payload)
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.entries.lock().iter().filter(|e| e.topic == topic).count()
    }

    fn register(&self, topic: Topic, sink: Sink) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push(Entry { id, topic, sink });
        tracing::debug!("subscriber {} registered on {}", id, topic);
        id
    }

    fn unregister(&self, id: u64) {
        self.entries.lock().retain(|e| e.id != id);
        tracing::debug!("subscriber {} unregistered", id);
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("subscribers", &self.entries.lock().len())
            .finish()
    }
}

/// Channel-backed subscription. Dropping it unsubscribes.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<BusMessage>,
    mediator: Weak<Mediator>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mediator) = self.mediator.upgrade() {
            mediator.unregister(self.id);
        }
    }
}

/// Callback registration. Dropping it unsubscribes.
#[must_use = "dropping a Listener unsubscribes it"]
pub struct Listener {
    id: u64,
    mediator: Weak<Mediator>,
}

impl Listener {
    pub fn unsubscribe(self) {}
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(mediator) = self.mediator.upgrade() {
            mediator.unregister(self.id);
        }
    }
}
