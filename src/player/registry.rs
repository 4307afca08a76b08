use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use tokio::sync::watch;

use super::error::PlayerError as Error;
use super::types::{Connector, PlayerConnection, PlayerInstance, StreamId};

/// One shared connection per configured player, looked up by stream id.
///
/// The pool is generated once. Dependents wait for the ready signal before
/// looking connections up; it fires after every configured instance has
/// either completed its handshake or failed.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    generating: AtomicBool,
    connections: OnceLock<HashMap<StreamId, Arc<C::Connection>>>,
    ready: watch::Sender<bool>,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            connector,
            generating: AtomicBool::new(false),
            connections: OnceLock::new(),
            ready,
        }
    }

    /// Connects every instance concurrently. Calling it again is a no-op
    /// that waits for the first generation to finish.
    pub async fn generate(&self, instances: &[PlayerInstance]) -> usize {
        if self.generating.swap(true, Ordering::SeqCst) {
            tracing::warn!("Connection pool already generated, ignoring");
            self.wait_ready().await;
            return self.len();
        }

        let mut seen = HashSet::new();
        let unique: Vec<&PlayerInstance> = instances
            .iter()
            .filter(|instance| {
                let first = seen.insert(&instance.id);
                if !first {
                    tracing::warn!("Player '{}' configured twice, keeping the first", instance.id);
                }
                first
            })
            .collect();

        let attempts = unique.iter().map(|instance| async move {
            tracing::info!("Connecting to player {} at {}", instance.id, instance.url());
            (instance.id.clone(), self.connector.connect(instance).await)
        });

        let mut connections = HashMap::new();
        for (id, outcome) in join_all(attempts).await {
            match outcome {
                Ok(connection) => {
                    connections.insert(id, connection);
                }
                Err(e) => tracing::error!("Failed to connect to player {}: {}", id, e),
            }
        }

        tracing::info!("Connection pool ready: {}/{} player(s)", connections.len(), unique.len());
        let count = connections.len();
        let _ = self.connections.set(connections);
        self.ready.send_replace(true);
        count
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn get_instance_by_id(&self, id: &StreamId) -> Result<Arc<C::Connection>, Error> {
        let connections = self.connections.get().ok_or(Error::PoolNotReady)?;
        connections
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Whether every pooled connection is currently online.
    pub fn all_connected(&self) -> bool {
        self.connections
            .get()
            .map(|c| c.values().all(|conn| conn.is_connected()))
            .unwrap_or(false)
    }

    pub fn ids(&self) -> Vec<&StreamId> {
        let mut ids: Vec<&StreamId> = self
            .connections
            .get()
            .map(|c| c.keys().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn connections(&self) -> Vec<Arc<C::Connection>> {
        self.connections
            .get()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.connections.get().map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct MockConnection {
        id: StreamId,
        connected: AtomicBool,
    }

    impl PlayerConnection for MockConnection {
        fn id(&self) -> &StreamId {
            &self.id
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct MockConnector {
        attempts: AtomicUsize,
        unreachable: Vec<&'static str>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Connection = MockConnection;

        async fn connect(&self, instance: &PlayerInstance) -> Result<Arc<MockConnection>, Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.unreachable.contains(&instance.id.as_str()) {
                return Err(Error::Handshake {
                    id: instance.id.clone(),
                    reason: "refused".to_string(),
                });
            }
            Ok(Arc::new(MockConnection {
                id: instance.id.clone(),
                connected: AtomicBool::new(true),
            }))
        }
    }

    fn instances() -> Vec<PlayerInstance> {
        vec![
            PlayerInstance::new("mopidy1", "127.0.0.1", 6681),
            PlayerInstance::new("mopidy2", "127.0.0.1", 6682),
        ]
    }

    #[tokio::test]
    async fn test_pool_new() {
        let pool = ConnectionPool::new(MockConnector::default());
        assert!(pool.is_empty());
        assert!(!pool.is_ready());
        assert!(!pool.all_connected());
    }

    #[tokio::test]
    async fn test_lookup_before_ready() {
        let pool = ConnectionPool::new(MockConnector::default());
        let result = pool.get_instance_by_id(&StreamId::from("mopidy1"));
        assert!(matches!(result, Err(Error::PoolNotReady)));
    }

    #[tokio::test]
    async fn test_generate_and_lookup() {
        let pool = ConnectionPool::new(MockConnector::default());
        assert_eq!(pool.generate(&instances()).await, 2);
        assert!(pool.is_ready());

        let a = pool.get_instance_by_id(&StreamId::from("mopidy1")).unwrap();
        let b = pool.get_instance_by_id(&StreamId::from("mopidy1")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), &StreamId::from("mopidy1"));
        assert_eq!(pool.ids(), vec![&StreamId::from("mopidy1"), &StreamId::from("mopidy2")]);
        assert!(pool.all_connected());
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let pool = ConnectionPool::new(MockConnector::default());
        pool.generate(&instances()).await;

        let result = pool.get_instance_by_id(&StreamId::from("mopidy9"));
        assert!(matches!(result, Err(Error::NotFound(id)) if id == StreamId::from("mopidy9")));
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let pool = ConnectionPool::new(MockConnector::default());
        pool.generate(&instances()).await;
        let first = pool.get_instance_by_id(&StreamId::from("mopidy2")).unwrap();

        assert_eq!(pool.generate(&instances()).await, 2);
        let second = pool.get_instance_by_id(&StreamId::from("mopidy2")).unwrap();

        assert_eq!(pool.connector.attempts.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_repeated_id_connects_once() {
        let pool = ConnectionPool::new(MockConnector::default());
        let repeated = vec![
            PlayerInstance::new("mopidy1", "127.0.0.1", 6681),
            PlayerInstance::new("mopidy1", "127.0.0.1", 6690),
        ];

        assert_eq!(pool.generate(&repeated).await, 1);
        assert_eq!(pool.connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_instance_is_left_out() {
        let pool = ConnectionPool::new(MockConnector {
            unreachable: vec!["mopidy2"],
            ..Default::default()
        });
        assert_eq!(pool.generate(&instances()).await, 1);
        assert!(pool.is_ready());
        assert!(matches!(
            pool.get_instance_by_id(&StreamId::from("mopidy2")),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_generate() {
        let pool = Arc::new(ConnectionPool::new(MockConnector::default()));

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.wait_ready().await;
                pool.get_instance_by_id(&StreamId::from("mopidy1")).is_ok()
            })
        };

        tokio::task::yield_now().await;
        pool.generate(&instances()).await;
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_all_connected_tracks_state() {
        let pool = ConnectionPool::new(MockConnector::default());
        pool.generate(&instances()).await;

        let conn = pool.get_instance_by_id(&StreamId::from("mopidy1")).unwrap();
        conn.connected.store(false, Ordering::SeqCst);
        assert!(!pool.all_connected());
    }

    #[tokio::test]
    async fn test_empty_configuration_is_ready() {
        let pool = ConnectionPool::new(MockConnector::default());
        let mut waiting = tokio_test::task::spawn(pool.wait_ready());
        tokio_test::assert_pending!(waiting.poll());

        assert_eq!(pool.generate(&[]).await, 0);
        assert!(waiting.is_woken());
        tokio_test::assert_ready!(waiting.poll());
        assert!(pool.is_ready());
    }
}
