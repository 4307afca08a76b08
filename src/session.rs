use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bus::Mediator;
use crate::config::Config;
use crate::player::{ConnectionPool, MopidyConnector, MopidyPlayer, PlayerError, StreamId};
use crate::rpc::{Notification, RpcError};
use crate::snapcast::{Group, GroupId, GroupVolumeResult, SnapcastClient, SnapcastMonitor, Zones};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to connect to Snapcast at {url}: {source}")]
    Snapcast { url: String, source: RpcError },
    #[error("Failed to load Snapcast status: {0}")]
    Status(RpcError),
    #[error("Unknown group: {0}")]
    UnknownGroup(GroupId),
    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// The running controller: one Snapcast connection, its zone mirror, the
/// Mopidy pool and the bus they all publish to.
pub struct Session {
    pub bus: Arc<Mediator>,
    pub snapcast: Arc<SnapcastClient>,
    pub zones: Arc<Zones>,
    pub players: Arc<ConnectionPool<MopidyConnector>>,
}

impl Session {
    /// Connects everything in `config` and returns once the player pool is
    /// ready. Players that fail their handshake are left out.
    pub async fn start(config: &Config) -> Result<Self, SessionError> {
        let bus = Mediator::new();
        let timeout = config.rpc.request_timeout();

        let url = config.snapcast.url();
        let (snapcast, notifications) = SnapcastClient::connect(&config.snapcast, timeout)
            .await
            .map_err(|source| SessionError::Snapcast { url, source })?;

        let connector = MopidyConnector::new(Arc::clone(&bus), timeout, config.mopidy.search_uris.clone());
        let session = Self::with_snapcast(bus, snapcast, notifications, connector).await?;

        let connected = session.players.generate(&config.mopidy.instances).await;
        tracing::info!(
            "Session started: {} group(s), {}/{} player(s)",
            session.zones.groups().len(),
            connected,
            config.mopidy.instances.len()
        );
        Ok(session)
    }

    async fn with_snapcast(
        bus: Arc<Mediator>,
        snapcast: SnapcastClient,
        notifications: mpsc::UnboundedReceiver<Notification>,
        connector: MopidyConnector,
    ) -> Result<Self, SessionError> {
        let snapcast = Arc::new(snapcast);
        let status = snapcast.get_status().await.map_err(SessionError::Status)?;

        let zones = Arc::new(Zones::new());
        zones.replace(status);

        let monitor = SnapcastMonitor::new(Arc::clone(&snapcast), Arc::clone(&zones), Arc::clone(&bus), notifications);
        tokio::spawn(monitor.run());

        Ok(Self {
            bus,
            snapcast,
            zones,
            players: Arc::new(ConnectionPool::new(connector)),
        })
    }

    pub fn group(&self, id: &GroupId) -> Result<Group, SessionError> {
        self.zones
            .group(id)
            .ok_or_else(|| SessionError::UnknownGroup(id.clone()))
    }

    pub fn player(&self, id: &StreamId) -> Result<Arc<MopidyPlayer>, SessionError> {
        Ok(self.players.get_instance_by_id(id)?)
    }

    /// The player feeding the stream a group currently listens to.
    pub fn player_for_group(&self, id: &GroupId) -> Result<Arc<MopidyPlayer>, SessionError> {
        let group = self.group(id)?;
        self.player(&group.stream_id)
    }

    /// Redistributes the group's volume from the mirrored client volumes.
    pub async fn set_group_volume(&self, id: &GroupId, target: f64) -> Result<GroupVolumeResult, SessionError> {
        let group = self.group(id)?;
        let result = self.snapcast.set_group_volume(&group, target).await;
        for (client, volume) in &result.applied {
            self.zones.set_client_volume(client, *volume);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("bus", &self.bus)
            .field("players", &self.players.ids())
            .finish()
    }
}
