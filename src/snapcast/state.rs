use parking_lot::RwLock;

use super::notification::SnapcastNotification;
use super::types::{Client, ClientId, Group, GroupId, Server, ServerStatus, Stream, Volume};

/// Local mirror of the Snapcast server's groups, clients and streams.
///
/// The server owns the topology; this mirror is replaced wholesale by status
/// snapshots and patched by notifications. Concurrent writers are not
/// ordered: the last write wins.
#[derive(Debug, Default)]
pub struct Zones {
    server: RwLock<Server>,
}

impl Zones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, status: ServerStatus) {
        let mut server = self.server.write();
        *server = status.server;
        tracing::debug!("zones updated: {} group(s), {} stream(s)", server.groups.len(), server.streams.len());
    }

    pub fn snapshot(&self) -> Server {
        self.server.read().clone()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.server.read().groups.clone()
    }

    pub fn streams(&self) -> Vec<Stream> {
        self.server.read().streams.clone()
    }

    pub fn clients(&self) -> Vec<Client> {
        self.server.read().clients().cloned().collect()
    }

    pub fn group(&self, id: &GroupId) -> Option<Group> {
        self.server.read().group(id).cloned()
    }

    pub fn group_of(&self, client: &ClientId) -> Option<Group> {
        self.server.read().group_of(client).cloned()
    }

    pub fn set_client_volume(&self, id: &ClientId, volume: Volume) -> bool {
        self.with_client(id, |c| c.config.volume = volume)
    }

    /// Applies a notification; returns whether the mirror changed.
    pub fn apply(&self, notification: &SnapcastNotification) -> bool {
        use SnapcastNotification as N;

        match notification {
            N::ClientVolumeChanged { id, volume } => self.set_client_volume(id, *volume),
            N::ClientLatencyChanged { id, latency } => self.with_client(id, |c| c.config.latency = *latency),
            N::ClientNameChanged { id, name } => self.with_client(id, |c| c.config.name = name.clone()),
            N::ClientConnected { id, client } => self.with_client(id, |c| {
                *c = client.clone();
                c.connected = true;
            }),
            N::ClientDisconnected { id, client } => self.with_client(id, |c| {
                *c = client.clone();
                c.connected = false;
            }),
            N::GroupMuted { id, mute } => self.with_group(id, |g| g.muted = *mute),
            N::GroupStreamChanged { id, stream_id } => self.with_group(id, |g| g.stream_id = stream_id.clone()),
            N::GroupNameChanged { id, name } => self.with_group(id, |g| g.name = name.clone()),
            N::StreamUpdated { id, stream } => {
                let mut server = self.server.write();
                match server.streams.iter_mut().find(|s| &s.id == id) {
                    Some(existing) => *existing = stream.clone(),
                    None => server.streams.push(stream.clone()),
                }
                true
            }
            N::ServerUpdated(status) => {
                self.replace(status.clone());
                true
            }
            N::Unknown { .. } => false,
        }
    }

    fn with_client(&self, id: &ClientId, f: impl FnOnce(&mut Client)) -> bool {
        let mut server = self.server.write();
        match server.groups.iter_mut().find_map(|g| g.client_mut(id)) {
            Some(client) => {
                f(client);
                true
            }
            None => {
                tracing::debug!("notification for unknown client {}", id);
                false
            }
        }
    }

    fn with_group(&self, id: &GroupId, f: impl FnOnce(&mut Group)) -> bool {
        let mut server = self.server.write();
        match server.groups.iter_mut().find(|g| &g.id == id) {
            Some(group) => {
                f(group);
                true
            }
            None => {
                tracing::debug!("notification for unknown group {}", id);
                false
            }
        }
    }
}
