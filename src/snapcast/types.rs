use std::fmt;

use serde::{Deserialize, Serialize};

use crate::player::types::StreamId;
use crate::volume::average_percent;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ClientId);
string_id!(GroupId);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub percent: u8,
    #[serde(default)]
    pub muted: bool,
}

impl Volume {
    pub fn new(percent: u8, muted: bool) -> Self {
        Self { percent: percent.min(100), muted }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub volume: Volume,
    #[serde(default)]
    pub latency: i64,
    #[serde(default)]
    pub instance: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub config: ClientConfig,
    #[serde(default)]
    pub host: Host,
}

impl Client {
    /// The configured name, falling back to the host name.
    pub fn display_name(&self) -> &str {
        if self.config.name.is_empty() {
            &self.host.name
        } else {
            &self.config.name
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stream_id: StreamId,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub clients: Vec<Client>,
}

impl Group {
    /// Mean volume percent over connected clients, `0.0` when none are
    /// connected.
    pub fn average_volume(&self) -> f64 {
        average_percent(
            self.connected_clients()
                .map(|c| f64::from(c.config.volume.percent)),
        )
    }

    pub fn connected_clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter().filter(|c| c.connected)
    }

    pub fn client(&self, id: &ClientId) -> Option<&Client> {
        self.clients.iter().find(|c| &c.id == id)
    }

    pub fn client_mut(&mut self, id: &ClientId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| &c.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub streams: Vec<Stream>,
}

impl Server {
    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| &g.id == id)
    }

    pub fn group_of(&self, client: &ClientId) -> Option<&Group> {
        self.groups.iter().find(|g| g.client(client).is_some())
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.groups.iter().flat_map(|g| g.clients.iter())
    }
}

/// Result of `Server.GetStatus` and payload of `Server.OnUpdate`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server: Server,
}
