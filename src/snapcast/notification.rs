use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{Client, ClientId, GroupId, ServerStatus, Stream, Volume};
use crate::player::types::StreamId;
use crate::rpc::Notification;

/// Push messages sent by the Snapcast server, validated per method.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum SnapcastNotification {
    #[serde(rename = "Client.OnVolumeChanged")]
    ClientVolumeChanged { id: ClientId, volume: Volume },
    #[serde(rename = "Client.OnLatencyChanged")]
    ClientLatencyChanged { id: ClientId, latency: i64 },
    #[serde(rename = "Client.OnNameChanged")]
    ClientNameChanged { id: ClientId, name: String },
    #[serde(rename = "Client.OnConnect")]
    ClientConnected { id: ClientId, client: Client },
    #[serde(rename = "Client.OnDisconnect")]
    ClientDisconnected { id: ClientId, client: Client },
    #[serde(rename = "Group.OnMute")]
    GroupMuted { id: GroupId, mute: bool },
    #[serde(rename = "Group.OnStreamChanged")]
    GroupStreamChanged { id: GroupId, stream_id: StreamId },
    #[serde(rename = "Group.OnNameChanged")]
    GroupNameChanged { id: GroupId, name: String },
    #[serde(rename = "Stream.OnUpdate")]
    StreamUpdated { id: StreamId, stream: Stream },
    #[serde(rename = "Server.OnUpdate")]
    ServerUpdated(ServerStatus),
    #[serde(skip_deserializing)]
    Unknown { method: String, params: Value },
}

impl SnapcastNotification {
    pub fn from_notification(notification: Notification) -> Self {
        let Notification { method, params } = notification;
        let tagged = json!({ "method": method, "params": params });
        match serde_json::from_value(tagged) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Unhandled Snapcast notification {}: {}", method, e);
                SnapcastNotification::Unknown { method, params }
            }
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Self::ClientVolumeChanged { .. } => "Client.OnVolumeChanged",
            Self::ClientLatencyChanged { .. } => "Client.OnLatencyChanged",
            Self::ClientNameChanged { .. } => "Client.OnNameChanged",
            Self::ClientConnected { .. } => "Client.OnConnect",
            Self::ClientDisconnected { .. } => "Client.OnDisconnect",
            Self::GroupMuted { .. } => "Group.OnMute",
            Self::GroupStreamChanged { .. } => "Group.OnStreamChanged",
            Self::GroupNameChanged { .. } => "Group.OnNameChanged",
            Self::StreamUpdated { .. } => "Stream.OnUpdate",
            Self::ServerUpdated(_) => "Server.OnUpdate",
            Self::Unknown { method, .. } => method,
        }
    }

    pub fn client_id(&self) -> Option<&ClientId> {
        match self {
            Self::ClientVolumeChanged { id, .. }
            | Self::ClientLatencyChanged { id, .. }
            | Self::ClientNameChanged { id, .. }
            | Self::ClientConnected { id, .. }
            | Self::ClientDisconnected { id, .. } => Some(id),
            _ => None,
        }
    }
}
