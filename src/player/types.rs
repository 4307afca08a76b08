use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::PlayerError;

/// Identifies a player backend and the Snapcast stream it feeds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of one Mopidy instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInstance {
    pub id: StreamId,
    pub ip: String,
    pub port: u16,
}

impl PlayerInstance {
    pub fn new(id: impl Into<StreamId>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            ip: ip.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}/mopidy/ws", self.ip, self.port)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    #[default]
    Paused,
    Stopped,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        })
    }
}

pub const COVER_PLACEHOLDER: &str = "assets/images/cover_placeholder.jpg";

/// What a player is currently doing, as shown next to its zone.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreamState {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub uri: String,
    pub cover_uri: String,
    pub playback_state: PlaybackState,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            title: "no Track".to_string(),
            album: "no Album".to_string(),
            artist: "no Artist".to_string(),
            uri: "none".to_string(),
            cover_uri: COVER_PLACEHOLDER.to_string(),
            playback_state: PlaybackState::Paused,
        }
    }
}

/// Formats a track position as `h:mm:ss`, or `m:ss` below an hour.
pub fn format_position(ms: u64) -> String {
    let total = ms / 1000;
    let (h, m, s) = (total / 3600, total % 3600 / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// A live session with one player backend.
pub trait PlayerConnection: Send + Sync {
    fn id(&self) -> &StreamId;
    fn is_connected(&self) -> bool;
}

/// Opens player connections; the pool calls it once per configured instance.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: PlayerConnection + 'static;

    /// Connects and completes the initial handshake.
    async fn connect(&self, instance: &PlayerInstance) -> Result<Arc<Self::Connection>, PlayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_equality() {
        let id1 = StreamId::from("mopidy1");
        let id2 = StreamId("mopidy1".to_string());
        let id3 = StreamId::from("mopidy2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_stream_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(StreamId::from("mopidy1"));
        assert!(set.contains(&StreamId::from("mopidy1")));
        assert!(!set.contains(&StreamId::from("mopidy2")));
    }

    #[test]
    fn test_instance_url() {
        let instance = PlayerInstance::new("mopidy1", "192.168.178.56", 6681);
        assert_eq!(instance.url(), "ws://192.168.178.56:6681/mopidy/ws");
    }

    #[test]
    fn test_playback_state_serde() {
        let state: PlaybackState = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(state, PlaybackState::Stopped);
        assert_eq!(serde_json::to_string(&PlaybackState::Playing).unwrap(), "\"playing\"");
    }

    #[test]
    fn test_stream_state_default() {
        let state = StreamState::default();
        assert_eq!(state.title, "no Track");
        assert_eq!(state.playback_state, PlaybackState::Paused);
    }

    #[test]
    fn test_format_position() {
        assert_eq!(format_position(0), "0:00");
        assert_eq!(format_position(65_000), "1:05");
        assert_eq!(format_position(3_725_000), "1:02:05");
    }
}
