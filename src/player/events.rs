use serde::Deserialize;
use serde_json::Value;

use super::models::TlTrack;
use super::types::PlaybackState;
use crate::rpc::Notification;

/// Connection state changes and core events of one Mopidy instance.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MopidyEvent {
    #[serde(skip_deserializing)]
    Online,
    #[serde(skip_deserializing)]
    Offline,
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
    },
    TrackPlaybackStarted {
        tl_track: TlTrack,
    },
    TrackPlaybackEnded {
        tl_track: TlTrack,
        #[serde(default)]
        time_position: u64,
    },
    TrackPlaybackPaused {
        tl_track: TlTrack,
        #[serde(default)]
        time_position: u64,
    },
    TrackPlaybackResumed {
        tl_track: TlTrack,
        #[serde(default)]
        time_position: u64,
    },
    TracklistChanged,
    OptionsChanged,
    VolumeChanged {
        volume: u8,
    },
    Seeked {
        time_position: u64,
    },
    #[serde(skip_deserializing)]
    Other { name: String, data: Value },
}

impl MopidyEvent {
    pub fn from_notification(notification: Notification) -> Self {
        let Notification { method, params } = notification;
        match serde_json::from_value(params.clone()) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("Unhandled Mopidy event {}: {}", method, e);
                MopidyEvent::Other { name: method, data: params }
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Online => "state:online",
            Self::Offline => "state:offline",
            Self::PlaybackStateChanged { .. } => "playback_state_changed",
            Self::TrackPlaybackStarted { .. } => "track_playback_started",
            Self::TrackPlaybackEnded { .. } => "track_playback_ended",
            Self::TrackPlaybackPaused { .. } => "track_playback_paused",
            Self::TrackPlaybackResumed { .. } => "track_playback_resumed",
            Self::TracklistChanged => "tracklist_changed",
            Self::OptionsChanged => "options_changed",
            Self::VolumeChanged { .. } => "volume_changed",
            Self::Seeked { .. } => "seeked",
            Self::Other { name, .. } => name,
        }
    }
}
