use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};

use super::error::PlayerError;
use super::events::MopidyEvent;
use super::models::{Image, Ref, SearchResult, TlTrack, Track};
use super::types::{
    Connector, PlaybackState, PlayerConnection, PlayerInstance, StreamId, StreamState, COVER_PLACEHOLDER,
};
use crate::bus::{BusMessage, Mediator, Notice, Topic};
use crate::rpc::{Notification, RpcConnection, RpcError};

/// Splits a search string into terms. Double-quoted phrases stay together
/// and lose their quotes.
pub fn split_query(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in query.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    terms.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

/// A connected Mopidy instance.
///
/// Core events are consumed in arrival order by a background pump that keeps
/// the [`StreamState`] current and rebroadcasts each event on the bus under
/// [`Topic::Mopidy`].
pub struct MopidyPlayer {
    id: StreamId,
    conn: RpcConnection,
    bus: Arc<Mediator>,
    search_uris: Vec<String>,
    state: watch::Sender<StreamState>,
}

impl MopidyPlayer {
    /// Runs the handshake over an open connection and starts the event pump.
    pub async fn start(
        id: StreamId,
        conn: RpcConnection,
        notifications: mpsc::UnboundedReceiver<Notification>,
        bus: Arc<Mediator>,
        search_uris: Vec<String>,
    ) -> Result<Arc<Self>, PlayerError> {
        let version: String = conn
            .call_as("core.get_version", None)
            .await
            .map_err(|e| PlayerError::Handshake {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!("[Mopidy_{}] online (Mopidy {})", id, version);

        let (state, _) = watch::channel(StreamState::default());
        let player = Arc::new(Self {
            id,
            conn,
            bus,
            search_uris,
            state,
        });

        player.emit(MopidyEvent::Online);
        if let Err(e) = player.refresh_state().await {
            tracing::warn!("[Mopidy_{}] failed to load current state: {}", player.id, e);
        }
        tokio::spawn(Arc::clone(&player).pump(notifications));

        Ok(player)
    }

    pub fn current_state(&self) -> StreamState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub async fn version(&self) -> Result<String, RpcError> {
        self.conn.call_as("core.get_version", None).await
    }

    // Playback

    pub async fn playback_state(&self) -> Result<PlaybackState, RpcError> {
        self.conn.call_as("core.playback.get_state", None).await
    }

    pub async fn current_track(&self) -> Result<Option<Track>, RpcError> {
        self.conn.call_as("core.playback.get_current_track", None).await
    }

    pub async fn current_tl_track(&self) -> Result<Option<TlTrack>, RpcError> {
        self.conn.call_as("core.playback.get_current_tl_track", None).await
    }

    /// Milliseconds into the current track; zero when stopped.
    pub async fn time_position(&self) -> Result<u64, RpcError> {
        let position: Option<u64> = self.conn.call_as("core.playback.get_time_position", None).await?;
        Ok(position.unwrap_or(0))
    }

    pub async fn play(&self, tlid: Option<u64>) -> Result<(), RpcError> {
        let params = tlid.map(|tlid| json!({ "tlid": tlid }));
        self.conn.call("core.playback.play", params).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), RpcError> {
        self.conn.call("core.playback.pause", None).await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), RpcError> {
        self.conn.call("core.playback.resume", None).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), RpcError> {
        self.conn.call("core.playback.stop", None).await?;
        Ok(())
    }

    pub async fn next(&self) -> Result<(), RpcError> {
        self.conn.call("core.playback.next", None).await?;
        Ok(())
    }

    pub async fn previous(&self) -> Result<(), RpcError> {
        self.conn.call("core.playback.previous", None).await?;
        Ok(())
    }

    /// Pauses when playing, resumes when paused and starts playback when
    /// stopped. Returns the state asked for.
    pub async fn toggle(&self) -> Result<PlaybackState, RpcError> {
        match self.playback_state().await? {
            PlaybackState::Playing => {
                self.pause().await?;
                Ok(PlaybackState::Paused)
            }
            PlaybackState::Paused => {
                self.resume().await?;
                Ok(PlaybackState::Playing)
            }
            PlaybackState::Stopped => {
                self.play(None).await?;
                Ok(PlaybackState::Playing)
            }
        }
    }

    /// Queues `uri` and starts playing it, optionally replacing the tracklist.
    pub async fn play_uri(&self, uri: &str, clear: bool) -> Result<Option<TlTrack>, RpcError> {
        if clear {
            self.clear_tracklist().await?;
        }
        let added = self.add_uris(&[uri.to_string()]).await?;
        let first = added.into_iter().next();
        match &first {
            Some(tl_track) => self.play(Some(tl_track.tlid)).await?,
            None => tracing::warn!("[Mopidy_{}] nothing added for {}", self.id, uri),
        }
        Ok(first)
    }

    // Tracklist

    pub async fn tracklist(&self) -> Result<Vec<TlTrack>, RpcError> {
        self.conn.call_as("core.tracklist.get_tl_tracks", None).await
    }

    pub async fn add_uris(&self, uris: &[String]) -> Result<Vec<TlTrack>, RpcError> {
        self.conn
            .call_as("core.tracklist.add", Some(json!({ "uris": uris })))
            .await
    }

    pub async fn clear_tracklist(&self) -> Result<(), RpcError> {
        self.conn.call("core.tracklist.clear", None).await?;
        Ok(())
    }

    pub async fn remove_track(&self, tlid: u64) -> Result<Vec<TlTrack>, RpcError> {
        self.conn
            .call_as("core.tracklist.remove", Some(json!({ "criteria": { "tlid": [tlid] } })))
            .await
    }

    pub async fn set_random(&self, value: bool) -> Result<(), RpcError> {
        self.conn
            .call("core.tracklist.set_random", Some(json!({ "value": value })))
            .await?;
        Ok(())
    }

    pub async fn set_repeat(&self, value: bool) -> Result<(), RpcError> {
        self.conn
            .call("core.tracklist.set_repeat", Some(json!({ "value": value })))
            .await?;
        Ok(())
    }

    // Library

    /// Searches every configured backend and flattens the matching tracks.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>, RpcError> {
        let terms = split_query(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = json!({ "query": { "any": terms }, "exact": false });
        if !self.search_uris.is_empty() {
            params["uris"] = json!(self.search_uris);
        }

        let results: Vec<SearchResult> = self.conn.call_as("core.library.search", Some(params)).await?;
        let tracks: Vec<Track> = results.into_iter().flat_map(|r| r.tracks).collect();

        tracing::debug!("[Mopidy_{}] search {:?}: {} track(s)", self.id, query, tracks.len());
        if tracks.is_empty() {
            self.bus.publish(Notice::info(format!("No results for \"{}\".", query)));
        }
        Ok(tracks)
    }

    pub async fn images(&self, uris: &[String]) -> Result<HashMap<String, Vec<Image>>, RpcError> {
        self.conn
            .call_as("core.library.get_images", Some(json!({ "uris": uris })))
            .await
    }

    // Playlists

    pub async fn playlists(&self) -> Result<Vec<Ref>, RpcError> {
        self.conn.call_as("core.playlists.as_list", None).await
    }

    pub async fn playlist_items(&self, uri: &str) -> Result<Vec<Ref>, RpcError> {
        let items: Option<Vec<Ref>> = self
            .conn
            .call_as("core.playlists.get_items", Some(json!({ "uri": uri })))
            .await?;
        Ok(items.unwrap_or_default())
    }

    /// Adds every item of a playlist to the end of the tracklist.
    pub async fn append_playlist(&self, uri: &str) -> Result<Vec<TlTrack>, RpcError> {
        let uris: Vec<String> = self.playlist_items(uri).await?.into_iter().map(|r| r.uri).collect();
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        self.add_uris(&uris).await
    }

    /// Reloads playback state, current track and cover from the server.
    pub async fn refresh_state(&self) -> Result<StreamState, RpcError> {
        let playback_state = self.playback_state().await?;
        let track = self.current_track().await?;

        let cover = match &track {
            Some(track) => self.cover_for(&track.uri).await,
            None => None,
        };

        self.state.send_modify(|state| {
            state.playback_state = playback_state;
            if let Some(track) = track {
                let placeholder = StreamState::default();
                state.title = track.name;
                state.album = track
                    .album
                    .map(|a| a.name)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(placeholder.album);
                state.artist = track
                    .artists
                    .into_iter()
                    .next()
                    .map(|a| a.name)
                    .unwrap_or(placeholder.artist);
                state.uri = track.uri;
                state.cover_uri = cover.unwrap_or_else(|| COVER_PLACEHOLDER.to_string());
            }
        });
        Ok(self.current_state())
    }

    async fn cover_for(&self, uri: &str) -> Option<String> {
        match self.images(&[uri.to_string()]).await {
            Ok(mut images) => images
                .remove(uri)
                .and_then(|list| list.into_iter().next())
                .map(|image| image.uri),
            Err(e) => {
                tracing::debug!("[Mopidy_{}] no cover for {}: {}", self.id, uri, e);
                None
            }
        }
    }

    fn emit(&self, event: MopidyEvent) {
        self.bus.broadcast(
            Topic::Mopidy,
            BusMessage::Mopidy {
                instance: self.id.clone(),
                event,
            },
        );
    }

    async fn pump(self: Arc<Self>, mut notifications: mpsc::UnboundedReceiver<Notification>) {
        while let Some(raw) = notifications.recv().await {
            let event = MopidyEvent::from_notification(raw);
            tracing::debug!("[Mopidy_{}] event {}", self.id, event.name());
            self.handle(&event).await;
            self.emit(event);
        }

        tracing::warn!("[Mopidy_{}] offline", self.id);
        self.emit(MopidyEvent::Offline);
    }

    async fn handle(&self, event: &MopidyEvent) {
        let refresh = match event {
            MopidyEvent::PlaybackStateChanged { new_state, .. } => {
                self.state.send_modify(|s| s.playback_state = *new_state);
                true
            }
            MopidyEvent::TrackPlaybackStarted { .. } => true,
            MopidyEvent::TrackPlaybackEnded { .. } => {
                self.state.send_modify(|s| s.playback_state = PlaybackState::Stopped);
                false
            }
            MopidyEvent::TrackPlaybackPaused { .. } => {
                self.state.send_modify(|s| s.playback_state = PlaybackState::Paused);
                false
            }
            MopidyEvent::TrackPlaybackResumed { .. } => {
                self.state.send_modify(|s| s.playback_state = PlaybackState::Playing);
                false
            }
            _ => false,
        };

        if refresh {
            if let Err(e) = self.refresh_state().await {
                tracing::warn!("[Mopidy_{}] failed to refresh state: {}", self.id, e);
            }
        }
    }
}

impl PlayerConnection for MopidyPlayer {
    fn id(&self) -> &StreamId {
        &self.id
    }

    fn is_connected(&self) -> bool {
        !self.conn.is_closed()
    }
}

impl std::fmt::Debug for MopidyPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MopidyPlayer")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Opens [`MopidyPlayer`]s for the connection pool.
#[derive(Debug)]
pub struct MopidyConnector {
    bus: Arc<Mediator>,
    timeout: Option<Duration>,
    search_uris: Vec<String>,
}

impl MopidyConnector {
    pub fn new(bus: Arc<Mediator>, timeout: Option<Duration>, search_uris: Vec<String>) -> Self {
        Self {
            bus,
            timeout,
            search_uris,
        }
    }
}

#[async_trait]
impl Connector for MopidyConnector {
    type Connection = MopidyPlayer;

    async fn connect(&self, instance: &PlayerInstance) -> Result<Arc<MopidyPlayer>, PlayerError> {
        let label = format!("Mopidy_{}", instance.id);
        let (conn, notifications) = RpcConnection::connect(&instance.url(), label, self.timeout)
            .await
            .map_err(|e| PlayerError::Handshake {
                id: instance.id.clone(),
                reason: e.to_string(),
            })?;

        MopidyPlayer::start(
            instance.id.clone(),
            conn,
            notifications,
            Arc::clone(&self.bus),
            self.search_uris.clone(),
        )
        .await
    }
}
