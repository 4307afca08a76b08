pub mod error;
pub mod events;
pub mod models;
pub mod mopidy;
pub mod registry;
pub mod types;

pub use error::PlayerError;
pub use events::MopidyEvent;
pub use models::{Album, Artist, Image, Ref, SearchResult, TlTrack, Track};
pub use mopidy::{split_query, MopidyConnector, MopidyPlayer};
pub use registry::ConnectionPool;
pub use types::{
    format_position, Connector, PlaybackState, PlayerConnection, PlayerInstance, StreamId, StreamState,
    COVER_PLACEHOLDER,
};
