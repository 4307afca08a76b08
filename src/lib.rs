pub mod bus;
pub mod config;
pub mod player;
pub mod rpc;
pub mod session;
pub mod snapcast;
pub mod volume;

pub use bus::{BusMessage, Mediator, Notice, NoticeLevel, Topic};
pub use config::{Config, MopidyConfig, RpcConfig, SnapcastConfig};
pub use player::{ConnectionPool, MopidyConnector, MopidyEvent, MopidyPlayer, PlayerError, PlayerInstance, StreamId, StreamState};
pub use rpc::{RpcConnection, RpcError};
pub use session::{Session, SessionError};
pub use snapcast::{ClientId, GroupId, GroupVolumeResult, SnapcastClient, SnapcastNotification, Volume, Zones};
pub use volume::{redistribute, ClientVolume};
