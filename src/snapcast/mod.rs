pub mod client;
pub mod monitor;
pub mod notification;
pub mod state;
pub mod types;

pub use client::{GroupVolumeResult, SnapcastClient};
pub use monitor::SnapcastMonitor;
pub use notification::SnapcastNotification;
pub use state::Zones;
pub use types::{Client, ClientConfig, ClientId, Group, GroupId, Host, Server, ServerStatus, Stream, Volume};
