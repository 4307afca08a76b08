pub mod redistribute;

pub use redistribute::{average_percent, redistribute, to_snapcast_percent, ClientVolume};
