use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::player::types::PlayerInstance;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub snapcast: SnapcastConfig,
    #[serde(default)]
    pub mopidy: MopidyConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapcastConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_snapcast_port")]
    pub port: u16,
    #[serde(default = "default_snapcast_path")]
    pub path: String,
}

impl Default for SnapcastConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_snapcast_port(),
            path: default_snapcast_path(),
        }
    }
}

impl SnapcastConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}/{}", self.host, self.port, self.path.trim_start_matches('/'))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_snapcast_port() -> u16 {
    1780
}

fn default_snapcast_path() -> String {
    "jsonrpc".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MopidyConfig {
    #[serde(default)]
    pub instances: Vec<PlayerInstance>,
    /// Backends searched by `library.search`; empty searches all of them.
    #[serde(default)]
    pub search_uris: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
    /// Zero disables the timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        let mut figment = Figment::new();

        if let Some(dirs) = ProjectDirs::from("org", "hydraplay", "hydraplay") {
            figment = figment.merge(Toml::file(dirs.config_dir().join("config.toml")));
        } else {
            tracing::warn!("Could not determine config directory, using defaults");
        }

        let config: Config = figment
            .merge(Env::prefixed("HYDRAPLAY_").split("__"))
            .extract()?;

        Ok(config)
    }

    pub fn load_from_path(path: &str) -> Result<Self, figment::Error> {
        let path = PathBuf::from(shellexpand::tilde(path).into_owned());
        let figment = Figment::new().merge(Toml::file(path));

        let config: Config = figment.extract()?;

        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.snapcast.url(), "ws://127.0.0.1:1780/jsonrpc");
        assert!(config.mopidy.instances.is_empty());
        assert_eq!(config.rpc.request_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let rpc = RpcConfig { request_timeout_ms: 0 };
        assert_eq!(rpc.request_timeout(), None);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[snapcast]
host = "192.168.178.56"
port = 8080

[[mopidy.instances]]
id = "mopidy1"
ip = "192.168.178.56"
port = 6681

[[mopidy.instances]]
id = "mopidy2"
ip = "192.168.178.56"
port = 6682
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.snapcast.url(), "ws://192.168.178.56:8080/jsonrpc");
        assert_eq!(config.mopidy.instances.len(), 2);
        assert_eq!(config.mopidy.instances[1].url(), "ws://192.168.178.56:6682/mopidy/ws");
        assert_eq!(config.rpc.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("HYDRAPLAY_SNAPCAST__PORT", "1705");
            jail.set_env("HYDRAPLAY_RPC__REQUEST_TIMEOUT_MS", "0");
            let config = Config::load()?;
            assert_eq!(config.snapcast.port, 1705);
            assert_eq!(config.rpc.request_timeout(), None);
            Ok(())
        });
    }

    #[test]
    fn test_toml_round_trip_keeps_instances() {
        let mut config = Config::default();
        config.mopidy.instances.push(PlayerInstance::new("mopidy1", "10.0.0.2", 6680));
        let text = config.to_toml().unwrap();
        assert!(text.contains("mopidy1"));
        assert!(text.contains("request_timeout_ms = 10000"));
    }
}
