use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use super::types::{Client, ClientId, Group, GroupId, ServerStatus, Volume};
use crate::config::SnapcastConfig;
use crate::player::types::StreamId;
use crate::rpc::{Notification, RpcConnection, RpcError};
use crate::volume::{redistribute, to_snapcast_percent, ClientVolume};

/// Outcome of a group volume change, one `Client.SetVolume` per client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupVolumeResult {
    pub success: usize,
    pub total: usize,
    pub applied: Vec<(ClientId, Volume)>,
    pub failures: Vec<(ClientId, String)>,
}

#[derive(Deserialize)]
struct VolumeReply {
    volume: Volume,
}

#[derive(Deserialize)]
struct StreamReply {
    stream_id: StreamId,
}

#[derive(Deserialize)]
struct NameReply {
    name: String,
}

#[derive(Deserialize)]
struct ClientReply {
    client: Client,
}

/// Typed JSON-RPC calls against a Snapcast server.
#[derive(Debug)]
pub struct SnapcastClient {
    conn: RpcConnection,
}

impl SnapcastClient {
    pub async fn connect(
        config: &SnapcastConfig,
        timeout: Option<Duration>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), RpcError> {
        let (conn, notifications) = RpcConnection::connect(&config.url(), "snapcast", timeout).await?;
        Ok((Self::new(conn), notifications))
    }

    pub fn new(conn: RpcConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &RpcConnection {
        &self.conn
    }

    pub async fn get_status(&self) -> Result<ServerStatus, RpcError> {
        self.conn.call_as("Server.GetStatus", None).await
    }

    pub async fn set_volume(&self, client: &ClientId, volume: Volume) -> Result<Volume, RpcError> {
        let params = json!({ "id": client, "volume": volume });
        let reply: VolumeReply = self.conn.call_as("Client.SetVolume", Some(params)).await?;
        Ok(reply.volume)
    }

    pub async fn set_stream(&self, group: &GroupId, stream: &StreamId) -> Result<StreamId, RpcError> {
        let params = json!({ "id": group, "stream_id": stream });
        let reply: StreamReply = self.conn.call_as("Group.SetStream", Some(params)).await?;
        Ok(reply.stream_id)
    }

    pub async fn set_clients(&self, group: &GroupId, clients: &[ClientId]) -> Result<ServerStatus, RpcError> {
        let params = json!({ "id": group, "clients": clients });
        self.conn.call_as("Group.SetClients", Some(params)).await
    }

    pub async fn set_client_name(&self, client: &ClientId, name: &str) -> Result<String, RpcError> {
        let params = json!({ "id": client, "name": name });
        let reply: NameReply = self.conn.call_as("Client.SetName", Some(params)).await?;
        Ok(reply.name)
    }

    pub async fn client_status(&self, client: &ClientId) -> Result<Client, RpcError> {
        let params = json!({ "id": client });
        let reply: ClientReply = self.conn.call_as("Client.GetStatus", Some(params)).await?;
        Ok(reply.client)
    }

    /// Moves the group's average volume over its connected clients to
    /// `target`, keeping their relative loudness. Each client gets its own
    /// `Client.SetVolume`; there is no atomic batch, so a partial failure
    /// leaves the group partially updated.
    pub async fn set_group_volume(&self, group: &Group, target: f64) -> GroupVolumeResult {
        let current: Vec<&Client> = group.connected_clients().collect();
        let volumes: Vec<ClientVolume> = current
            .iter()
            .map(|c| ClientVolume::new(c.id.clone(), f64::from(c.config.volume.percent)))
            .collect();

        let target = target.clamp(0.0, 100.0);
        let planned = redistribute(&volumes, group.average_volume(), target);

        tracing::debug!(
            "group {}: average {:.1} -> {:.1} over {} client(s)",
            group.id,
            group.average_volume(),
            target,
            planned.len()
        );

        let requests = current.iter().zip(planned.iter()).map(|(client, plan)| {
            let volume = Volume::new(to_snapcast_percent(plan.percent), client.config.volume.muted);
            async move {
                self.set_volume(&plan.id, volume)
                    .await
                    .map(|applied| (plan.id.clone(), applied))
                    .map_err(|e| (plan.id.clone(), e.to_string()))
            }
        });

        let mut result = GroupVolumeResult {
            total: planned.len(),
            ..Default::default()
        };
        for outcome in join_all(requests).await {
            match outcome {
                Ok(applied) => {
                    result.success += 1;
                    result.applied.push(applied);
                }
                Err((id, e)) => {
                    tracing::warn!("Failed to set volume of client {}: {}", id, e);
                    result.failures.push((id, e));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::connection::testing::FakeServer;
    use crate::snapcast::types::fixtures::{client, group};
    use serde_json::{json, Value};

    fn echo_volume(method: &str, params: &Value) -> Value {
        match method {
            "Client.SetVolume" => json!({ "volume": params["volume"] }),
            _ => Value::Null,
        }
    }

    #[tokio::test]
    async fn test_get_status() {
        let (conn, _n, mut server) = FakeServer::connect(None);
        let snapcast = SnapcastClient::new(conn);

        let call = tokio::spawn(async move { snapcast.get_status().await });
        server
            .expect(
                "Server.GetStatus",
                json!({"server": {"groups": [{"id": "g1", "stream_id": "mopidy1", "clients": []}], "streams": []}}),
            )
            .await;

        let status = call.await.unwrap().unwrap();
        assert_eq!(status.server.groups[0].id, GroupId::from("g1"));
    }

    #[tokio::test]
    async fn test_set_volume_params() {
        let (conn, _n, mut server) = FakeServer::connect(None);
        let snapcast = SnapcastClient::new(conn);

        let call = tokio::spawn(async move { snapcast.set_volume(&ClientId::from("c1"), Volume::new(42, true)).await });
        let params = server
            .expect("Client.SetVolume", json!({"volume": {"percent": 42, "muted": true}}))
            .await;

        assert_eq!(params, json!({"id": "c1", "volume": {"percent": 42, "muted": true}}));
        assert_eq!(call.await.unwrap().unwrap(), Volume::new(42, true));
    }

    #[tokio::test]
    async fn test_set_stream_params() {
        let (conn, _n, mut server) = FakeServer::connect(None);
        let snapcast = SnapcastClient::new(conn);

        let call = tokio::spawn(async move {
            snapcast
                .set_stream(&GroupId::from("g1"), &StreamId::from("mopidy2"))
                .await
        });
        let params = server.expect("Group.SetStream", json!({"stream_id": "mopidy2"})).await;

        assert_eq!(params, json!({"id": "g1", "stream_id": "mopidy2"}));
        assert_eq!(call.await.unwrap().unwrap(), StreamId::from("mopidy2"));
    }

    #[tokio::test]
    async fn test_set_clients_and_name() {
        let (conn, _n, server) = FakeServer::connect(None);
        let (_push, calls) = server.serve(|method, params| match method {
            "Group.SetClients" => json!({"server": {"groups": [], "streams": []}}),
            "Client.SetName" => json!({"name": params["name"]}),
            _ => Value::Null,
        });
        let snapcast = SnapcastClient::new(conn);

        snapcast
            .set_clients(&GroupId::from("g1"), &[ClientId::from("a"), ClientId::from("b")])
            .await
            .unwrap();
        let name = snapcast.set_client_name(&ClientId::from("a"), "Kitchen").await.unwrap();

        assert_eq!(name, "Kitchen");
        let calls = calls.lock();
        assert_eq!(calls[0].1, json!({"id": "g1", "clients": ["a", "b"]}));
        assert_eq!(calls[1].0, "Client.SetName");
    }

    #[tokio::test]
    async fn test_group_volume_sends_one_command_per_connected_client() {
        let (conn, _n, server) = FakeServer::connect(None);
        let (_push, calls) = server.serve(echo_volume);
        let snapcast = SnapcastClient::new(conn);

        let g = group(
            "g1",
            "mopidy1",
            vec![client("a", 20, true), client("b", 80, true), client("off", 10, false)],
        );
        let result = snapcast.set_group_volume(&g, 70.0).await;

        assert_eq!(result.total, 2);
        assert_eq!(result.success, 2);
        assert!(result.failures.is_empty());
        assert_eq!(
            result.applied,
            vec![
                (ClientId::from("a"), Volume::new(52, false)),
                (ClientId::from("b"), Volume::new(88, false)),
            ]
        );

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(m, p)| m == "Client.SetVolume" && p["id"] != "off"));
    }

    #[tokio::test]
    async fn test_group_volume_without_connected_clients_is_empty() {
        let (conn, _n, server) = FakeServer::connect(None);
        let (_push, calls) = server.serve(echo_volume);
        let snapcast = SnapcastClient::new(conn);

        let g = group("g1", "mopidy1", vec![client("off", 10, false)]);
        let result = snapcast.set_group_volume(&g, 70.0).await;

        assert_eq!(result, GroupVolumeResult::default());
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_group_volume_reports_failures() {
        let (conn, _n, server) = FakeServer::connect(None);
        server.close();
        let snapcast = SnapcastClient::new(conn);

        let g = group("g1", "mopidy1", vec![client("a", 20, true)]);
        let result = snapcast.set_group_volume(&g, 30.0).await;

        assert_eq!(result.total, 1);
        assert_eq!(result.success, 0);
        assert_eq!(result.failures[0].0, ClientId::from("a"));
    }
}
