use std::sync::Arc;

use tokio::sync::mpsc;

use super::client::SnapcastClient;
use super::notification::SnapcastNotification;
use super::state::Zones;
use crate::bus::{BusMessage, Mediator, Notice, Topic};
use crate::rpc::Notification;

/// Pumps Snapcast notifications, in arrival order, into the zone mirror and
/// onto the bus.
pub struct SnapcastMonitor {
    client: Arc<SnapcastClient>,
    zones: Arc<Zones>,
    bus: Arc<Mediator>,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

impl SnapcastMonitor {
    pub fn new(
        client: Arc<SnapcastClient>,
        zones: Arc<Zones>,
        bus: Arc<Mediator>,
        notifications: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        Self {
            client,
            zones,
            bus,
            notifications,
        }
    }

    /// Runs until the Snapcast connection closes.
    pub async fn run(mut self) {
        while let Some(raw) = self.notifications.recv().await {
            let notification = SnapcastNotification::from_notification(raw);
            self.handle(&notification).await;
            self.bus.broadcast(Topic::Snapcast, BusMessage::Snapcast(notification));
        }

        tracing::error!("Snapcast connection lost");
        self.bus.publish(Notice::error("Snapcast connection lost."));
    }

    async fn handle(&self, notification: &SnapcastNotification) {
        self.zones.apply(notification);

        match notification {
            SnapcastNotification::ClientDisconnected { client, .. } => {
                tracing::info!("Snapcast client {} disconnected", client.id);
                self.bus
                    .publish(Notice::info(format!("{} connection lost.", client.display_name())));
            }
            SnapcastNotification::ClientConnected { client, .. } => {
                tracing::info!("Snapcast client {} connected", client.id);
                match self.client.get_status().await {
                    Ok(status) => self.zones.replace(status),
                    Err(e) => tracing::warn!("Failed to refresh Snapcast status: {}", e),
                }
            }
            SnapcastNotification::Unknown { method, .. } => {
                tracing::debug!("Unhandled Snapcast event: {}", method);
            }
            _ => {}
        }
    }
}
