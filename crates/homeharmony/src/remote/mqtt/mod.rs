//! MQTT backend: each device state is a retained `true`/`false` message.

mod client;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use linkme::distributed_slice;
use tokio::sync::Mutex;
use tracing::debug;

use super::RemoteError;
use super::RemoteStore;
use super::RemoteStoreContext;
use super::RemoteStoreFactoryResult;
use super::REGISTRY;
use client::MqttClient;
use client::RumqttcClient;

#[distributed_slice(REGISTRY)]
fn init_mqtt(ctx: &RemoteStoreContext) -> RemoteStoreFactoryResult {
    let Some(mqtt_config) = &ctx.config.store.mqtt else {
        return Ok(None);
    };

    let client = RumqttcClient::new(mqtt_config).context("Failed to create MQTT client")?;
    Ok(Some(Arc::new(MqttStore::new(
        client,
        &mqtt_config.topic_prefix,
    ))))
}

struct Connection<C> {
    client: C,
    connected: bool,
}

/// Publishes device state to `{topic_prefix}/devices/<id>`.
///
/// Connects lazily on the first write. Reads are not supported.
pub struct MqttStore<C: MqttClient> {
    connection: Mutex<Connection<C>>,
    topic_prefix: String,
}

impl<C: MqttClient> MqttStore<C> {
    pub fn new(client: C, topic_prefix: &str) -> Self {
        Self {
            connection: Mutex::new(Connection {
                client,
                connected: false,
            }),
            topic_prefix: topic_prefix.trim_end_matches('/').to_string(),
        }
    }

    fn topic_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.topic_prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.topic_prefix, path)
        }
    }
}

#[async_trait]
impl<C: MqttClient> RemoteStore for MqttStore<C> {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn write(&self, path: &str, value: bool) -> Result<(), RemoteError> {
        let topic = self.topic_for(path);
        let payload = if value { "true" } else { "false" };

        let mut conn = self.connection.lock().await;
        if !conn.connected {
            conn.client.connect().await?;
            conn.connected = true;
        }

        debug!("Publishing {} to {}", payload, topic);
        conn.client.publish(&topic, payload.as_bytes(), true).await
    }
}
