use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::config::MqttConfig;
use crate::remote::RemoteError;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Outgoing requests buffered between the client and its event loop
const REQUEST_CAPACITY: usize = 16;

/// Publishing side of an MQTT connection; mocked in tests.
#[async_trait]
pub trait MqttClient: Send + Sync {
    async fn connect(&mut self) -> Result<(), RemoteError>;

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
        -> Result<(), RemoteError>;
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockMqttClient {
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub connects: usize,
    pub fail_publish: bool,
}

#[cfg(test)]
#[async_trait]
impl MqttClient for MockMqttClient {
    async fn connect(&mut self) -> Result<(), RemoteError> {
        self.connects += 1;
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), RemoteError> {
        if self.fail_publish {
            return Err(RemoteError::Request("broker unavailable".to_string()));
        }
        self.published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }
}

/// A live rumqttc client plus the task polling its event loop.
struct Session {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

pub struct RumqttcClient {
    options: MqttOptions,
    session: Option<Session>,
}

impl RumqttcClient {
    pub fn new(config: &MqttConfig) -> anyhow::Result<Self> {
        if config.broker.trim().is_empty() {
            anyhow::bail!("store.mqtt.broker must not be empty");
        }

        let mut options =
            MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        Ok(Self {
            options,
            session: None,
        })
    }
}

#[async_trait]
impl MqttClient for RumqttcClient {
    async fn connect(&mut self) -> Result<(), RemoteError> {
        if self.session.is_some() {
            return Ok(());
        }

        let (client, mut event_loop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        let broker = self.options.broker_address();

        // Publishes are only flushed while the event loop is polled.
        // rumqttc reconnects on the next poll after an error.
        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker {}:{}", broker.0, broker.1);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        self.session = Some(Session { client, event_loop });
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), RemoteError> {
        let Some(session) = &self.session else {
            return Err(RemoteError::Request("MQTT client is not connected".to_string()));
        };

        session
            .client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))
    }
}
