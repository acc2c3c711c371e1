//! MQTT client over `rumqttc`
//!
//! Setup waits for the broker's CONNACK so a bad host or bad credentials fail
//! `init` instead of the first publish. After that the event loop runs in a
//! background task that buffers incoming publishes for [`MqttClient::receive`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Connect/cleanup hooks for MQTT brokers
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttService;

/// An MQTT client managed by the lifecycle state machine
pub type MqttClient = ManagedClient<MqttService>;

/// A message delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl MqttMessage {
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Live session: the request channel plus the task driving the event loop
pub struct MqttSession {
    client: AsyncClient,
    inbox: Mutex<mpsc::UnboundedReceiver<MqttMessage>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.abort();
        }
    }
}

pub type MqttHandle = Arc<MqttSession>;

/// Broker settings
#[derive(Debug, Clone)]
struct MqttSettings {
    host: String,
    port: u16,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
    keep_alive: Duration,
    connect_timeout: Duration,
    capacity: usize,
}

impl MqttSettings {
    fn from_config(client: &ClientDescriptor, config: &ClientConfig) -> Result<Self> {
        let settings = Self {
            host: config.require(client.name(), "host")?,
            port: config.get_or("port", DEFAULT_PORT)?,
            client_id: config.get_or("client_id", format!("smoke-{}", client.name()))?,
            username: config.get("username")?,
            password: config.get("password")?,
            keep_alive: Duration::from_secs(config.get_or("keep_alive_secs", DEFAULT_KEEP_ALIVE_SECS)?),
            connect_timeout: Duration::from_secs(
                config.get_or("connect_timeout_secs", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            ),
            capacity: config.get_or("capacity", DEFAULT_CAPACITY)?,
        };
        if settings.password.is_some() && settings.username.is_none() {
            return Err(Error::config_value("password", "set without a username"));
        }
        Ok(settings)
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}

#[async_trait]
impl Service for MqttService {
    type Handle = MqttHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Mqtt
    }

    async fn initialize_client(
        &self,
        client: &ClientDescriptor,
        config: &ClientConfig,
    ) -> Result<MqttHandle> {
        let settings = MqttSettings::from_config(client, config)?;
        let (mqtt, mut eventloop) = AsyncClient::new(settings.options(), settings.capacity);

        tokio::time::timeout(settings.connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| Error::Timeout(settings.connect_timeout))??;

        let (tx, rx) = mpsc::unbounded_channel();
        let name = client.name().to_string();
        let driver = tokio::spawn(drive(name, eventloop, tx));

        tracing::debug!(host = %settings.host, port = settings.port, "MQTT session established");
        Ok(Arc::new(MqttSession {
            client: mqtt,
            inbox: Mutex::new(rx),
            driver: Mutex::new(Some(driver)),
        }))
    }

    async fn cleanup_client(&self, client: &ClientDescriptor, handle: &MqttHandle) -> Result<()> {
        let disconnect = handle.client.disconnect().await;

        // Give the event loop a moment to flush the DISCONNECT, then stop it
        let stopped = match handle.driver.lock().await.take() {
            Some(mut driver) => match tokio::time::timeout(DISCONNECT_GRACE, &mut driver).await {
                Ok(_) => true,
                Err(_) => {
                    driver.abort();
                    false
                }
            },
            None => true,
        };

        match disconnect {
            Ok(()) => Ok(()),
            // The broker already closed the session; nothing left to release
            Err(e) if stopped => {
                tracing::debug!(client = %client.name(), error = %e, "MQTT event loop already stopped");
                Ok(())
            }
            Err(e) => Err(Error::service(ClientKind::Mqtt, e)),
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(Error::service(ClientKind::Mqtt, e)),
        }
    }
}

/// Poll the event loop until the connection drops, forwarding publishes
async fn drive(name: String, mut eventloop: EventLoop, tx: mpsc::UnboundedSender<MqttMessage>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = MqttMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
            Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client = %name, error = %e, "MQTT event loop stopped");
                break;
            }
        }
    }
}

fn qos(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::service(
            ClientKind::Mqtt,
            format!("invalid QoS level {other}"),
        )),
    }
}

impl ManagedClient<MqttService> {
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>, qos_level: u8) -> Result<()> {
        let session = self.handle().await?;
        session
            .client
            .publish(topic, qos(qos_level)?, false, payload)
            .await
            .map_err(|e| Error::service(ClientKind::Mqtt, e))
    }

    pub async fn subscribe(&self, topic: &str, qos_level: u8) -> Result<()> {
        let session = self.handle().await?;
        session
            .client
            .subscribe(topic, qos(qos_level)?)
            .await
            .map_err(|e| Error::service(ClientKind::Mqtt, e))
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        let session = self.handle().await?;
        session
            .client
            .unsubscribe(topic)
            .await
            .map_err(|e| Error::service(ClientKind::Mqtt, e))
    }

    /// Next buffered message, waiting up to `timeout`
    pub async fn receive(&self, timeout: Duration) -> Result<MqttMessage> {
        let session = self.handle().await?;
        let mut inbox = session.inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(Error::service(ClientKind::Mqtt, "connection closed")),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ClientDescriptor {
        ClientDescriptor::new("telemetry", ClientKind::Mqtt)
    }

    #[test]
    fn test_settings_defaults() {
        let config = ClientConfig::new().with("host", "broker.local");
        let settings = MqttSettings::from_config(&descriptor(), &config).unwrap();
        assert_eq!(settings.port, 1883);
        assert_eq!(settings.client_id, "smoke-telemetry");
        assert_eq!(settings.keep_alive, Duration::from_secs(30));
        assert_eq!(settings.capacity, 64);
    }

    #[test]
    fn test_host_is_required() {
        let err = MqttSettings::from_config(&descriptor(), &ClientConfig::new()).unwrap_err();
        assert!(matches!(err, Error::MissingConfig { .. }));
    }

    #[test]
    fn test_password_without_username_is_rejected() {
        let config = ClientConfig::new()
            .with("host", "broker.local")
            .with("password", "hunter2");
        assert!(MqttSettings::from_config(&descriptor(), &config).is_err());
    }

    #[test]
    fn test_qos_levels() {
        assert_eq!(qos(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos(2).unwrap(), QoS::ExactlyOnce);
        assert!(qos(3).is_err());
    }

    /// Loopback broker that accepts one connection, acknowledges it, then hangs up
    async fn broker_that_hangs_up() -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut connect = [0u8; 256];
            let _ = socket.read(&mut connect).await.unwrap();
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            socket.flush().await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn test_destroy_after_broker_hangs_up() {
        let port = broker_that_hangs_up().await;
        let client = ManagedClient::new(
            "telemetry",
            ClientConfig::new()
                .with("host", "127.0.0.1")
                .with("port", port)
                .with("connect_timeout_secs", 5),
            MqttService,
        );
        client.init().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        client.destroy().await.unwrap();
        assert!(!client.is_initialized());
        client.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_init() {
        // Nothing listens on the discard port on loopback
        let client = ManagedClient::new(
            "telemetry",
            ClientConfig::new()
                .with("host", "127.0.0.1")
                .with("port", 9)
                .with("connect_timeout_secs", 2),
            MqttService,
        );
        assert!(client.init().await.is_err());
        assert!(!client.is_initialized());
        assert!(matches!(
            client.publish("a/b", "x", 0).await,
            Err(Error::NotInitialized { .. })
        ));
    }
}
