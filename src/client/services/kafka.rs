//! Kafka client over `rskafka`

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;

use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

/// Fetch at most this many bytes per request
const MAX_FETCH_BYTES: i32 = 1_048_576;
const FETCH_WAIT_MS: i32 = 1_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaService;

/// A Kafka client managed by the lifecycle state machine
pub type KafkaClient = ManagedClient<KafkaService>;

#[derive(Clone)]
pub struct KafkaHandle {
    client: Arc<Client>,
    topic: Option<String>,
    partition: i32,
}

impl std::fmt::Debug for KafkaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaHandle")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

impl KafkaHandle {
    fn topic<'a>(&'a self, topic: Option<&'a str>) -> Result<&'a str> {
        topic
            .or(self.topic.as_deref())
            .ok_or_else(|| Error::service(ClientKind::Kafka, "no topic given and none configured"))
    }

    async fn partition_client(&self, topic: &str) -> Result<PartitionClient> {
        self.client
            .partition_client(topic.to_string(), self.partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| Error::service(ClientKind::Kafka, e))
    }
}

/// A record read back from a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaMessage {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: BTreeMap<String, Vec<u8>>,
}

impl KafkaMessage {
    pub fn value_str(&self) -> Option<String> {
        self.value
            .as_ref()
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

#[async_trait]
impl Service for KafkaService {
    type Handle = KafkaHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Kafka
    }

    async fn initialize_client(&self, client: &ClientDescriptor, config: &ClientConfig) -> Result<KafkaHandle> {
        let brokers: Vec<String> = config.require(client.name(), "brokers")?;
        if brokers.is_empty() {
            return Err(Error::config_value("brokers", "at least one bootstrap broker is required"));
        }
        let topic = config.get("topic")?;
        let partition = config.get_or("partition", 0)?;

        let kafka = ClientBuilder::new(brokers.clone())
            .build()
            .await
            .map_err(|e| Error::service(ClientKind::Kafka, e))?;

        tracing::debug!(brokers = ?brokers, "Kafka client connected");
        Ok(KafkaHandle {
            client: Arc::new(kafka),
            topic,
            partition,
        })
    }
}

impl ManagedClient<KafkaService> {
    /// Produce one record; `topic` falls back to the configured topic
    pub async fn produce(
        &self,
        topic: Option<&str>,
        key: Option<&[u8]>,
        value: impl Into<Vec<u8>>,
    ) -> Result<i64> {
        let handle = self.handle().await?;
        let partition = handle.partition_client(handle.topic(topic)?).await?;
        let record = Record {
            key: key.map(<[u8]>::to_vec),
            value: Some(value.into()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        let offsets = partition
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(|e| Error::service(ClientKind::Kafka, e))?;
        offsets
            .first()
            .copied()
            .ok_or_else(|| Error::service(ClientKind::Kafka, "broker returned no offset"))
    }

    /// Records at or after `offset`, as returned by a single fetch
    pub async fn fetch(&self, topic: Option<&str>, offset: i64) -> Result<Vec<KafkaMessage>> {
        let handle = self.handle().await?;
        let partition = handle.partition_client(handle.topic(topic)?).await?;
        let (records, _high_watermark) = partition
            .fetch_records(offset, 1..MAX_FETCH_BYTES, FETCH_WAIT_MS)
            .await
            .map_err(|e| Error::service(ClientKind::Kafka, e))?;
        Ok(records
            .into_iter()
            .map(|r| KafkaMessage {
                offset: r.offset,
                key: r.record.key,
                value: r.record.value,
                headers: r.record.headers,
            })
            .collect())
    }

    /// Offset the next produced record will get
    pub async fn latest_offset(&self, topic: Option<&str>) -> Result<i64> {
        let handle = self.handle().await?;
        let partition = handle.partition_client(handle.topic(topic)?).await?;
        partition
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(|e| Error::service(ClientKind::Kafka, e))
    }
}
