//! Kinesis client over `aws-sdk-kinesis`

use async_trait::async_trait;
use aws_sdk_kinesis::error::DisplayErrorContext;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::ShardIteratorType;
use aws_sdk_kinesis::Client;

use super::aws::AwsSettings;
use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct KinesisService;

/// A Kinesis client managed by the lifecycle state machine
pub type KinesisClient = ManagedClient<KinesisService>;

#[derive(Debug, Clone)]
pub struct KinesisHandle {
    client: Client,
    stream_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinesisRecord {
    pub shard_id: String,
    pub sequence_number: String,
    pub partition_key: String,
    pub data: Vec<u8>,
}

fn sdk_error(err: impl std::error::Error + 'static) -> Error {
    Error::service(ClientKind::Kinesis, DisplayErrorContext(err))
}

#[async_trait]
impl Service for KinesisService {
    type Handle = KinesisHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Kinesis
    }

    async fn initialize_client(
        &self,
        client: &ClientDescriptor,
        config: &ClientConfig,
    ) -> Result<KinesisHandle> {
        let stream_name: String = config.require(client.name(), "stream_name")?;
        let shared = AwsSettings::from_config(config)?.load().await;
        Ok(KinesisHandle {
            client: Client::new(&shared),
            stream_name,
        })
    }
}

impl ManagedClient<KinesisService> {
    /// Put one record, returning `(shard_id, sequence_number)`
    pub async fn put_record(&self, partition_key: &str, data: impl Into<Vec<u8>>) -> Result<(String, String)> {
        let handle = self.handle().await?;
        let output = handle
            .client
            .put_record()
            .stream_name(&handle.stream_name)
            .partition_key(partition_key)
            .data(Blob::new(data))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok((
            output.shard_id().to_string(),
            output.sequence_number().to_string(),
        ))
    }

    /// Read from the oldest available record on every shard, up to `limit` in total
    pub async fn read_records(&self, limit: usize) -> Result<Vec<KinesisRecord>> {
        let handle = self.handle().await?;
        let shards = handle
            .client
            .list_shards()
            .stream_name(&handle.stream_name)
            .send()
            .await
            .map_err(sdk_error)?;

        let mut records = Vec::new();
        for shard in shards.shards() {
            if records.len() >= limit {
                break;
            }
            let iterator = handle
                .client
                .get_shard_iterator()
                .stream_name(&handle.stream_name)
                .shard_id(shard.shard_id())
                .shard_iterator_type(ShardIteratorType::TrimHorizon)
                .send()
                .await
                .map_err(sdk_error)?;
            let Some(iterator) = iterator.shard_iterator() else {
                continue;
            };

            let remaining = i32::try_from(limit - records.len()).unwrap_or(i32::MAX);
            let batch = handle
                .client
                .get_records()
                .shard_iterator(iterator)
                .limit(remaining.min(10_000))
                .send()
                .await
                .map_err(sdk_error)?;
            records.extend(batch.records().iter().map(|record| KinesisRecord {
                shard_id: shard.shard_id().to_string(),
                sequence_number: record.sequence_number().to_string(),
                partition_key: record.partition_key().to_string(),
                data: record.data().as_ref().to_vec(),
            }));
        }
        records.truncate(limit);
        Ok(records)
    }
}
