//! SQS client over `aws-sdk-sqs`

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;

use super::aws::AwsSettings;
use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

/// SQS caps long polling at 20 seconds
const MAX_WAIT_SECS: i32 = 20;
/// SQS caps a single receive at 10 messages
const MAX_BATCH: i32 = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqsService;

/// An SQS client managed by the lifecycle state machine
pub type SqsClient = ManagedClient<SqsService>;

#[derive(Debug, Clone)]
pub struct SqsHandle {
    client: Client,
    queue_url: String,
    wait_time_secs: i32,
}

/// A received message; `receipt_handle` is needed to delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqsMessage {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub body: String,
}

#[async_trait]
impl Service for SqsService {
    type Handle = SqsHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Sqs
    }

    async fn initialize_client(&self, client: &ClientDescriptor, config: &ClientConfig) -> Result<SqsHandle> {
        let queue_url: String = config.require(client.name(), "queue_url")?;
        let wait_time_secs: i32 = config.get_or("wait_time_secs", 0)?;
        if !(0..=MAX_WAIT_SECS).contains(&wait_time_secs) {
            return Err(Error::config_value(
                "wait_time_secs",
                format!("must be between 0 and {MAX_WAIT_SECS}"),
            ));
        }

        let shared = AwsSettings::from_config(config)?.load().await;
        Ok(SqsHandle {
            client: Client::new(&shared),
            queue_url,
            wait_time_secs,
        })
    }
}

impl ManagedClient<SqsService> {
    /// Send a message, returning its id
    pub async fn send(&self, body: &str) -> Result<Option<String>> {
        let handle = self.handle().await?;
        let output = handle
            .client
            .send_message()
            .queue_url(&handle.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Sqs, DisplayErrorContext(e)))?;
        Ok(output.message_id().map(str::to_string))
    }

    /// Receive up to `max` messages (capped at 10), long polling per configuration
    pub async fn receive(&self, max: i32) -> Result<Vec<SqsMessage>> {
        let handle = self.handle().await?;
        let output = handle
            .client
            .receive_message()
            .queue_url(&handle.queue_url)
            .max_number_of_messages(max.clamp(1, MAX_BATCH))
            .wait_time_seconds(handle.wait_time_secs)
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Sqs, DisplayErrorContext(e)))?;
        Ok(output
            .messages()
            .iter()
            .map(|m| SqsMessage {
                message_id: m.message_id().map(str::to_string),
                receipt_handle: m.receipt_handle().map(str::to_string),
                body: m.body().unwrap_or_default().to_string(),
            })
            .collect())
    }

    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .client
            .delete_message()
            .queue_url(&handle.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Sqs, DisplayErrorContext(e)))?;
        Ok(())
    }

    pub async fn purge(&self) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .client
            .purge_queue()
            .queue_url(&handle.queue_url)
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Sqs, DisplayErrorContext(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_url_is_required() {
        let client = ManagedClient::new("orders", ClientConfig::new(), SqsService);
        assert!(matches!(
            client.init().await,
            Err(Error::MissingConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_time_is_bounded() {
        let client = ManagedClient::new(
            "orders",
            ClientConfig::new()
                .with("queue_url", "http://localhost:4566/000000000000/orders")
                .with("wait_time_secs", 30),
            SqsService,
        );
        assert!(matches!(
            client.init().await,
            Err(Error::ConfigValue { .. })
        ));
    }
}
