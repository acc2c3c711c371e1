//! CloudWatch Logs client over `aws-sdk-cloudwatchlogs`
//!
//! Smoke scenarios mostly use this to confirm that a deployed function logged
//! what it should have.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::Client;

use super::aws::AwsSettings;
use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default)]
pub struct CloudWatchService;

/// A CloudWatch Logs client managed by the lifecycle state machine
pub type CloudWatchClient = ManagedClient<CloudWatchService>;

#[derive(Debug, Clone)]
pub struct CloudWatchHandle {
    client: Client,
    log_group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_ms: Option<i64>,
    pub log_stream: Option<String>,
    pub message: String,
}

/// Milliseconds since the epoch, as CloudWatch expects
pub fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl Service for CloudWatchService {
    type Handle = CloudWatchHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Cloudwatch
    }

    async fn initialize_client(
        &self,
        client: &ClientDescriptor,
        config: &ClientConfig,
    ) -> Result<CloudWatchHandle> {
        let log_group: String = config.require(client.name(), "log_group")?;
        let shared = AwsSettings::from_config(config)?.load().await;
        Ok(CloudWatchHandle {
            client: Client::new(&shared),
            log_group,
        })
    }
}

impl ManagedClient<CloudWatchService> {
    /// Events in the log group matching `pattern` since `since`, first page only
    pub async fn filter_events(&self, pattern: Option<&str>, since: SystemTime) -> Result<Vec<LogEvent>> {
        let handle = self.handle().await?;
        let mut request = handle
            .client
            .filter_log_events()
            .log_group_name(&handle.log_group)
            .start_time(epoch_millis(since));
        if let Some(pattern) = pattern {
            request = request.filter_pattern(pattern);
        }
        let output = request
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Cloudwatch, DisplayErrorContext(e)))?;
        Ok(output
            .events()
            .iter()
            .map(|event| LogEvent {
                timestamp_ms: event.timestamp(),
                log_stream: event.log_stream_name().map(str::to_string),
                message: event.message().unwrap_or_default().to_string(),
            })
            .collect())
    }

    /// Poll until an event matching `pattern` shows up or `timeout` elapses
    pub async fn wait_for_event(&self, pattern: &str, since: SystemTime, timeout: Duration) -> Result<LogEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(event) = self.filter_events(Some(pattern), since).await?.into_iter().next() {
                return Ok(event);
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(Error::Timeout(timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis() {
        assert_eq!(epoch_millis(UNIX_EPOCH), 0);
        assert_eq!(epoch_millis(UNIX_EPOCH + Duration::from_millis(1_500)), 1_500);
    }

    #[tokio::test]
    async fn test_log_group_is_required() {
        let client = ManagedClient::new("logs", ClientConfig::new(), CloudWatchService);
        let err = client.init().await.unwrap_err();
        assert_eq!(err.to_string(), "Client 'logs' requires configuration key 'log_group'");
    }
}
