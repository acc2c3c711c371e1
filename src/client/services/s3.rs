//! S3 client over `aws-sdk-s3`

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::aws::AwsSettings;
use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

/// Connect/cleanup hooks for an S3 bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Service;

/// An S3 client managed by the lifecycle state machine
pub type S3Client = ManagedClient<S3Service>;

#[derive(Debug, Clone)]
pub struct S3Handle {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Handle {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key with the configured prefix applied
    pub fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.trim_start_matches('/'))
    }
}

fn normalize_prefix(prefix: Option<String>) -> String {
    match prefix {
        Some(prefix) => {
            let trimmed = prefix.trim_matches('/');
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{trimmed}/")
            }
        }
        None => String::new(),
    }
}

fn sdk_error<E, R>(err: SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    Error::service(ClientKind::S3, DisplayErrorContext(err))
}

#[async_trait]
impl Service for S3Service {
    type Handle = S3Handle;

    fn kind(&self) -> ClientKind {
        ClientKind::S3
    }

    async fn initialize_client(&self, client: &ClientDescriptor, config: &ClientConfig) -> Result<S3Handle> {
        let bucket: String = config.require(client.name(), "bucket")?;
        if bucket.trim().is_empty() {
            return Err(Error::config_value("bucket", "must not be empty"));
        }
        let prefix = normalize_prefix(config.get("prefix")?);
        let force_path_style = config.get_or("force_path_style", false)?;

        let shared = AwsSettings::from_config(config)?.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(force_path_style)
            .build();

        tracing::debug!(bucket = %bucket, "S3 client ready");
        Ok(S3Handle {
            client: Client::from_conf(s3_config),
            bucket,
            prefix,
        })
    }
}

impl ManagedClient<S3Service> {
    pub async fn write(&self, key: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .client
            .put_object()
            .bucket(&handle.bucket)
            .key(handle.key(key))
            .body(ByteStream::from(body.into()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let handle = self.handle().await?;
        let output = handle
            .client
            .get_object()
            .bucket(&handle.bucket)
            .key(handle.key(key))
            .send()
            .await
            .map_err(sdk_error)?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::service(ClientKind::S3, e))?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    pub async fn read_string(&self, key: &str) -> Result<String> {
        let bytes = self.read(key).await?;
        String::from_utf8(bytes).map_err(|e| Error::service(ClientKind::S3, e))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .client
            .delete_object()
            .bucket(&handle.bucket)
            .key(handle.key(key))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let handle = self.handle().await?;
        let result = handle
            .client
            .head_object()
            .bucket(&handle.bucket)
            .key(handle.key(key))
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadObjectError::NotFound(_)) => Ok(false),
            Err(e) => Err(sdk_error(e)),
        }
    }

    /// Keys under `prefix` (relative to the configured prefix), first page only
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let handle = self.handle().await?;
        let output = handle
            .client
            .list_objects_v2()
            .bucket(&handle.bucket)
            .prefix(handle.key(prefix))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| key.strip_prefix(&handle.prefix).unwrap_or(key).to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(normalize_prefix(None), "");
        assert_eq!(normalize_prefix(Some("/".to_string())), "");
        assert_eq!(normalize_prefix(Some("/smoke/runs/".to_string())), "smoke/runs/");
        assert_eq!(normalize_prefix(Some("smoke".to_string())), "smoke/");
    }

    #[tokio::test]
    async fn test_bucket_is_required() {
        let client = ManagedClient::new("uploads", ClientConfig::new(), S3Service);
        let err = client.init().await.unwrap_err();
        assert_eq!(err.to_string(), "Client 'uploads' requires configuration key 'bucket'");
        assert!(!client.is_initialized());
    }

    #[tokio::test]
    async fn test_handle_applies_prefix() {
        let client = ManagedClient::new(
            "uploads",
            ClientConfig::new()
                .with("bucket", "test-bucket")
                .with("prefix", "runs")
                .with("region", "us-east-1")
                .with("endpoint_url", "http://127.0.0.1:4566"),
            S3Service,
        );
        client.init().await.unwrap();
        let handle = client.handle().await.unwrap();
        assert_eq!(handle.bucket(), "test-bucket");
        assert_eq!(handle.key("/a/b.json"), "runs/a/b.json");
        client.destroy().await.unwrap();
    }
}
