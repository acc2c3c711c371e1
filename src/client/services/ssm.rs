//! SSM Parameter Store client over `aws-sdk-ssm`

use async_trait::async_trait;
use aws_sdk_ssm::error::{DisplayErrorContext, SdkError};
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;

use super::aws::AwsSettings;
use crate::client::{ClientConfig, ClientDescriptor, ClientKind, ManagedClient, Service};
use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct SsmService;

/// An SSM client managed by the lifecycle state machine
pub type SsmClient = ManagedClient<SsmService>;

#[derive(Debug, Clone)]
pub struct SsmHandle {
    client: Client,
    with_decryption: bool,
    path_prefix: String,
}

impl SsmHandle {
    /// Parameter name with the configured path prefix applied
    ///
    /// Names that are already absolute (`/app/x`) are left alone.
    pub fn parameter_name(&self, name: &str) -> String {
        if name.starts_with('/') || self.path_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path_prefix.trim_end_matches('/'), name)
        }
    }
}

#[async_trait]
impl Service for SsmService {
    type Handle = SsmHandle;

    fn kind(&self) -> ClientKind {
        ClientKind::Ssm
    }

    async fn initialize_client(&self, _client: &ClientDescriptor, config: &ClientConfig) -> Result<SsmHandle> {
        let with_decryption = config.get_or("with_decryption", true)?;
        let path_prefix = config.get_or("path_prefix", String::new())?;
        let shared = AwsSettings::from_config(config)?.load().await;
        Ok(SsmHandle {
            client: Client::new(&shared),
            with_decryption,
            path_prefix,
        })
    }
}

impl ManagedClient<SsmService> {
    /// Parameter value, or `None` when the parameter does not exist
    pub async fn read(&self, name: &str) -> Result<Option<String>> {
        let handle = self.handle().await?;
        let result = handle
            .client
            .get_parameter()
            .name(handle.parameter_name(name))
            .with_decryption(handle.with_decryption)
            .send()
            .await;
        match result {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(str::to_string)),
            Err(SdkError::ServiceError(e)) if matches!(e.err(), GetParameterError::ParameterNotFound(_)) => {
                Ok(None)
            }
            Err(e) => Err(Error::service(ClientKind::Ssm, DisplayErrorContext(e))),
        }
    }

    /// Create or overwrite a plain string parameter
    pub async fn write(&self, name: &str, value: &str) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .client
            .put_parameter()
            .name(handle.parameter_name(name))
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Ssm, DisplayErrorContext(e)))?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .client
            .delete_parameter()
            .name(handle.parameter_name(name))
            .send()
            .await
            .map_err(|e| Error::service(ClientKind::Ssm, DisplayErrorContext(e)))?;
        Ok(())
    }
}
