//! Shared AWS SDK configuration loading

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::client::ClientConfig;
use crate::common::Result;

/// Connection settings every AWS-backed client accepts
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    /// Region; falls back to the environment's provider chain
    pub region: Option<String>,
    /// Custom endpoint (LocalStack, MinIO, ...)
    pub endpoint_url: Option<String>,
    /// Named profile from the shared config files
    pub profile: Option<String>,
}

impl AwsSettings {
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            region: config.get("region")?,
            endpoint_url: config.get("endpoint_url")?,
            profile: config.get("profile")?,
        })
    }

    /// Resolve credentials, region and endpoint into an SDK config
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}
