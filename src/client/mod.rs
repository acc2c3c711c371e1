//! Service clients and their shared lifecycle
//!
//! Every client, whatever it talks to, is driven through [`ServiceClient`]:
//! `init` before use, `reset` between scenarios, `destroy` at teardown. The
//! bookkeeping behind those calls lives once in [`lifecycle::ManagedClient`];
//! each service only supplies its connect and cleanup hooks.

pub mod config;
pub mod lifecycle;
pub mod registry;
pub mod services;

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

pub use config::ClientConfig;
pub use lifecycle::{LifecycleState, ManagedClient, Service};
pub use registry::{ClientDefinition, ClientRegistry};

/// The closed set of client types the harness knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Rest,
    Mqtt,
    S3,
    Cloudwatch,
    Ssm,
    Sqs,
    Kinesis,
    Kafka,
}

impl ClientKind {
    /// All kinds, in declaration order
    pub const ALL: [ClientKind; 8] = [
        ClientKind::Rest,
        ClientKind::Mqtt,
        ClientKind::S3,
        ClientKind::Cloudwatch,
        ClientKind::Ssm,
        ClientKind::Sqs,
        ClientKind::Kinesis,
        ClientKind::Kafka,
    ];

    /// Tag used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Rest => "rest",
            ClientKind::Mqtt => "mqtt",
            ClientKind::S3 => "s3",
            ClientKind::Cloudwatch => "cloudwatch",
            ClientKind::Ssm => "ssm",
            ClientKind::Sqs => "sqs",
            ClientKind::Kinesis => "kinesis",
            ClientKind::Kafka => "kafka",
        }
    }

    /// Cargo feature gating this kind
    pub fn feature(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClientKind::Rest => "REST",
            ClientKind::Mqtt => "MQTT",
            ClientKind::S3 => "S3",
            ClientKind::Cloudwatch => "CloudWatch",
            ClientKind::Ssm => "SSM",
            ClientKind::Sqs => "SQS",
            ClientKind::Kinesis => "Kinesis",
            ClientKind::Kafka => "Kafka",
        };
        write!(f, "{label}")
    }
}

impl FromStr for ClientKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        ClientKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| Error::UnknownClientKind(s.to_string()))
    }
}

/// Identity of a client instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDescriptor {
    name: String,
    kind: ClientKind,
}

impl ClientDescriptor {
    pub fn new(name: impl Into<String>, kind: ClientKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }
}

impl fmt::Display for ClientDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Lifecycle contract shared by every client
///
/// Test steps hold `Arc<dyn ServiceClient>` and never need to know which
/// service sits behind it. Domain operations (publish, read, write, ...)
/// live on the concrete types and are reached through
/// [`ClientRegistry::client`].
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Name and kind of this instance
    fn descriptor(&self) -> &ClientDescriptor;

    /// Configuration bound at construction
    fn config(&self) -> &ClientConfig;

    /// Whether the last completed lifecycle operation left a live connection
    fn is_initialized(&self) -> bool;

    /// Connect, unless already connected
    async fn init(&self) -> Result<()>;

    /// Tear down and reconnect; no-op when not initialized
    async fn reset(&self) -> Result<()>;

    /// Release the connection; no-op when not initialized
    async fn destroy(&self) -> Result<()>;

    /// Upcast used by the registry for typed access
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn name(&self) -> &str {
        self.descriptor().name()
    }

    fn kind(&self) -> ClientKind {
        self.descriptor().kind()
    }
}
