//! Client registry and factory
//!
//! A registry belongs to one test run. It knows how to build every client it
//! was given a definition for, builds each one at most once, and destroys all
//! of them on teardown whether or not the steps remembered to.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ClientConfig, ClientKind, ServiceClient};
use crate::common::{Error, Result};

/// How to build a client: its kind plus its configuration bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDefinition {
    pub kind: ClientKind,
    #[serde(flatten)]
    pub config: ClientConfig,
}

impl ClientDefinition {
    pub fn new(kind: ClientKind, config: ClientConfig) -> Self {
        Self { kind, config }
    }
}

/// A lifecycle call that failed during a bulk operation
#[derive(Debug)]
pub struct ClientFailure {
    pub name: String,
    pub error: Error,
}

/// Build an uninitialized client of the given kind
pub fn build_client(name: &str, definition: &ClientDefinition) -> Result<Arc<dyn ServiceClient>> {
    #[allow(unused_imports)]
    use super::services;
    #[allow(unused_imports)]
    use super::ManagedClient;

    let config = definition.config.clone();
    let client: Arc<dyn ServiceClient> = match definition.kind {
        #[cfg(feature = "rest")]
        ClientKind::Rest => Arc::new(ManagedClient::new(name, config, services::rest::RestService)),
        #[cfg(feature = "mqtt")]
        ClientKind::Mqtt => Arc::new(ManagedClient::new(name, config, services::mqtt::MqttService)),
        #[cfg(feature = "s3")]
        ClientKind::S3 => Arc::new(ManagedClient::new(name, config, services::s3::S3Service)),
        #[cfg(feature = "cloudwatch")]
        ClientKind::Cloudwatch => Arc::new(ManagedClient::new(
            name,
            config,
            services::cloudwatch::CloudWatchService,
        )),
        #[cfg(feature = "ssm")]
        ClientKind::Ssm => Arc::new(ManagedClient::new(name, config, services::ssm::SsmService)),
        #[cfg(feature = "sqs")]
        ClientKind::Sqs => Arc::new(ManagedClient::new(name, config, services::sqs::SqsService)),
        #[cfg(feature = "kinesis")]
        ClientKind::Kinesis => Arc::new(ManagedClient::new(
            name,
            config,
            services::kinesis::KinesisService,
        )),
        #[cfg(feature = "kafka")]
        ClientKind::Kafka => Arc::new(ManagedClient::new(name, config, services::kafka::KafkaService)),
        #[allow(unreachable_patterns)]
        kind => {
            return Err(Error::KindDisabled {
                kind,
                feature: kind.feature(),
            })
        }
    };
    tracing::debug!(client = name, kind = %definition.kind, "constructed client");
    Ok(client)
}

/// Named clients for one test run
#[derive(Default)]
pub struct ClientRegistry {
    definitions: HashMap<String, ClientDefinition>,
    instances: Mutex<HashMap<String, Arc<dyn ServiceClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: HashMap<String, ClientDefinition>) -> Self {
        Self {
            definitions,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Add or replace a definition; an already-built instance is unaffected
    pub fn define(&mut self, name: impl Into<String>, definition: ClientDefinition) -> Option<ClientDefinition> {
        self.definitions.insert(name.into(), definition)
    }

    pub fn definition(&self, name: &str) -> Option<&ClientDefinition> {
        self.definitions.get(name)
    }

    /// Register a pre-built client under its own name
    pub async fn insert(&self, client: Arc<dyn ServiceClient>) -> Result<()> {
        let mut instances = self.instances.lock().await;
        let name = client.name().to_string();
        if instances.contains_key(&name) {
            return Err(Error::DuplicateClient(name));
        }
        instances.insert(name, client);
        Ok(())
    }

    /// The named client, constructed on first request but not initialized
    pub async fn get(&self, name: &str) -> Result<Arc<dyn ServiceClient>> {
        let mut instances = self.instances.lock().await;
        if let Some(client) = instances.get(name) {
            return Ok(Arc::clone(client));
        }

        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| Error::UnknownClient(name.to_string()))?;
        let client = build_client(name, definition)?;
        instances.insert(name.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// The named client, initialized if it was not already
    pub async fn get_initialized(&self, name: &str) -> Result<Arc<dyn ServiceClient>> {
        let client = self.get(name).await?;
        client.init().await?;
        Ok(client)
    }

    /// Typed access for domain operations, e.g. `registry.client::<S3Client>("uploads")`
    pub async fn client<T>(&self, name: &str) -> Result<Arc<T>>
    where
        T: ServiceClient + Any,
    {
        let client = self.get_initialized(name).await?;
        let actual = client.kind();
        client
            .into_any()
            .downcast::<T>()
            .map_err(|_| Error::ClientTypeMismatch {
                name: name.to_string(),
                actual,
            })
    }

    /// Reset one client; a client that was never built is left alone
    pub async fn reset(&self, name: &str) -> Result<()> {
        let client = self.instances.lock().await.get(name).cloned();
        match client {
            Some(client) => client.reset().await,
            None if self.definitions.contains_key(name) => Ok(()),
            None => Err(Error::UnknownClient(name.to_string())),
        }
    }

    /// Reset every live client, collecting failures
    pub async fn reset_all(&self) -> Vec<ClientFailure> {
        let mut failures = Vec::new();
        for client in self.live().await {
            if let Err(error) = client.reset().await {
                failures.push(ClientFailure {
                    name: client.name().to_string(),
                    error,
                });
            }
        }
        failures
    }

    /// Destroy and forget every client this registry holds
    ///
    /// Every client gets its `destroy` call even if an earlier one fails.
    /// Clients whose cleanup failed are dropped anyway; the failures are
    /// returned for reporting.
    pub async fn teardown(&self) -> Vec<ClientFailure> {
        let drained: Vec<_> = {
            let mut instances = self.instances.lock().await;
            let mut drained: Vec<_> = instances.drain().collect();
            drained.sort_by(|a, b| a.0.cmp(&b.0));
            drained
        };

        let mut failures = Vec::new();
        for (name, client) in drained {
            match client.destroy().await {
                Ok(()) => tracing::debug!(client = %name, "torn down"),
                Err(error) => {
                    tracing::warn!(client = %name, error = %error, "teardown failed");
                    failures.push(ClientFailure { name, error });
                }
            }
        }
        failures
    }

    /// Clients built so far, sorted by name
    pub async fn live(&self) -> Vec<Arc<dyn ServiceClient>> {
        let instances = self.instances.lock().await;
        let mut live: Vec<_> = instances.values().cloned().collect();
        live.sort_by(|a, b| a.name().cmp(b.name()));
        live
    }

    /// Every name this registry can hand out, sorted
    pub async fn names(&self) -> Vec<String> {
        let instances = self.instances.lock().await;
        self.definitions
            .keys()
            .chain(instances.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Drop for ClientRegistry {
    fn drop(&mut self) {
        if let Ok(instances) = self.instances.try_lock() {
            for (name, client) in instances.iter() {
                if client.is_initialized() {
                    tracing::warn!(client = %name, "registry dropped without teardown; client still initialized");
                }
            }
        }
    }
}
