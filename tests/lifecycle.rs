//! Lifecycle behaviour through the public API
//!
//! A scripted service stands in for a real backend so every transition and
//! failure path can be driven deterministically.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use smoke::common::error::ResetPhase;
use smoke::{
    ClientConfig, ClientDescriptor, ClientKind, ClientRegistry, Error, ErrorKind, LifecycleState,
    ManagedClient, Result, Service, ServiceClient,
};

/// Service whose hooks fail on demand; clones share their counters
#[derive(Clone, Default)]
struct Scripted {
    setups: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
    fail_setup: Arc<AtomicBool>,
    fail_cleanup: Arc<AtomicBool>,
}

#[async_trait]
impl Service for Scripted {
    type Handle = usize;

    fn kind(&self) -> ClientKind {
        ClientKind::Rest
    }

    async fn initialize_client(
        &self,
        _client: &ClientDescriptor,
        config: &ClientConfig,
    ) -> Result<usize> {
        let n = self.setups.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_setup.load(Ordering::SeqCst) {
            return Err(Error::Internal("boom".to_string()));
        }
        let base: usize = config.get_or("base", 0)?;
        Ok(base + n)
    }

    async fn cleanup_client(&self, _client: &ClientDescriptor, _handle: &usize) -> Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup.load(Ordering::SeqCst) {
            return Err(Error::Internal("Cleanup failed".to_string()));
        }
        Ok(())
    }
}

fn scripted(name: &str) -> (Scripted, ManagedClient<Scripted>) {
    let service = Scripted::default();
    let client = ManagedClient::new(name, ClientConfig::new(), service.clone());
    (service, client)
}

#[test]
fn test_config_default_for_missing_key() {
    let config = ClientConfig::new();
    assert_eq!(config.get_or("missing", 42).unwrap(), 42);
}

#[tokio::test]
async fn test_full_lifecycle() {
    let (service, client) = scripted("api");
    assert_eq!(client.state(), LifecycleState::Uninitialized);

    client.init().await.unwrap();
    assert!(client.is_initialized());
    assert_eq!(client.handle().await.unwrap(), 1);

    client.reset().await.unwrap();
    assert!(client.is_initialized());
    assert_eq!(client.handle().await.unwrap(), 2);

    client.destroy().await.unwrap();
    assert!(!client.is_initialized());
    assert_eq!(service.setups.load(Ordering::SeqCst), 2);
    assert_eq!(service.cleanups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_handle_reads_client_config() {
    let config = ClientConfig::new().with("base", 100);
    let client = ManagedClient::new("configured", config, Scripted::default());
    client.init().await.unwrap();
    assert_eq!(client.handle().await.unwrap(), 101);
}

#[tokio::test]
async fn test_init_error_propagates_unchanged() {
    let (service, client) = scripted("api");
    service.fail_setup.store(true, Ordering::SeqCst);

    let err = client.init().await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert!(!client.is_initialized());
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[tokio::test]
async fn test_destroy_failure_is_wrapped_and_client_stays_initialized() {
    let (service, client) = scripted("api");
    client.init().await.unwrap();
    service.fail_cleanup.store(true, Ordering::SeqCst);

    let err = client.destroy().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to destroy client: Cleanup failed");
    assert_eq!(err.kind(), ErrorKind::Destroy);
    assert!(client.is_initialized());

    service.fail_cleanup.store(false, Ordering::SeqCst);
    client.destroy().await.unwrap();
    assert!(!client.is_initialized());
}

#[tokio::test]
async fn test_reset_failure_names_the_phase() {
    let (service, client) = scripted("api");
    client.init().await.unwrap();
    service.fail_setup.store(true, Ordering::SeqCst);

    let err = client.reset().await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to reset client: "));
    assert_eq!(err.reset_phase(), Some(ResetPhase::Initialize));
    assert!(!client.is_initialized());

    service.fail_setup.store(false, Ordering::SeqCst);
    client.init().await.unwrap();
    service.fail_cleanup.store(true, Ordering::SeqCst);

    let err = client.reset().await.unwrap_err();
    assert_eq!(err.reset_phase(), Some(ResetPhase::Destroy));
    assert!(err.to_string().contains("Cleanup failed"));
}

#[tokio::test]
async fn test_uninitialized_handle_is_an_error() {
    let (_, client) = scripted("idle");
    let err = client.handle().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInitialized);
}

#[tokio::test]
async fn test_registry_teardown_continues_past_failures() {
    let registry = ClientRegistry::new();
    let (stuck_service, stuck) = scripted("a-stuck");
    let (_, healthy) = scripted("b-healthy");
    registry.insert(Arc::new(stuck)).await.unwrap();
    registry.insert(Arc::new(healthy)).await.unwrap();

    let a = registry.get_initialized("a-stuck").await.unwrap();
    let b = registry.get_initialized("b-healthy").await.unwrap();
    stuck_service.fail_cleanup.store(true, Ordering::SeqCst);

    let failures = registry.teardown().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "a-stuck");
    assert_eq!(failures[0].error.kind(), ErrorKind::Destroy);
    assert!(a.is_initialized());
    assert!(!b.is_initialized());
    assert!(registry.live().await.is_empty());
}

#[tokio::test]
async fn test_registry_rejects_duplicate_names() {
    let registry = ClientRegistry::new();
    let (_, first) = scripted("api");
    let (_, second) = scripted("api");
    registry.insert(Arc::new(first)).await.unwrap();
    let err = registry.insert(Arc::new(second)).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateClient(name) if name == "api"));
}

#[cfg(feature = "s3")]
#[tokio::test]
async fn test_s3_client_initializes_without_network() {
    use smoke::client::services::S3Client;
    use smoke::client::services::s3::S3Service;

    let config = ClientConfig::new()
        .with("bucket", "test-bucket")
        .with("region", "us-east-1")
        .with("endpoint_url", "http://localhost:4566");
    let client: S3Client = ManagedClient::new("S3Client", config, S3Service);

    client.init().await.unwrap();
    assert!(client.is_initialized());
    assert_eq!(client.kind(), ClientKind::S3);
    assert_eq!(client.handle().await.unwrap().bucket(), "test-bucket");

    client.destroy().await.unwrap();
    assert!(!client.is_initialized());
}
