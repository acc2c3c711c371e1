//! Client lifecycle state machine
//!
//! ```text
//! Uninitialized --init ok-----------> Initialized
//! Uninitialized --init err----------> Uninitialized   (hook error as-is)
//! Initialized   --destroy ok--------> Uninitialized
//! Initialized   --destroy err-------> Initialized     (Error::Destroy)
//! Initialized   --reset ok----------> Initialized
//! Initialized   --reset err---------> Uninitialized   (Error::Reset)
//! ```
//!
//! `init` on an initialized client and `destroy`/`reset` on an uninitialized
//! one are no-ops. Each transition runs under a per-instance lock, so
//! concurrent callers queue behind whoever is mid-transition instead of
//! racing the check-then-set.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ClientConfig, ClientDescriptor, ClientKind, ServiceClient};
use crate::common::error::ResetPhase;
use crate::common::{Error, Result};

/// Externally observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
        }
    }
}

/// Service-specific connect and cleanup hooks
///
/// `initialize_client` produces the connection handle that the state machine
/// keeps while the client is initialized; domain operations borrow a clone of
/// it through [`ManagedClient::handle`]. Handles are expected to be cheap to
/// clone (SDK clients, `Arc`s).
#[async_trait]
pub trait Service: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    /// Type tag reported by clients built on this service
    fn kind(&self) -> ClientKind;

    /// Validate configuration and open the connection
    async fn initialize_client(
        &self,
        client: &ClientDescriptor,
        config: &ClientConfig,
    ) -> Result<Self::Handle>;

    /// Release whatever `initialize_client` acquired
    async fn cleanup_client(&self, _client: &ClientDescriptor, _handle: &Self::Handle) -> Result<()> {
        Ok(())
    }
}

/// A client whose lifecycle is driven by the shared state machine
pub struct ManagedClient<S: Service> {
    descriptor: ClientDescriptor,
    config: ClientConfig,
    service: S,
    /// `Some` exactly when initialized
    handle: Mutex<Option<S::Handle>>,
    /// Mirror of `handle.is_some()`, readable without the lock
    initialized: AtomicBool,
}

impl<S: Service> ManagedClient<S> {
    /// Create an uninitialized client
    pub fn new(name: impl Into<String>, config: ClientConfig, service: S) -> Self {
        let descriptor = ClientDescriptor::new(name, service.kind());
        Self {
            descriptor,
            config,
            service,
            handle: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn descriptor(&self) -> &ClientDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn state(&self) -> LifecycleState {
        if self.is_initialized() {
            LifecycleState::Initialized
        } else {
            LifecycleState::Uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Connection handle for domain operations
    pub async fn handle(&self) -> Result<S::Handle> {
        self.handle
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::not_initialized(self.descriptor.name()))
    }

    #[tracing::instrument(skip(self), fields(client = %self.descriptor.name(), kind = %self.descriptor.kind()))]
    pub async fn init(&self) -> Result<()> {
        let mut slot = self.handle.lock().await;
        if slot.is_some() {
            tracing::trace!("already initialized");
            return Ok(());
        }

        match self
            .service
            .initialize_client(&self.descriptor, &self.config)
            .await
        {
            Ok(handle) => {
                *slot = Some(handle);
                self.initialized.store(true, Ordering::Release);
                tracing::debug!("initialized");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "initialization failed");
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(client = %self.descriptor.name(), kind = %self.descriptor.kind()))]
    pub async fn destroy(&self) -> Result<()> {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.as_ref() else {
            return Ok(());
        };

        if let Err(e) = self.service.cleanup_client(&self.descriptor, handle).await {
            tracing::warn!(error = %e, "cleanup failed, client stays initialized");
            return Err(Error::destroy(e));
        }

        *slot = None;
        self.initialized.store(false, Ordering::Release);
        tracing::debug!("destroyed");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(client = %self.descriptor.name(), kind = %self.descriptor.kind()))]
    pub async fn reset(&self) -> Result<()> {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.take() else {
            return Ok(());
        };
        self.initialized.store(false, Ordering::Release);

        // The old handle is discarded even if cleanup fails; a reset always
        // ends either freshly connected or uninitialized.
        if let Err(e) = self.service.cleanup_client(&self.descriptor, &handle).await {
            tracing::warn!(error = %e, "reset: cleanup failed");
            return Err(Error::reset(ResetPhase::Destroy, Error::destroy(e)));
        }
        drop(handle);

        match self
            .service
            .initialize_client(&self.descriptor, &self.config)
            .await
        {
            Ok(fresh) => {
                *slot = Some(fresh);
                self.initialized.store(true, Ordering::Release);
                tracing::debug!("reset");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "reset: re-initialization failed");
                Err(Error::reset(ResetPhase::Initialize, e))
            }
        }
    }
}

impl<S: Service> fmt::Debug for ManagedClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedClient")
            .field("name", &self.descriptor.name())
            .field("kind", &self.descriptor.kind())
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl<S: Service> ServiceClient for ManagedClient<S> {
    fn descriptor(&self) -> &ClientDescriptor {
        &self.descriptor
    }

    fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn is_initialized(&self) -> bool {
        ManagedClient::is_initialized(self)
    }

    async fn init(&self) -> Result<()> {
        ManagedClient::init(self).await
    }

    async fn reset(&self) -> Result<()> {
        ManagedClient::reset(self).await
    }

    async fn destroy(&self) -> Result<()> {
        ManagedClient::destroy(self).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{recording_client, Hook, RecordingService};
    use super::*;
    use crate::common::ErrorKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fresh_client_is_uninitialized() {
        let (service, client) = recording_client("fresh");
        assert!(!client.is_initialized());
        assert_eq!(client.state(), LifecycleState::Uninitialized);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (service, client) = recording_client("idempotent");
        client.init().await.unwrap();
        client.init().await.unwrap();
        assert!(client.is_initialized());
        assert_eq!(service.count(Hook::Setup), 1);
    }

    #[tokio::test]
    async fn test_init_failure_propagates_unwrapped() {
        let (service, client) = recording_client("broken");
        service.fail_setup("boom");

        let err = client.init().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(matches!(err, Error::Internal(_)));
        assert!(!client.is_initialized());

        service.heal();
        client.init().await.unwrap();
        assert!(client.is_initialized());
        assert_eq!(service.count(Hook::Setup), 2);
    }

    #[tokio::test]
    async fn test_destroy_uninitialized_is_noop() {
        let (service, client) = recording_client("idle");
        client.destroy().await.unwrap();
        assert_eq!(service.count(Hook::Cleanup), 0);
        assert!(!client.is_initialized());
    }

    #[tokio::test]
    async fn test_destroy_releases_handle() {
        let (service, client) = recording_client("s3");
        client.init().await.unwrap();
        client.destroy().await.unwrap();
        assert!(!client.is_initialized());
        assert_eq!(service.calls(), vec![Hook::Setup, Hook::Cleanup]);
        assert!(matches!(
            client.handle().await,
            Err(Error::NotInitialized { .. })
        ));
    }

    #[tokio::test]
    async fn test_destroy_failure_keeps_client_initialized() {
        let (service, client) = recording_client("sticky");
        client.init().await.unwrap();
        service.fail_cleanup("Cleanup failed");

        let err = client.destroy().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to destroy client: Cleanup failed");
        assert_eq!(err.kind(), ErrorKind::Destroy);
        assert!(client.is_initialized());
        assert_eq!(client.handle().await.unwrap(), 1);

        service.heal();
        client.destroy().await.unwrap();
        assert!(!client.is_initialized());
    }

    #[tokio::test]
    async fn test_reset_uninitialized_is_noop() {
        let (service, client) = recording_client("cold");
        client.reset().await.unwrap();
        assert!(service.calls().is_empty());
        assert!(!client.is_initialized());
    }

    #[tokio::test]
    async fn test_reset_runs_cleanup_then_setup() {
        let (service, client) = recording_client("warm");
        client.init().await.unwrap();
        client.reset().await.unwrap();

        assert!(client.is_initialized());
        assert_eq!(service.calls(), vec![Hook::Setup, Hook::Cleanup, Hook::Setup]);
        // a fresh handle came from the second setup
        assert_eq!(client.handle().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reset_cleanup_failure_ends_uninitialized() {
        let (service, client) = recording_client("flaky-cleanup");
        client.init().await.unwrap();
        service.fail_cleanup("socket busy");

        let err = client.reset().await.unwrap_err();
        assert_eq!(err.reset_phase(), Some(ResetPhase::Destroy));
        assert_eq!(
            err.to_string(),
            "Failed to reset client: Failed to destroy client: socket busy"
        );
        assert!(!client.is_initialized());
        assert_eq!(service.count(Hook::Setup), 1);
    }

    #[tokio::test]
    async fn test_reset_setup_failure_ends_uninitialized() {
        let (service, client) = recording_client("flaky-setup");
        client.init().await.unwrap();
        service.fail_setup("connection refused");

        let err = client.reset().await.unwrap_err();
        assert_eq!(err.reset_phase(), Some(ResetPhase::Initialize));
        assert_eq!(err.to_string(), "Failed to reset client: connection refused");
        assert!(!client.is_initialized());
        assert_eq!(service.calls(), vec![Hook::Setup, Hook::Cleanup, Hook::Setup]);
    }

    #[tokio::test]
    async fn test_concurrent_init_runs_setup_once() {
        let service = Arc::new(RecordingService {
            setup_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let client = Arc::new(ManagedClient::new(
            "racy",
            ClientConfig::new(),
            Arc::clone(&service),
        ));

        let (a, b) = tokio::join!(client.init(), client.init());
        a.unwrap();
        b.unwrap();
        assert_eq!(service.count(Hook::Setup), 1);
        assert!(client.is_initialized());
    }

    #[tokio::test]
    async fn test_contract_through_trait_object() {
        let (service, client) = recording_client("S3Client");
        let client: Arc<dyn ServiceClient> = Arc::new(client);

        assert_eq!(client.name(), "S3Client");
        assert_eq!(client.kind(), ClientKind::S3);
        client.init().await.unwrap();
        assert!(client.is_initialized());
        client.reset().await.unwrap();
        client.destroy().await.unwrap();
        assert!(!client.is_initialized());
        assert_eq!(service.count(Hook::Cleanup), 2);
    }
}
