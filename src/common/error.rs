//! Error types for the smoke harness
//!
//! Hook errors raised during `init` are returned untouched so the transport's
//! own diagnostic reaches the test step. `destroy` and `reset` wrap their
//! cause with a phase prefix.

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::client::ClientKind;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of a reset failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPhase {
    /// Tearing down the existing connection
    Destroy,
    /// Re-running setup after a successful teardown
    Initialize,
}

impl fmt::Display for ResetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetPhase::Destroy => write!(f, "destroy"),
            ResetPhase::Initialize => write!(f, "initialize"),
        }
    }
}

/// Coarse failure category, for callers that branch on what went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A transport or SDK call failed, including setup hooks
    Service,
    /// A cleanup hook failed during `destroy`
    Destroy,
    /// Either phase of `reset` failed
    Reset,
    /// An operation needed a live connection
    NotInitialized,
    /// Configuration was missing or malformed
    Configuration,
    /// Registry lookups and downcasts
    Registry,
    /// Anything else
    Other,
}

/// Main error type for the smoke harness
#[derive(Error, Debug)]
pub enum Error {
    // === Lifecycle Errors ===
    #[error("Failed to destroy client: {source}")]
    Destroy {
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to reset client: {source}")]
    Reset {
        phase: ResetPhase,
        #[source]
        source: Box<Error>,
    },

    #[error("Client '{name}' is not initialized. Call init() before using it")]
    NotInitialized { name: String },

    // === Service Errors ===
    #[error("{kind} request failed: {message}")]
    Service { kind: ClientKind, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    // === Registry Errors ===
    #[error("No client named '{0}' is configured")]
    UnknownClient(String),

    #[error("Unknown client kind '{0}'. Expected one of: rest, mqtt, s3, cloudwatch, ssm, sqs, kinesis, kafka")]
    UnknownClientKind(String),

    #[error("A client named '{0}' is already registered")]
    DuplicateClient(String),

    #[error("Client '{name}' is a {actual} client, not the requested type")]
    ClientTypeMismatch { name: String, actual: ClientKind },

    #[error("{kind} support was not compiled in (enable the '{feature}' feature)")]
    KindDisabled { kind: ClientKind, feature: &'static str },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    ConfigValue { key: String, reason: String },

    #[error("Client '{client}' requires configuration key '{key}'")]
    MissingConfig { client: String, key: String },

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Wrap a cleanup failure
    pub fn destroy(source: Error) -> Self {
        Self::Destroy {
            source: Box::new(source),
        }
    }

    /// Wrap a failure from one of the reset phases
    pub fn reset(phase: ResetPhase, source: Error) -> Self {
        Self::Reset {
            phase,
            source: Box::new(source),
        }
    }

    /// Create a not-initialized error for the named client
    pub fn not_initialized(name: &str) -> Self {
        Self::NotInitialized {
            name: name.to_string(),
        }
    }

    /// Create a service error from anything displayable
    pub fn service(kind: ClientKind, message: impl fmt::Display) -> Self {
        Self::Service {
            kind,
            message: message.to_string(),
        }
    }

    /// Create a missing configuration key error
    pub fn missing_config(client: &str, key: &str) -> Self {
        Self::MissingConfig {
            client: client.to_string(),
            key: key.to_string(),
        }
    }

    /// Create an invalid configuration value error
    pub fn config_value(key: &str, reason: impl fmt::Display) -> Self {
        Self::ConfigValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify the error
    ///
    /// `init` returns setup hook errors as-is, so an initialization failure is
    /// classified by whatever the hook raised.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Destroy { .. } => ErrorKind::Destroy,
            Error::Reset { .. } => ErrorKind::Reset,
            Error::NotInitialized { .. } => ErrorKind::NotInitialized,
            Error::Service { .. } | Error::Timeout(_) => ErrorKind::Service,
            Error::Config(_)
            | Error::ConfigValue { .. }
            | Error::MissingConfig { .. }
            | Error::ConfigParse(_) => ErrorKind::Configuration,
            Error::UnknownClient(_)
            | Error::UnknownClientKind(_)
            | Error::DuplicateClient(_)
            | Error::ClientTypeMismatch { .. }
            | Error::KindDisabled { .. } => ErrorKind::Registry,
            Error::Io(_) | Error::FileRead { .. } | Error::Json(_) | Error::Internal(_) => {
                ErrorKind::Other
            }
        }
    }

    /// The phase that failed, when this is a reset failure
    pub fn reset_phase(&self) -> Option<ResetPhase> {
        match self {
            Error::Reset { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The wrapped cause of a destroy or reset failure
    pub fn inner(&self) -> Option<&Error> {
        match self {
            Error::Destroy { source } | Error::Reset { source, .. } => Some(source),
            _ => None,
        }
    }
}
