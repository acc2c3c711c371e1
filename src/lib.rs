//! Smoke-testing harness
//!
//! Scenario steps reach REST APIs, MQTT brokers, Kafka and AWS services
//! through clients that all share one lifecycle: lazily initialized, reset
//! between scenarios, destroyed at teardown.

pub mod cli;
pub mod client;
pub mod commands;
pub mod common;

// Re-export commonly used types for tests
pub use client::{
    ClientConfig, ClientDefinition, ClientDescriptor, ClientKind, ClientRegistry, LifecycleState,
    ManagedClient, Service, ServiceClient,
};
pub use common::{Error, ErrorKind, Result};
