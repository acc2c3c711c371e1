//! Concrete service clients
//!
//! Thin wrappers over the vendor crates. Each module provides a [`Service`]
//! implementation (the connect/cleanup hooks), a `*Client` alias for the
//! managed client built on it, and the domain operations test steps call.
//!
//! [`Service`]: super::Service

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "cloudwatch")]
pub mod cloudwatch;
#[cfg(feature = "kafka")]
pub mod kafka;
#[cfg(feature = "kinesis")]
pub mod kinesis;
#[cfg(feature = "mqtt")]
pub mod mqtt;
#[cfg(feature = "rest")]
pub mod rest;
#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "sqs")]
pub mod sqs;
#[cfg(feature = "ssm")]
pub mod ssm;

#[cfg(feature = "cloudwatch")]
pub use cloudwatch::CloudWatchClient;
#[cfg(feature = "kafka")]
pub use kafka::KafkaClient;
#[cfg(feature = "kinesis")]
pub use kinesis::KinesisClient;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttClient;
#[cfg(feature = "rest")]
pub use rest::RestClient;
#[cfg(feature = "s3")]
pub use s3::S3Client;
#[cfg(feature = "sqs")]
pub use sqs::SqsClient;
#[cfg(feature = "ssm")]
pub use ssm::SsmClient;
