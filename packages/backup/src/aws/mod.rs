//! AWS adapters
//!
//! Contains SDK configuration loading and the Parameter Store and S3
//! implementations of the service traits.

pub mod client;
pub mod s3;
pub mod ssm;

pub use client::load_sdk_config;
pub use s3::S3ObjectStore;
pub use ssm::SsmParameterSource;
