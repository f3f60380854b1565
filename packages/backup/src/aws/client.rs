//! AWS client setup and configuration
//!
//! Contains credential handling and region configuration shared by the
//! Parameter Store and S3 clients.

use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load SDK configuration for `region`
///
/// With a profile name, credentials come from the shared profile files;
/// otherwise the default chain is used (environment, container, instance role).
pub async fn load_sdk_config(region: &str, profile: Option<&str>) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    let loader = match profile {
        Some(profile) => {
            let credentials_provider = ProfileFileCredentialsProvider::builder()
                .profile_name(profile)
                .build();
            loader.credentials_provider(credentials_provider)
        }
        None => loader,
    };

    loader.load().await
}
