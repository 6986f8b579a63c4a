//! Deployment-time parameters and published outputs of the stack.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::distribution::Distribution;
use crate::gateway::{GatewayConfig, DEFAULT_STAGE_NAME};
use crate::origin_store::BucketSettings;

pub const DEFAULT_MEMORY_MB: u32 = 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DYNAMIC_PREFIX: &str = "api";
pub const MAX_TIMEOUT_SECS: u64 = 900;
pub const MIN_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 10_240;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("invalid gateway url: {0}")]
    InvalidGatewayUrl(String),
    #[error("invalid route: {0}")]
    InvalidRoute(&'static str),
    #[error("invalid asset path: {0}")]
    InvalidAssetPath(String),
    #[error("invalid static origin bucket: {0}")]
    InvalidBucket(&'static str),
    #[error("invalid invalidation request: {0}")]
    InvalidInvalidation(&'static str),
    #[error("invalid stack config: {0}")]
    InvalidConfig(String),
    #[error("failed to read stack config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed stack config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeSettings {
    pub memory_mb: u32,
    pub timeout_secs: u64,
    pub environment: BTreeMap<String, String>,
    /// Zip holding the `bootstrap` binary.
    pub bundle_path: PathBuf,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            memory_mb: DEFAULT_MEMORY_MB,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            environment: BTreeMap::from([("RUST_BACKTRACE".to_string(), "1".to_string())]),
            bundle_path: PathBuf::from("dist/api_lambda.zip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub compute: ComputeSettings,
    pub stage_name: String,
    pub dynamic_prefix: String,
    pub static_asset_dir: PathBuf,
    pub bucket: BucketSettings,
    /// Delete store objects missing from the build tree during sync.
    pub prune_on_sync: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            compute: ComputeSettings::default(),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
            dynamic_prefix: DEFAULT_DYNAMIC_PREFIX.to_string(),
            static_asset_dir: PathBuf::from("web/dist"),
            bucket: BucketSettings::default(),
            prune_on_sync: true,
        }
    }
}

impl StackConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, TopologyError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path).map_err(|source| TopologyError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        let memory = self.compute.memory_mb;
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&memory) {
            return Err(TopologyError::InvalidConfig(format!(
                "memory_mb must be within {MIN_MEMORY_MB}..={MAX_MEMORY_MB}, got {memory}"
            )));
        }
        let timeout = self.compute.timeout_secs;
        if timeout == 0 || timeout > MAX_TIMEOUT_SECS {
            return Err(TopologyError::InvalidConfig(format!(
                "timeout_secs must be within 1..={MAX_TIMEOUT_SECS}, got {timeout}"
            )));
        }
        if self.stage_name.trim().is_empty() {
            return Err(TopologyError::InvalidConfig(
                "stage_name cannot be empty".to_string(),
            ));
        }
        if self.dynamic_prefix.trim_matches('/').is_empty() {
            return Err(TopologyError::InvalidConfig(
                "dynamic_prefix cannot be empty".to_string(),
            ));
        }
        self.bucket.validate()
    }

    /// Edge distribution for this stack. The static origin must be readable
    /// by `origin_access_identity` and nobody else.
    pub fn distribution(
        &self,
        domain_name: &str,
        bucket_name: &str,
        origin_access_identity: &str,
        gateway: &GatewayConfig,
    ) -> Result<Distribution, TopologyError> {
        self.validate()?;
        self.bucket.ensure_readable_by(origin_access_identity)?;
        Distribution::spa_with_api(
            domain_name,
            bucket_name,
            origin_access_identity,
            &self.dynamic_prefix,
            &gateway.url(),
        )
    }

    pub fn gateway(&self, rest_api_id: &str, region: &str) -> GatewayConfig {
        GatewayConfig {
            stage_name: self.stage_name.clone(),
            ..GatewayConfig::new(rest_api_id, region)
        }
    }
}

/// Values published once the stack is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutputs {
    pub distribution_url: String,
    pub api_url: String,
}

impl StackOutputs {
    pub fn new(distribution: &Distribution, gateway: &GatewayConfig) -> Self {
        Self {
            distribution_url: distribution.url(),
            api_url: gateway.url(),
        }
    }
}
