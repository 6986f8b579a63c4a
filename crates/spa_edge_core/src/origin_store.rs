//! Static origin store settings and asset key layout.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::topology::TopologyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketEncryption {
    S3Managed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketSettings {
    pub block_public_access: bool,
    pub encryption: BucketEncryption,
    pub versioned: bool,
    /// Only principal granted read access.
    pub reader: Option<String>,
}

impl Default for BucketSettings {
    fn default() -> Self {
        Self {
            block_public_access: true,
            encryption: BucketEncryption::S3Managed,
            versioned: true,
            reader: None,
        }
    }
}

impl BucketSettings {
    pub fn readable_only_by(mut self, origin_access_identity: impl Into<String>) -> Self {
        self.reader = Some(origin_access_identity.into());
        self
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if !self.block_public_access {
            return Err(TopologyError::InvalidBucket(
                "static origin must block all public access",
            ));
        }
        if !self.versioned {
            return Err(TopologyError::InvalidBucket(
                "static origin must be versioned",
            ));
        }
        Ok(())
    }

    /// The bucket must grant read to exactly the identity the distribution
    /// fetches with.
    pub fn ensure_readable_by(&self, origin_access_identity: &str) -> Result<(), TopologyError> {
        match self.reader.as_deref() {
            None => Err(TopologyError::InvalidBucket(
                "static origin has no reader; grant the distribution's origin access identity",
            )),
            Some(reader) if reader.trim().is_empty() || reader != origin_access_identity => {
                Err(TopologyError::InvalidBucket(
                    "static origin reader does not match the distribution's origin access identity",
                ))
            }
            Some(_) => Ok(()),
        }
    }
}

/// Object key for a file at `relative` inside the build tree. Keys always use
/// `/` separators and never start with one.
pub fn asset_key(relative: &Path) -> Result<String, TopologyError> {
    let invalid = || TopologyError::InvalidAssetPath(relative.display().to_string());

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str().ok_or_else(invalid)?),
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments.join("/"))
}

/// Object key the static origin reads for a viewer path. The root resolves to
/// `default_root_object`.
pub fn key_for_request_path(path: &str, default_root_object: &str) -> String {
    let trimmed = path.split('?').next().unwrap_or_default().trim_start_matches('/');
    if trimmed.is_empty() {
        default_root_object.to_string()
    } else {
        trimmed.to_string()
    }
}
