use serde::{Deserialize, Serialize};

use crate::topology::TopologyError;

pub const ALL_PATHS: &str = "/*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
    pub paths: Vec<String>,
    /// Unique per request; the CDN rejects a reused reference with different paths.
    pub caller_reference: String,
}

impl InvalidationRequest {
    pub fn new(
        paths: Vec<String>,
        caller_reference: impl Into<String>,
    ) -> Result<Self, TopologyError> {
        if paths.is_empty() {
            return Err(TopologyError::InvalidInvalidation(
                "at least one path is required",
            ));
        }
        if paths.iter().any(|path| !path.starts_with('/')) {
            return Err(TopologyError::InvalidInvalidation(
                "invalidation paths must start with '/'",
            ));
        }
        let caller_reference = caller_reference.into();
        if caller_reference.trim().is_empty() {
            return Err(TopologyError::InvalidInvalidation(
                "caller_reference cannot be empty",
            ));
        }

        Ok(Self {
            paths,
            caller_reference,
        })
    }

    pub fn all_paths(caller_reference: impl Into<String>) -> Result<Self, TopologyError> {
        Self::new(vec![ALL_PATHS.to_string()], caller_reference)
    }

    pub fn covers_everything(&self) -> bool {
        self.paths.iter().any(|path| path == ALL_PATHS)
    }
}
