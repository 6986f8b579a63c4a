use std::path::PathBuf;

use spa_edge_core::topology::TopologyError;
use thiserror::Error;

/// Application construction or its async initialization failed.
#[derive(Debug, Error)]
#[error("application bootstrap failed: {message}")]
pub struct BootstrapError {
    pub message: String,
}

impl BootstrapError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("event cannot be translated into a request: {0}")]
    InvalidEvent(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Reasons an invocation fails at the compute entry point.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("malformed proxy event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("build tree {0} does not exist or is not a directory")]
    MissingBuildTree(PathBuf),
    #[error("build tree {0} contains no files")]
    EmptyBuildTree(PathBuf),
    #[error("failed to walk build tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
    #[error("failed to list static origin objects: {0}")]
    List(String),
    #[error("failed to prune {key}: {message}")]
    Prune { key: String, message: String },
    #[error("failed to invalidate edge cache: {0}")]
    Invalidation(String),
}

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("static origin read failed for {key}: {message}")]
    Origin { key: String, message: String },
}
