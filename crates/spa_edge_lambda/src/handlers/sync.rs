use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use spa_edge_core::invalidation::InvalidationRequest;
use spa_edge_core::origin_store::asset_key;
use walkdir::WalkDir;

use crate::adapters::invalidation::EdgeInvalidator;
use crate::adapters::object_store::AssetStore;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete store objects that are no longer part of the build tree.
    pub prune: bool,
    pub caller_reference: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prune: true,
            caller_reference: default_caller_reference(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded_keys: Vec<String>,
    pub pruned_keys: Vec<String>,
    pub invalidation_id: String,
    pub invalidation: InvalidationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub key: String,
    pub content_type: String,
}

pub fn default_caller_reference() -> String {
    format!("deploy-{}", Utc::now().timestamp_millis())
}

/// Every regular file under `build_dir` with its object key, sorted by key.
pub fn collect_build_tree(build_dir: &Path) -> Result<Vec<LocalAsset>, SyncError> {
    if !build_dir.is_dir() {
        return Err(SyncError::MissingBuildTree(build_dir.to_path_buf()));
    }

    let mut assets = Vec::new();
    for entry in WalkDir::new(build_dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(build_dir)
            .map_err(|_| SyncError::MissingBuildTree(entry.path().to_path_buf()))?;
        assets.push(LocalAsset {
            path: entry.path().to_path_buf(),
            key: asset_key(relative)?,
            content_type: mime_guess::from_path(entry.path())
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        });
    }

    if assets.is_empty() {
        return Err(SyncError::EmptyBuildTree(build_dir.to_path_buf()));
    }
    assets.sort_by(|left, right| left.key.cmp(&right.key));
    Ok(assets)
}

/// Publishes the build tree to the static origin and invalidates `/*` at the
/// edge. Runs once per deployment; any failure stops the sync and is returned
/// to the operator without rollback.
pub fn sync_build_tree(
    build_dir: &Path,
    store: &impl AssetStore,
    invalidator: &impl EdgeInvalidator,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let started_at = Instant::now();
    let invalidation = InvalidationRequest::all_paths(options.caller_reference.clone())?;
    let assets = collect_build_tree(build_dir)?;
    tracing::info!(
        component = "deploy_sync",
        event = "sync_started",
        build_dir = %build_dir.display(),
        files = assets.len()
    );

    let mut uploaded_keys = Vec::with_capacity(assets.len());
    for asset in &assets {
        let body = fs::read(&asset.path).map_err(|source| SyncError::Read {
            path: asset.path.clone(),
            source,
        })?;
        store
            .put_object(&asset.key, &body, &asset.content_type)
            .map_err(|message| SyncError::Upload {
                key: asset.key.clone(),
                message,
            })?;
        uploaded_keys.push(asset.key.clone());
    }

    let pruned_keys = if options.prune {
        prune_stale_keys(store, &uploaded_keys)?
    } else {
        Vec::new()
    };

    let invalidation_id = invalidator
        .create_invalidation(&invalidation)
        .map_err(SyncError::Invalidation)?;

    tracing::info!(
        component = "deploy_sync",
        event = "sync_completed",
        uploaded = uploaded_keys.len(),
        pruned = pruned_keys.len(),
        invalidation_id = %invalidation_id,
        duration_ms = started_at.elapsed().as_millis() as u64
    );

    Ok(SyncReport {
        uploaded_keys,
        pruned_keys,
        invalidation_id,
        invalidation,
    })
}

fn prune_stale_keys(
    store: &impl AssetStore,
    uploaded_keys: &[String],
) -> Result<Vec<String>, SyncError> {
    let keep: BTreeSet<&str> = uploaded_keys.iter().map(String::as_str).collect();
    let mut pruned = Vec::new();
    for key in store.list_keys().map_err(SyncError::List)? {
        if keep.contains(key.as_str()) {
            continue;
        }
        store
            .delete_object(&key)
            .map_err(|message| SyncError::Prune {
                key: key.clone(),
                message,
            })?;
        pruned.push(key);
    }
    Ok(pruned)
}
