use std::path::PathBuf;

use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::primitives::ByteStream;
use clap::Parser;
use spa_edge_core::invalidation::InvalidationRequest;
use spa_edge_core::topology::StackConfig;
use spa_edge_lambda::adapters::invalidation::EdgeInvalidator;
use spa_edge_lambda::adapters::object_store::{AssetStore, StoredObject};
use spa_edge_lambda::handlers::sync::{default_caller_reference, sync_build_tree, SyncOptions};
use spa_edge_lambda::telemetry::init_tracing;

#[derive(Parser)]
#[command(
    name = "deploy_sync",
    about = "Publish the static build tree to the origin bucket and invalidate the edge cache"
)]
struct Args {
    /// Static build output; defaults to `static_asset_dir` from the stack config
    #[arg(long, env = "BUILD_DIR")]
    build_dir: Option<PathBuf>,
    /// Static origin bucket name
    #[arg(long, env = "STATIC_BUCKET")]
    bucket: String,
    /// Edge distribution id
    #[arg(long, env = "DISTRIBUTION_ID")]
    distribution_id: String,
    /// Stack config TOML
    #[arg(long, env = "STACK_CONFIG")]
    config: Option<PathBuf>,
    /// Keep objects that are no longer in the build tree
    #[arg(long)]
    no_prune: bool,
}

struct S3AssetStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl AssetStore for S3AssetStore {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), String> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let content_type = content_type.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .content_type(content_type)
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to write object to s3: {error}"))
            })
        })
    }

    fn get_object(&self, key: &str) -> Result<Option<StoredObject>, String> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = match client.get_object().bucket(bucket).key(object_key).send().await
                {
                    Ok(output) => output,
                    Err(error)
                        if error
                            .as_service_error()
                            .is_some_and(|service_error| service_error.is_no_such_key()) =>
                    {
                        return Ok(None);
                    }
                    Err(error) => return Err(format!("failed to read object from s3: {error}")),
                };
                let content_type = output
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|error| format!("failed to read object body from s3: {error}"))?
                    .into_bytes()
                    .to_vec();
                Ok(Some(StoredObject { body, content_type }))
            })
        })
    }

    fn list_keys(&self) -> Result<Vec<String>, String> {
        let bucket = self.bucket.clone();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let mut keys = Vec::new();
                let mut continuation_token: Option<String> = None;
                loop {
                    let output = client
                        .list_objects_v2()
                        .bucket(bucket.clone())
                        .set_continuation_token(continuation_token.take())
                        .send()
                        .await
                        .map_err(|error| format!("failed to list objects in s3: {error}"))?;
                    keys.extend(
                        output
                            .contents()
                            .iter()
                            .filter_map(|object| object.key().map(str::to_string)),
                    );
                    match output.next_continuation_token() {
                        Some(token) if output.is_truncated().unwrap_or(false) => {
                            continuation_token = Some(token.to_string());
                        }
                        _ => break,
                    }
                }
                Ok(keys)
            })
        })
    }

    fn delete_object(&self, key: &str) -> Result<(), String> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .delete_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to delete object from s3: {error}"))
            })
        })
    }
}

struct CloudFrontInvalidator {
    distribution_id: String,
    cloudfront_client: aws_sdk_cloudfront::Client,
}

impl EdgeInvalidator for CloudFrontInvalidator {
    fn create_invalidation(&self, request: &InvalidationRequest) -> Result<String, String> {
        let paths = Paths::builder()
            .quantity(request.paths.len() as i32)
            .set_items(Some(request.paths.clone()))
            .build()
            .map_err(|error| format!("invalid invalidation paths: {error}"))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(request.caller_reference.clone())
            .build()
            .map_err(|error| format!("invalid invalidation batch: {error}"))?;
        let distribution_id = self.distribution_id.clone();
        let client = self.cloudfront_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .create_invalidation()
                    .distribution_id(distribution_id)
                    .invalidation_batch(batch)
                    .send()
                    .await
                    .map_err(|error| format!("failed to create cloudfront invalidation: {error}"))?;
                output
                    .invalidation()
                    .map(|invalidation| invalidation.id().to_string())
                    .ok_or_else(|| "cloudfront returned no invalidation".to_string())
            })
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StackConfig::load(path)?,
        None => StackConfig::default(),
    };
    let build_dir = args
        .build_dir
        .unwrap_or_else(|| config.static_asset_dir.clone());

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3AssetStore {
        bucket: args.bucket,
        s3_client: aws_sdk_s3::Client::new(&aws_config),
    };
    let invalidator = CloudFrontInvalidator {
        distribution_id: args.distribution_id,
        cloudfront_client: aws_sdk_cloudfront::Client::new(&aws_config),
    };
    let options = SyncOptions {
        prune: config.prune_on_sync && !args.no_prune,
        caller_reference: default_caller_reference(),
    };

    let report = sync_build_tree(&build_dir, &store, &invalidator, &options)?;
    tracing::info!(
        component = "deploy_sync",
        event = "published",
        bucket = %store.bucket,
        uploaded = report.uploaded_keys.len(),
        pruned = report.pruned_keys.len(),
        invalidation_id = %report.invalidation_id
    );
    Ok(())
}
