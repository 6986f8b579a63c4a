use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use spa_edge_core::contract::InvocationContext;
use spa_edge_lambda::adapters::application::RouterBootstrapper;
use spa_edge_lambda::error::BootstrapError;
use spa_edge_lambda::handlers::entry::ComputeEntryPoint;
use spa_edge_lambda::telemetry::init_tracing;

async fn build_router() -> Result<Router, BootstrapError> {
    Ok(Router::new().route("/api/health", get(health)))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn invocation_context(context: &lambda_runtime::Context) -> InvocationContext {
    InvocationContext {
        request_id: context.request_id.clone(),
        invoked_function_arn: context.invoked_function_arn.clone(),
        deadline_ms: context.deadline,
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    // One entry point per process: the warm slot lives as long as the sandbox.
    let entry = Arc::new(ComputeEntryPoint::new(RouterBootstrapper::new(build_router)));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let entry = Arc::clone(&entry);
        async move {
            let context = invocation_context(&event.context);
            entry
                .handle_value(event.payload, context)
                .await
                .map_err(Error::from)
        }
    }))
    .await
}
