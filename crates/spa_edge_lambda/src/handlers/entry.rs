use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use spa_edge_core::contract::{InvocationContext, ProxyEvent, ProxyResponse};

use crate::adapters::application::{invoke_with_completion, Bootstrapper, Completion};
use crate::adapters::warm_cache::WarmInstanceCache;
use crate::error::InvocationError;

/// Compute entry point for one execution context.
///
/// Holds no request logic: it resolves the application through the warm
/// cache and hands the event, context and completion over untouched.
pub struct ComputeEntryPoint<B: Bootstrapper> {
    bootstrapper: B,
    cache: WarmInstanceCache<B::Handle>,
}

impl<B: Bootstrapper> ComputeEntryPoint<B> {
    pub fn new(bootstrapper: B) -> Self {
        Self {
            bootstrapper,
            cache: WarmInstanceCache::new(),
        }
    }

    pub fn is_warm(&self) -> bool {
        self.cache.is_warm()
    }

    pub async fn application(&self) -> Result<Arc<B::Handle>, InvocationError> {
        let was_warm = self.cache.is_warm();
        let started_at = Instant::now();
        let handle = self
            .cache
            .get_or_create(|| self.bootstrapper.bootstrap())
            .await
            .inspect_err(|error| {
                tracing::error!(
                    component = "entry_point",
                    event = "bootstrap_failed",
                    error = %error
                );
            })?;

        if !was_warm {
            tracing::info!(
                component = "entry_point",
                event = "bootstrapped",
                bootstrap_ms = started_at.elapsed().as_millis() as u64
            );
        }
        Ok(handle)
    }

    pub async fn handle(
        &self,
        event: ProxyEvent,
        context: InvocationContext,
        completion: Option<Completion>,
    ) -> Result<ProxyResponse, InvocationError> {
        let start = if self.is_warm() { "warm" } else { "cold" };
        let application = self.application().await?;
        tracing::info!(
            component = "entry_point",
            event = "invoke",
            start,
            request_id = %context.request_id,
            method = %event.http_method,
            path = %event.path
        );
        let response =
            invoke_with_completion(application.as_ref(), event, context, completion).await?;
        Ok(response)
    }

    /// Raw-JSON variant used by the Lambda runtime loop.
    pub async fn handle_value(
        &self,
        payload: Value,
        context: InvocationContext,
    ) -> Result<Value, InvocationError> {
        let event: ProxyEvent = serde_json::from_value(payload)?;
        let response = self.handle(event, context, None).await?;
        Ok(serde_json::to_value(response)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::adapters::application::{Application, InvokeResult};
    use crate::error::BootstrapError;

    use super::*;

    struct RecordingApplication {
        seen: Mutex<Vec<(ProxyEvent, InvocationContext)>>,
    }

    #[async_trait]
    impl Application for RecordingApplication {
        async fn invoke(&self, event: ProxyEvent, context: InvocationContext) -> InvokeResult {
            let body = format!("{} {}", event.http_method, event.path);
            self.seen
                .lock()
                .expect("poisoned mutex")
                .push((event, context));
            Ok(ProxyResponse::new(200, body))
        }
    }

    struct CountingBootstrapper {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingBootstrapper {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Bootstrapper for CountingBootstrapper {
        type Handle = RecordingApplication;

        async fn bootstrap(&self) -> Result<RecordingApplication, BootstrapError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BootstrapError::new("module graph failed to initialize"));
            }
            Ok(RecordingApplication {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[tokio::test]
    async fn bootstraps_once_per_context() {
        let bootstrapper = CountingBootstrapper::new();
        let calls = Arc::clone(&bootstrapper.calls);
        let entry = ComputeEntryPoint::new(bootstrapper);

        assert!(!entry.is_warm());
        let first = entry.application().await.expect("first invocation");
        let second = entry.application().await.expect("second invocation");

        assert!(entry.is_warm());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn separate_contexts_bootstrap_independently() {
        let context_a = ComputeEntryPoint::new(CountingBootstrapper::new());
        let context_b = ComputeEntryPoint::new(CountingBootstrapper::new());

        context_a
            .handle(
                ProxyEvent::new("GET", "/api/a"),
                InvocationContext::new("a-1"),
                None,
            )
            .await
            .expect("context a should serve");
        assert!(context_a.is_warm());
        assert!(!context_b.is_warm());

        let handle_a = context_a.application().await.expect("context a");
        let handle_b = context_b.application().await.expect("context b");
        assert!(!Arc::ptr_eq(&handle_a, &handle_b));
        assert_eq!(handle_a.seen.lock().expect("poisoned mutex").len(), 1);
        assert!(handle_b.seen.lock().expect("poisoned mutex").is_empty());
    }

    #[tokio::test]
    async fn passes_event_and_context_through_unmodified() {
        let entry = ComputeEntryPoint::new(CountingBootstrapper::new());
        let event = ProxyEvent::new("PATCH", "/api/orders/9")
            .with_header("Cookie", "session=abc")
            .with_query("expand", "items")
            .with_body("{\"qty\":2}");
        let context = InvocationContext {
            request_id: "req-9".to_string(),
            invoked_function_arn: "arn:aws:lambda:us-east-1:123:function:api".to_string(),
            deadline_ms: 1_700_000_000_000,
        };

        let response = entry
            .handle(event.clone(), context.clone(), None)
            .await
            .expect("invocation should succeed");
        assert_eq!(response.body, "PATCH /api/orders/9");

        let application = entry.application().await.expect("warm handle");
        let seen = application.seen.lock().expect("poisoned mutex");
        assert_eq!(seen.as_slice(), &[(event, context)]);
    }

    #[tokio::test]
    async fn bootstrap_failure_fails_the_invocation() {
        let bootstrapper = CountingBootstrapper {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: true,
        };
        let calls = Arc::clone(&bootstrapper.calls);
        let entry = ComputeEntryPoint::new(bootstrapper);

        let error = entry
            .handle(
                ProxyEvent::new("GET", "/api/x"),
                InvocationContext::new("r"),
                None,
            )
            .await
            .expect_err("bootstrap failure should propagate");
        assert!(matches!(error, InvocationError::Bootstrap(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!entry.is_warm());
    }

    #[tokio::test]
    async fn completion_is_forwarded_to_the_application_result() {
        let entry = ComputeEntryPoint::new(CountingBootstrapper::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        entry
            .handle(
                ProxyEvent::new("GET", "/api/x"),
                InvocationContext::new("r"),
                Some(Box::new(move |result: &InvokeResult| {
                    assert!(result.is_ok());
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .await
            .expect("invocation should succeed");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn raw_payloads_round_trip_through_gateway_shape() {
        let entry = ComputeEntryPoint::new(CountingBootstrapper::new());
        let response = entry
            .handle_value(
                json!({"httpMethod": "GET", "path": "/api/health", "headers": null}),
                InvocationContext::new("r"),
            )
            .await
            .expect("invocation should succeed");
        assert_eq!(response["statusCode"], 200);
        assert_eq!(response["body"], "GET /api/health");

        let error = entry
            .handle_value(json!({"path": 5}), InvocationContext::new("r"))
            .await
            .expect_err("malformed event should fail");
        assert!(matches!(error, InvocationError::MalformedEvent(_)));
    }
}
