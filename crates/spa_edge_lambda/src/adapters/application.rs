use std::future::Future;

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{Method, Request, Response};
use spa_edge_core::contract::{
    HeaderMap, InvocationContext, MultiValueMap, ProxyEvent, ProxyResponse,
};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use url::{Position, Url};

use crate::error::{ApplicationError, BootstrapError};

pub type InvokeResult = Result<ProxyResponse, ApplicationError>;

/// Optional signal fired once the application has produced its result.
pub type Completion = Box<dyn FnOnce(&InvokeResult) + Send>;

/// Request/response capability of a bootstrapped application. The entry point
/// never looks past this seam.
#[async_trait]
pub trait Application: Send + Sync {
    async fn invoke(&self, event: ProxyEvent, context: InvocationContext) -> InvokeResult;
}

#[async_trait]
pub trait Bootstrapper: Send + Sync {
    type Handle: Application + 'static;

    async fn bootstrap(&self) -> Result<Self::Handle, BootstrapError>;
}

pub async fn invoke_with_completion<A>(
    application: &A,
    event: ProxyEvent,
    context: InvocationContext,
    completion: Option<Completion>,
) -> InvokeResult
where
    A: Application + ?Sized,
{
    let result = application.invoke(event, context).await;
    if let Some(completion) = completion {
        completion(&result);
    }
    result
}

/// Bootstraps an `axum` router built by `build` and wraps it for proxy events.
pub struct RouterBootstrapper<F> {
    build: F,
}

impl<F, Fut> RouterBootstrapper<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Router, BootstrapError>> + Send + 'static,
{
    pub fn new(build: F) -> Self {
        Self { build }
    }
}

#[async_trait]
impl<F, Fut> Bootstrapper for RouterBootstrapper<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Router, BootstrapError>> + Send + 'static,
{
    type Handle = RouterApplication;

    async fn bootstrap(&self) -> Result<RouterApplication, BootstrapError> {
        let router = (self.build)().await?;
        Ok(RouterApplication::new(router))
    }
}

/// A router behind permissive CORS: any origin is mirrored back and
/// credentials are allowed.
#[derive(Clone)]
pub struct RouterApplication {
    router: Router,
}

impl RouterApplication {
    pub fn new(router: Router) -> Self {
        Self {
            router: router.layer(CorsLayer::very_permissive()),
        }
    }
}

#[async_trait]
impl Application for RouterApplication {
    async fn invoke(&self, event: ProxyEvent, context: InvocationContext) -> InvokeResult {
        let request = into_http_request(event, context)?;
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        into_proxy_response(response).await
    }
}

fn into_http_request(
    event: ProxyEvent,
    context: InvocationContext,
) -> Result<Request<Body>, ApplicationError> {
    let method = Method::from_bytes(event.http_method.as_bytes()).map_err(|error| {
        ApplicationError::InvalidEvent(format!("method {:?}: {error}", event.http_method))
    })?;
    let uri = path_and_query(&event)?;

    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in event.header_entries() {
        builder = builder.header(name, value);
    }

    let body = match event.body {
        None => Vec::new(),
        Some(text) if event.is_base64_encoded => STANDARD
            .decode(text)
            .map_err(|error| ApplicationError::InvalidEvent(format!("base64 body: {error}")))?,
        Some(text) => text.into_bytes(),
    };

    let mut request = builder
        .body(Body::from(body))
        .map_err(|error| ApplicationError::InvalidEvent(error.to_string()))?;
    request.extensions_mut().insert(context);
    Ok(request)
}

fn path_and_query(event: &ProxyEvent) -> Result<String, ApplicationError> {
    let mut url = Url::parse("http://localhost")
        .map_err(|error| ApplicationError::InvalidEvent(error.to_string()))?;
    url.set_path(&event.path);
    let query = event.query_entries();
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url[Position::BeforePath..].to_string())
}

async fn into_proxy_response(response: Response<Body>) -> InvokeResult {
    let (parts, body) = response.into_parts();

    let mut headers = HeaderMap::new();
    let mut multi_value_headers = MultiValueMap::new();
    for name in parts.headers.keys() {
        let mut values: Vec<String> = parts
            .headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        if values.len() == 1 {
            headers.insert(name.as_str().to_string(), values.remove(0));
        } else {
            multi_value_headers.insert(name.as_str().to_string(), values);
        }
    }

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|error| ApplicationError::Body(error.to_string()))?;
    let (body, is_base64_encoded) = match std::str::from_utf8(&bytes) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (STANDARD.encode(&bytes), true),
    };

    Ok(ProxyResponse {
        status_code: parts.status.as_u16(),
        headers,
        multi_value_headers,
        body,
        is_base64_encoded,
    })
}
