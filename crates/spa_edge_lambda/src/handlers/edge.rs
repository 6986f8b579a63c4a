//! In-process execution of the edge distribution's routing rules.
//!
//! Requests are classified by the distribution's route table and sent either
//! to the static origin store or through the dynamic gateway to the compute
//! entry point, with SPA fallback applied to static origin errors.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use spa_edge_core::contract::{
    header_value, HeaderMap, InvocationContext, MultiValueMap, ProxyEvent,
};
use spa_edge_core::distribution::{Distribution, RouteClass};
use spa_edge_core::origin_store::key_for_request_path;
use spa_edge_core::routing::{OriginTarget, RouteRule, Scheme, ViewerAction};
use url::form_urlencoded;

use crate::adapters::application::Bootstrapper;
use crate::adapters::object_store::{AssetStore, StoredObject};
use crate::error::EdgeError;
use crate::handlers::entry::ComputeEntryPoint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerRequest {
    pub request_id: String,
    pub scheme: Scheme,
    pub method: String,
    pub path: String,
    /// Query pairs in viewer order; a name may repeat.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl ViewerRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: "edge-request".to_string(),
            scheme: Scheme::Https,
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{}?{query}", self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub multi_value_headers: MultiValueMap,
    pub body: Vec<u8>,
    /// How long the edge keeps this response.
    pub cache_ttl_secs: u64,
    pub route: RouteClass,
    pub served_fallback: bool,
}

impl EdgeResponse {
    fn bare(status: u16, route: RouteClass) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            multi_value_headers: MultiValueMap::new(),
            body: Vec::new(),
            cache_ttl_secs: 0,
            route,
            served_fallback: false,
        }
    }

    fn bad_gateway() -> Self {
        let mut response = Self::bare(502, RouteClass::Dynamic);
        response
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        response.body = br#"{"message":"Internal server error"}"#.to_vec();
        response
    }

    /// Headers of a GET answer without its payload.
    fn without_body(mut self) -> Self {
        self.headers
            .insert("Content-Length".to_string(), self.body.len().to_string());
        self.body.clear();
        self
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct EdgeDistribution<'a, S, B: Bootstrapper> {
    distribution: &'a Distribution,
    store: &'a S,
    gateway: &'a ComputeEntryPoint<B>,
}

impl<'a, S, B> EdgeDistribution<'a, S, B>
where
    S: AssetStore,
    B: Bootstrapper,
{
    pub fn new(
        distribution: &'a Distribution,
        store: &'a S,
        gateway: &'a ComputeEntryPoint<B>,
    ) -> Self {
        Self {
            distribution,
            store,
            gateway,
        }
    }

    pub async fn serve(&self, request: ViewerRequest) -> Result<EdgeResponse, EdgeError> {
        let rule = self.distribution.select_route(&request.path);
        let route = self.distribution.classify(&request.path);

        let host = header_value(&request.headers, "host")
            .unwrap_or(&self.distribution.domain_name)
            .to_string();
        match rule
            .viewer_protocol_policy
            .evaluate(request.scheme, &host, &request.path_and_query())
        {
            ViewerAction::Forward => {}
            ViewerAction::Redirect(location) => {
                let mut response = EdgeResponse::bare(301, route);
                response.headers.insert("Location".to_string(), location);
                return Ok(response);
            }
        }

        if !rule.allowed_methods.allows(&request.method) {
            tracing::debug!(
                component = "edge",
                event = "method_not_allowed",
                method = %request.method,
                path = %request.path
            );
            return Ok(EdgeResponse::bare(403, route));
        }

        match &rule.target {
            OriginTarget::StaticStore { .. } => {
                let response = self.serve_static(rule, &request)?;
                if request.method.eq_ignore_ascii_case("HEAD") {
                    Ok(response.without_body())
                } else {
                    Ok(response)
                }
            }
            OriginTarget::DynamicGateway { domain_name, .. } => {
                Ok(self.serve_dynamic(rule, domain_name, request).await)
            }
        }
    }

    fn serve_static(
        &self,
        rule: &RouteRule,
        request: &ViewerRequest,
    ) -> Result<EdgeResponse, EdgeError> {
        let key = key_for_request_path(&request.path, &self.distribution.default_root_object);
        if let Some(object) = self.fetch(&key)? {
            let mut response = EdgeResponse::bare(200, RouteClass::Static);
            response
                .headers
                .insert("Content-Type".to_string(), object.content_type);
            response.body = object.body;
            response.cache_ttl_secs = rule.cache_policy.default_ttl_secs;
            return Ok(response);
        }

        let origin_status = 404;
        let Some(fallback) = self.distribution.fallback_for(rule, origin_status) else {
            return Ok(EdgeResponse::bare(origin_status, RouteClass::Static));
        };
        let page_key = key_for_request_path(
            &fallback.response_page_path,
            &self.distribution.default_root_object,
        );
        let Some(page) = self.fetch(&page_key)? else {
            tracing::warn!(
                component = "edge",
                event = "fallback_page_missing",
                key = %page_key
            );
            return Ok(EdgeResponse::bare(origin_status, RouteClass::Static));
        };

        let substitute = self
            .distribution
            .error_responses
            .substitute(origin_status, page.body, Some(page.content_type));
        Ok(match substitute {
            Some(substitute) => {
                let mut response = EdgeResponse::bare(substitute.status, RouteClass::Static);
                if let Some(content_type) = substitute.content_type {
                    response
                        .headers
                        .insert("Content-Type".to_string(), content_type);
                }
                response.body = substitute.body;
                response.cache_ttl_secs = substitute.cache_ttl_secs;
                response.served_fallback = true;
                response
            }
            None => EdgeResponse::bare(origin_status, RouteClass::Static),
        })
    }

    async fn serve_dynamic(
        &self,
        rule: &RouteRule,
        gateway_host: &str,
        request: ViewerRequest,
    ) -> EdgeResponse {
        let policy = rule.origin_request_policy;
        let headers = policy.origin_headers(&request.headers, gateway_host);
        let multi_value_headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), vec![value.clone()]))
            .collect();
        let mut query_string_parameters = BTreeMap::new();
        let mut multi_value_query_string_parameters = MultiValueMap::new();
        if policy.forwards_query_and_cookies() {
            for (name, value) in request.query {
                multi_value_query_string_parameters
                    .entry(name.clone())
                    .or_insert_with(Vec::new)
                    .push(value.clone());
                query_string_parameters.insert(name, value);
            }
        }
        let event = ProxyEvent {
            http_method: request.method,
            path: request.path,
            headers,
            query_string_parameters,
            multi_value_headers,
            multi_value_query_string_parameters,
            body: request.body,
            is_base64_encoded: false,
            request_context: None,
        };

        // The gateway answers failed invocations with its own 502.
        let proxied = match self
            .gateway
            .handle(event, InvocationContext::new(request.request_id), None)
            .await
        {
            Ok(proxied) => proxied,
            Err(error) => {
                tracing::error!(
                    component = "edge",
                    event = "invocation_failed",
                    error = %error
                );
                return EdgeResponse::bad_gateway();
            }
        };

        let body = if proxied.is_base64_encoded {
            match STANDARD.decode(&proxied.body) {
                Ok(body) => body,
                Err(error) => {
                    tracing::error!(
                        component = "edge",
                        event = "malformed_response_body",
                        error = %error
                    );
                    return EdgeResponse::bad_gateway();
                }
            }
        } else {
            proxied.body.into_bytes()
        };
        EdgeResponse {
            status: proxied.status_code,
            headers: proxied.headers,
            multi_value_headers: proxied.multi_value_headers,
            body,
            cache_ttl_secs: rule.cache_policy.default_ttl_secs,
            route: RouteClass::Dynamic,
            served_fallback: false,
        }
    }

    fn fetch(&self, key: &str) -> Result<Option<StoredObject>, EdgeError> {
        self.store.get_object(key).map_err(|message| EdgeError::Origin {
            key: key.to_string(),
            message,
        })
    }
}
