use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const ENTRY_DOCUMENT: &str = "index.html";

pub type HeaderMap = BTreeMap<String, String>;

/// Repeated headers or query keys, every value kept in arrival order.
pub type MultiValueMap = BTreeMap<String, Vec<String>>;

/// Gateway proxy event delivered to the compute entry point.
///
/// Mirrors the REST proxy integration shape. The single-value maps keep only
/// the last value of a repeated name; the multi-value maps keep all of them.
/// Any of the four may arrive as `null`, which decodes to an empty map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    pub http_method: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HeaderMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_string_parameters: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub multi_value_headers: MultiValueMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub multi_value_query_string_parameters: MultiValueMap,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<Value>,
}

impl ProxyEvent {
    pub fn new(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .insert(name.into(), value.into());
        self
    }

    /// Adds `value` under `name` in both query maps, keeping earlier values.
    pub fn with_repeated_query(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let (name, value) = (name.into(), value.into());
        self.multi_value_query_string_parameters
            .entry(name.clone())
            .or_default()
            .push(value.clone());
        self.query_string_parameters.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Every header name/value pair, repeated names included.
    pub fn header_entries(&self) -> Vec<(&str, &str)> {
        merged_entries(&self.headers, &self.multi_value_headers)
    }

    /// Every query name/value pair, repeated names included.
    pub fn query_entries(&self) -> Vec<(&str, &str)> {
        merged_entries(
            &self.query_string_parameters,
            &self.multi_value_query_string_parameters,
        )
    }
}

/// HTTP-shaped response returned by the compute entry point.
///
/// A header sent once lives in `headers`; a header sent more than once lives
/// only in `multi_value_headers` so values such as `Set-Cookie` stay apart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub multi_value_headers: MultiValueMap,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// First value of `name`, looking at repeated headers when needed.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name).or_else(|| {
            self.header_values(name).into_iter().next()
        })
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        merged_entries(&self.headers, &self.multi_value_headers)
            .into_iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
            .collect()
    }
}

/// Per-invocation metadata handed over by the compute platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
    pub invoked_function_arn: String,
    /// Epoch milliseconds after which the platform aborts the invocation.
    pub deadline_ms: u64,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Multi-value entries first, then single-value names the multi-value map
/// does not carry.
fn merged_entries<'a>(
    single: &'a BTreeMap<String, String>,
    multi: &'a MultiValueMap,
) -> Vec<(&'a str, &'a str)> {
    let mut entries: Vec<(&str, &str)> = multi
        .iter()
        .flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_str()))
        })
        .collect();
    entries.extend(
        single
            .iter()
            .filter(|(name, _)| !multi.contains_key(name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );
    entries
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_gateway_event_with_null_maps() {
        let event: ProxyEvent = serde_json::from_value(json!({
            "httpMethod": "POST",
            "path": "/api/orders",
            "headers": null,
            "queryStringParameters": null,
            "multiValueHeaders": null,
            "multiValueQueryStringParameters": null,
            "body": "{\"id\":1}",
            "isBase64Encoded": false,
            "requestContext": {"stage": "prod"}
        }))
        .expect("event should decode");

        assert_eq!(event.http_method, "POST");
        assert!(event.headers.is_empty());
        assert!(event.query_string_parameters.is_empty());
        assert!(event.multi_value_query_string_parameters.is_empty());
        assert_eq!(event.body.as_deref(), Some("{\"id\":1}"));
    }

    #[test]
    fn response_serializes_with_gateway_field_names() {
        let response = ProxyResponse::new(201, "created").with_header("Content-Type", "text/plain");
        let value = serde_json::to_value(&response).expect("response should serialize");

        assert_eq!(value["statusCode"], 201);
        assert_eq!(value["headers"]["Content-Type"], "text/plain");
        assert_eq!(value["isBase64Encoded"], false);
    }

    #[test]
    fn repeated_query_keys_keep_every_value() {
        let event: ProxyEvent = serde_json::from_value(json!({
            "httpMethod": "GET",
            "path": "/api/items",
            "headers": {"Accept": "text/html"},
            "multiValueHeaders": {"Accept": ["text/html"], "X-Tag": ["a", "b"]},
            "queryStringParameters": {"tag": "b", "page": "2"},
            "multiValueQueryStringParameters": {"tag": ["a", "b"]}
        }))
        .expect("event should decode");

        assert_eq!(
            event.query_entries(),
            vec![("tag", "a"), ("tag", "b"), ("page", "2")]
        );
        assert_eq!(
            event.header_entries(),
            vec![("Accept", "text/html"), ("X-Tag", "a"), ("X-Tag", "b")]
        );
    }

    #[test]
    fn repeated_response_headers_serialize_separately() {
        let mut response = ProxyResponse::new(200, "ok");
        response.multi_value_headers.insert(
            "set-cookie".to_string(),
            vec![
                "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT".to_string(),
                "b=2".to_string(),
            ],
        );
        let value = serde_json::to_value(&response).expect("response should serialize");

        assert_eq!(value["multiValueHeaders"]["set-cookie"][1], "b=2");
        assert!(value["headers"].get("set-cookie").is_none());
        assert_eq!(response.header_values("Set-Cookie").len(), 2);
        assert_eq!(
            response.header("set-cookie"),
            Some("a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT")
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let event = ProxyEvent::new("GET", "/").with_header("X-Request-Id", "abc");
        assert_eq!(event.header("x-request-id"), Some("abc"));
        assert_eq!(event.header("host"), None);
    }
}
