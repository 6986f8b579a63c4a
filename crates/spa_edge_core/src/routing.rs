//! Edge route rules and the policies attached to them.

use serde::{Deserialize, Serialize};

use crate::contract::HeaderMap;

pub const DEFAULT_PATH_PATTERN: &str = "*";

/// CloudFront-style path pattern: `*` matches any run of characters, `?`
/// exactly one. A leading `/` on either side is ignored and matching is case
/// sensitive, so `api/*` matches `/api/users` but not `/api` or `/API/x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathPattern(String);

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Pattern covering every path below `prefix`, e.g. `api` -> `api/*`.
    pub fn prefix(prefix: &str) -> Self {
        Self(format!("{}/*", prefix.trim_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_catch_all(&self) -> bool {
        self.0.trim_start_matches('/') == DEFAULT_PATH_PATTERN
    }

    pub fn matches(&self, path: &str) -> bool {
        glob_match(
            self.0.trim_start_matches('/').as_bytes(),
            path.trim_start_matches('/').as_bytes(),
        )
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedMethods {
    GetHead,
    All,
}

impl AllowedMethods {
    pub fn methods(self) -> &'static [&'static str] {
        match self {
            Self::GetHead => &["GET", "HEAD"],
            Self::All => &["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
        }
    }

    pub fn allows(self, method: &str) -> bool {
        self.methods()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerProtocolPolicy {
    RedirectToHttps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerAction {
    Forward,
    /// Permanent redirect to the given secure location.
    Redirect(String),
}

impl ViewerProtocolPolicy {
    pub fn evaluate(self, scheme: Scheme, host: &str, path_and_query: &str) -> ViewerAction {
        match (self, scheme) {
            (Self::RedirectToHttps, Scheme::Https) => ViewerAction::Forward,
            (Self::RedirectToHttps, Scheme::Http) => {
                ViewerAction::Redirect(format!("https://{host}{path_and_query}"))
            }
        }
    }
}

/// Edge cache lifetimes and cache-key shape, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub name: String,
    pub min_ttl_secs: u64,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub enable_accept_encoding_gzip: bool,
    pub enable_accept_encoding_brotli: bool,
    /// Viewer headers, cookies and query strings never enter the cache key
    /// for the managed policies modelled here.
    pub key_includes_viewer_attributes: bool,
}

impl CachePolicy {
    pub fn caching_optimized() -> Self {
        Self {
            name: "Managed-CachingOptimized".to_string(),
            min_ttl_secs: 1,
            default_ttl_secs: 86_400,
            max_ttl_secs: 31_536_000,
            enable_accept_encoding_gzip: true,
            enable_accept_encoding_brotli: true,
            key_includes_viewer_attributes: false,
        }
    }

    pub fn caching_disabled() -> Self {
        Self {
            name: "Managed-CachingDisabled".to_string(),
            min_ttl_secs: 0,
            default_ttl_secs: 0,
            max_ttl_secs: 0,
            enable_accept_encoding_gzip: false,
            enable_accept_encoding_brotli: false,
            key_includes_viewer_attributes: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_ttl_secs == 0
    }
}

/// Which viewer request attributes the edge passes to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginRequestPolicy {
    /// Only what the cache key carries, which for the static route is nothing.
    CacheKeyOnly,
    AllViewerExceptHostHeader,
}

impl OriginRequestPolicy {
    /// Headers sent to the origin. `origin_host` replaces the viewer's host
    /// whenever the viewer host is withheld.
    pub fn origin_headers(self, viewer: &HeaderMap, origin_host: &str) -> HeaderMap {
        let mut headers = match self {
            Self::CacheKeyOnly => HeaderMap::new(),
            Self::AllViewerExceptHostHeader => viewer
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("host"))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        };
        headers.insert("Host".to_string(), origin_host.to_string());
        headers
    }

    pub fn forwards_query_and_cookies(self) -> bool {
        matches!(self, Self::AllViewerExceptHostHeader)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginProtocolPolicy {
    HttpsOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginTarget {
    StaticStore {
        bucket_name: String,
        origin_access_identity: String,
    },
    DynamicGateway {
        domain_name: String,
        protocol: OriginProtocolPolicy,
    },
}

impl OriginTarget {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::DynamicGateway { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub path_pattern: PathPattern,
    pub target: OriginTarget,
    pub cache_policy: CachePolicy,
    pub origin_request_policy: OriginRequestPolicy,
    pub allowed_methods: AllowedMethods,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}

impl RouteRule {
    /// Catch-all rule serving the static asset tree with aggressive caching.
    pub fn static_default(
        bucket_name: impl Into<String>,
        origin_access_identity: impl Into<String>,
    ) -> Self {
        Self {
            path_pattern: PathPattern::new(DEFAULT_PATH_PATTERN),
            target: OriginTarget::StaticStore {
                bucket_name: bucket_name.into(),
                origin_access_identity: origin_access_identity.into(),
            },
            cache_policy: CachePolicy::caching_optimized(),
            origin_request_policy: OriginRequestPolicy::CacheKeyOnly,
            allowed_methods: AllowedMethods::GetHead,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
        }
    }

    /// Prefix rule proxying everything below `prefix` to the gateway host
    /// with caching disabled.
    pub fn dynamic_prefix(prefix: &str, gateway_host: impl Into<String>) -> Self {
        Self {
            path_pattern: PathPattern::prefix(prefix),
            target: OriginTarget::DynamicGateway {
                domain_name: gateway_host.into(),
                protocol: OriginProtocolPolicy::HttpsOnly,
            },
            cache_policy: CachePolicy::caching_disabled(),
            origin_request_policy: OriginRequestPolicy::AllViewerExceptHostHeader,
            allowed_methods: AllowedMethods::All,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.target.is_dynamic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_matches_nested_paths_only() {
        let pattern = PathPattern::prefix("/api/");
        assert_eq!(pattern.as_str(), "api/*");
        assert!(pattern.matches("/api/users"));
        assert!(pattern.matches("/api/users/42/orders"));
        assert!(pattern.matches("/api/"));
        assert!(!pattern.matches("/api"));
        assert!(!pattern.matches("/apis/users"));
        assert!(!pattern.matches("/API/users"));
        assert!(!pattern.matches("/static/api/users"));
    }

    #[test]
    fn catch_all_matches_everything() {
        let pattern = PathPattern::new("*");
        assert!(pattern.is_catch_all());
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/assets/main.js"));
    }

    #[test]
    fn glob_handles_single_character_and_inner_wildcards() {
        let pattern = PathPattern::new("/img/*.png");
        assert!(pattern.matches("/img/logo.png"));
        assert!(pattern.matches("/img/a/b.png"));
        assert!(!pattern.matches("/img/logo.jpg"));

        let single = PathPattern::new("v?/status");
        assert!(single.matches("/v1/status"));
        assert!(!single.matches("/v10/status"));
    }

    #[test]
    fn redirect_policy_upgrades_plain_http() {
        let policy = ViewerProtocolPolicy::RedirectToHttps;
        assert_eq!(
            policy.evaluate(Scheme::Http, "d111.cloudfront.net", "/app?x=1"),
            ViewerAction::Redirect("https://d111.cloudfront.net/app?x=1".to_string())
        );
        assert_eq!(
            policy.evaluate(Scheme::Https, "d111.cloudfront.net", "/app"),
            ViewerAction::Forward
        );
    }

    #[test]
    fn allowed_method_sets() {
        assert!(AllowedMethods::GetHead.allows("get"));
        assert!(!AllowedMethods::GetHead.allows("POST"));
        assert!(!AllowedMethods::GetHead.allows("OPTIONS"));
        for method in ["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"] {
            assert!(AllowedMethods::All.allows(method));
        }
    }

    #[test]
    fn all_viewer_except_host_swaps_in_origin_host() {
        let viewer = HeaderMap::from([
            ("host".to_string(), "app.example.com".to_string()),
            ("Cookie".to_string(), "session=1".to_string()),
            ("X-Trace".to_string(), "t-1".to_string()),
        ]);

        let forwarded = OriginRequestPolicy::AllViewerExceptHostHeader
            .origin_headers(&viewer, "abc123.execute-api.us-east-1.amazonaws.com");

        assert_eq!(forwarded.get("Cookie").map(String::as_str), Some("session=1"));
        assert_eq!(forwarded.get("X-Trace").map(String::as_str), Some("t-1"));
        assert!(!forwarded.contains_key("host"));
        assert_eq!(
            forwarded.get("Host").map(String::as_str),
            Some("abc123.execute-api.us-east-1.amazonaws.com")
        );
    }

    #[test]
    fn cache_key_only_forwards_no_viewer_headers() {
        let viewer = HeaderMap::from([("Cookie".to_string(), "session=1".to_string())]);
        let forwarded = OriginRequestPolicy::CacheKeyOnly.origin_headers(&viewer, "bucket.s3");
        assert_eq!(forwarded.len(), 1);
        assert!(!OriginRequestPolicy::CacheKeyOnly.forwards_query_and_cookies());
    }

    #[test]
    fn managed_cache_policies() {
        assert!(CachePolicy::caching_disabled().is_disabled());
        let optimized = CachePolicy::caching_optimized();
        assert!(!optimized.is_disabled());
        assert_eq!(optimized.default_ttl_secs, 86_400);
        assert!(!optimized.key_includes_viewer_attributes);
    }
}
