//! Edge distribution: ordered route rules plus SPA fallback mappings.

use serde::{Deserialize, Serialize};

use crate::contract::ENTRY_DOCUMENT;
use crate::fallback::{ErrorResponses, FallbackRule};
use crate::gateway::gateway_host;
use crate::routing::RouteRule;
use crate::topology::TopologyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub domain_name: String,
    pub default_root_object: String,
    pub default_behavior: RouteRule,
    /// Evaluated in order before the default behavior; first match wins.
    pub additional_behaviors: Vec<RouteRule>,
    pub error_responses: ErrorResponses,
}

impl Distribution {
    /// The fixed two-route topology: static default plus one dynamic prefix
    /// proxied to the gateway behind `gateway_url`.
    pub fn spa_with_api(
        domain_name: impl Into<String>,
        bucket_name: &str,
        origin_access_identity: &str,
        dynamic_prefix: &str,
        gateway_url: &str,
    ) -> Result<Self, TopologyError> {
        if dynamic_prefix.trim_matches('/').is_empty() {
            return Err(TopologyError::InvalidRoute(
                "dynamic prefix cannot be empty",
            ));
        }
        let host = gateway_host(gateway_url)?;

        Ok(Self {
            domain_name: domain_name.into(),
            default_root_object: ENTRY_DOCUMENT.to_string(),
            default_behavior: RouteRule::static_default(bucket_name, origin_access_identity),
            additional_behaviors: vec![RouteRule::dynamic_prefix(dynamic_prefix, host)],
            error_responses: ErrorResponses::spa_entry_document(),
        })
    }

    pub fn select_route(&self, path: &str) -> &RouteRule {
        self.additional_behaviors
            .iter()
            .find(|rule| rule.path_pattern.matches(path))
            .unwrap_or(&self.default_behavior)
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.select_route(path).is_dynamic() {
            RouteClass::Dynamic
        } else {
            RouteClass::Static
        }
    }

    /// Fallback to apply when the origin behind `rule` answers with
    /// `origin_status`. Dynamic origins always pass through untouched.
    pub fn fallback_for(&self, rule: &RouteRule, origin_status: u16) -> Option<&FallbackRule> {
        if rule.is_dynamic() {
            return None;
        }
        self.error_responses.rule_for(origin_status)
    }

    pub fn url(&self) -> String {
        format!("https://{}", self.domain_name)
    }
}

#[cfg(test)]
mod tests {
    use crate::routing::{AllowedMethods, OriginRequestPolicy, OriginTarget};

    use super::*;

    fn distribution() -> Distribution {
        Distribution::spa_with_api(
            "d111111abcdef8.cloudfront.net",
            "site-bucket",
            "oai-site",
            "api",
            "https://abc123.execute-api.us-east-1.amazonaws.com/prod/",
        )
        .expect("distribution should build")
    }

    #[test]
    fn dynamic_prefix_takes_precedence_over_default() {
        let distribution = distribution();
        let rule = distribution.select_route("/api/users/7");

        assert!(rule.is_dynamic());
        assert_eq!(distribution.classify("/api/users/7"), RouteClass::Dynamic);
        assert!(rule.cache_policy.is_disabled());
        assert_eq!(rule.allowed_methods, AllowedMethods::All);
        assert_eq!(
            rule.origin_request_policy,
            OriginRequestPolicy::AllViewerExceptHostHeader
        );
        assert_eq!(
            rule.target,
            OriginTarget::DynamicGateway {
                domain_name: "abc123.execute-api.us-east-1.amazonaws.com".to_string(),
                protocol: crate::routing::OriginProtocolPolicy::HttpsOnly,
            }
        );
    }

    #[test]
    fn other_paths_fall_to_static_default() {
        let distribution = distribution();
        for path in ["/", "/index.html", "/assets/main.js", "/some/client/route", "/api"] {
            assert_eq!(distribution.classify(path), RouteClass::Static, "{path}");
            assert!(distribution.select_route(path).path_pattern.is_catch_all());
        }
    }

    #[test]
    fn fallback_only_applies_to_static_routes() {
        let distribution = distribution();
        let static_rule = distribution.select_route("/some/client/route");
        let dynamic_rule = distribution.select_route("/api/missing");

        let fallback = distribution
            .fallback_for(static_rule, 404)
            .expect("static 404 should fall back");
        assert_eq!(fallback.response_http_status, 200);
        assert!(distribution.fallback_for(static_rule, 403).is_some());
        assert!(distribution.fallback_for(dynamic_rule, 404).is_none());
        assert!(distribution.fallback_for(static_rule, 500).is_none());
    }

    #[test]
    fn rejects_empty_prefix_and_bad_gateway_url() {
        assert!(Distribution::spa_with_api("d", "b", "o", "/", "https://h/prod/").is_err());
        assert!(Distribution::spa_with_api("d", "b", "o", "api", "nonsense").is_err());
    }

    #[test]
    fn publishes_secure_url() {
        assert_eq!(
            distribution().url(),
            "https://d111111abcdef8.cloudfront.net"
        );
    }
}
