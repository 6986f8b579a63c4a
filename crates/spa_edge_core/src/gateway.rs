//! Dynamic route gateway: a pure proxy stage in front of the compute entry point.

use serde::{Deserialize, Serialize};

use crate::topology::TopologyError;

pub const DEFAULT_STAGE_NAME: &str = "prod";

/// Resource paths the proxy integration registers. Together they accept every
/// path, including the stage root.
pub const PROXY_RESOURCES: [&str; 2] = ["/", "/{proxy+}"];
pub const PROXY_METHOD: &str = "ANY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub rest_api_id: String,
    pub region: String,
    pub stage_name: String,
}

impl GatewayConfig {
    pub fn new(rest_api_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            rest_api_id: rest_api_id.into(),
            region: region.into(),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
        }
    }

    /// Public invoke URL of the stage, with trailing slash.
    pub fn url(&self) -> String {
        format!(
            "https://{}.execute-api.{}.amazonaws.com/{}/",
            self.rest_api_id, self.region, self.stage_name
        )
    }
}

/// Host component of a gateway URL: the third `/`-separated segment.
///
/// `https://abc.execute-api.us-east-1.amazonaws.com/prod/` yields
/// `abc.execute-api.us-east-1.amazonaws.com`.
pub fn gateway_host(url: &str) -> Result<String, TopologyError> {
    match url.split('/').nth(2) {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(TopologyError::InvalidGatewayUrl(url.to_string())),
    }
}
