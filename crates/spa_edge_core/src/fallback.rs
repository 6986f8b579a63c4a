//! SPA fallback: origin error statuses rewritten to the entry document.

use serde::{Deserialize, Serialize};

use crate::contract::ENTRY_DOCUMENT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    /// Status returned by the origin that triggers the rewrite.
    pub http_status: u16,
    pub response_page_path: String,
    pub response_http_status: u16,
    pub ttl_secs: u64,
}

impl FallbackRule {
    pub fn entry_document(http_status: u16) -> Self {
        Self {
            http_status,
            response_page_path: format!("/{ENTRY_DOCUMENT}"),
            response_http_status: 200,
            ttl_secs: 0,
        }
    }
}

/// The substitute the edge serves in place of an intercepted origin error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorResponses(Vec<FallbackRule>);

impl ErrorResponses {
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self(rules)
    }

    /// 403 and 404 both resolve to the entry document at 200, uncached.
    pub fn spa_entry_document() -> Self {
        Self(vec![
            FallbackRule::entry_document(403),
            FallbackRule::entry_document(404),
        ])
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.0
    }

    pub fn rule_for(&self, origin_status: u16) -> Option<&FallbackRule> {
        self.0.iter().find(|rule| rule.http_status == origin_status)
    }

    /// Builds the substitute response from the already fetched page body.
    pub fn substitute(
        &self,
        origin_status: u16,
        page_body: Vec<u8>,
        content_type: Option<String>,
    ) -> Option<FallbackResponse> {
        self.rule_for(origin_status).map(|rule| FallbackResponse {
            status: rule.response_http_status,
            body: page_body,
            content_type,
            cache_ttl_secs: rule.ttl_secs,
        })
    }
}
