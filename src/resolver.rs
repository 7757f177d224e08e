//! Base name to wallet address resolution.
//!
//! The registry has no lookup API we can depend on, so the explorer's
//! name-lookup page is fetched and the address is read out of the
//! `spanBSCAddress` element. One request per resolution, no retries and no
//! caching.

use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use tracing::debug;

use crate::config::ResolverConfig;

const ADDRESS_SPAN_OPEN: &str = r#"<span id="spanBSCAddress">"#;
const SPAN_CLOSE: &str = "</span>";

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Base name is required")]
    MissingName,
    #[error("Base name {name} did not resolve to an address")]
    NotFound { name: String },
    #[error("Base name lookup failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Address, ResolveError>;
}

/// Resolver backed by the explorer's name-lookup page.
pub struct BasescanResolver {
    http_client: reqwest::Client,
    lookup_url: String,
    user_agent: String,
}

impl BasescanResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ResolveError::Upstream(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            lookup_url: config.lookup_url.clone(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl NameResolver for BasescanResolver {
    async fn resolve(&self, name: &str) -> Result<Address, ResolveError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ResolveError::MissingName);
        }

        let response = self
            .http_client
            .get(&self.lookup_url)
            .query(&[("id", name)])
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolveError::Upstream(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    ResolveError::Upstream(format!("connection failed: {e}"))
                } else {
                    ResolveError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::Upstream(format!("failed to read lookup page: {e}")))?;
        debug!(name, %status, bytes = body.len(), "Fetched name lookup page");

        extract_address(&body).ok_or_else(|| ResolveError::NotFound {
            name: name.to_string(),
        })
    }
}

/// Pulls the address out of the lookup page markup.
///
/// Returns `None` when the span is missing, empty, or does not hold a
/// 20-byte hex address.
pub fn extract_address(html: &str) -> Option<Address> {
    let start = html.find(ADDRESS_SPAN_OPEN)? + ADDRESS_SPAN_OPEN.len();
    let rest = &html[start..];
    let end = rest.find(SPAN_CLOSE)?;
    let inner = rest[..end].trim().to_ascii_lowercase();
    if inner.is_empty() {
        return None;
    }
    Address::from_str(&inner).ok()
}
