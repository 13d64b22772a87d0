mod claude;
pub mod oauth;

use crate::core::models::UsageSnapshot;
use crate::core::settings::ApiSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;

pub use claude::ClaudeUsageClient;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Something the polling driver can ask for a fresh snapshot.
///
/// `fetch` never fails: every error is folded into the returned snapshot.
#[async_trait]
pub trait UsageSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self) -> UsageSnapshot;
    fn dashboard_url(&self) -> &'static str;
}

pub fn build_http_client(api: &ApiSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(api.timeout())
        .user_agent(concat!("claude-tracker/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Shortens a response body for inclusion in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut short: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    short.push_str("...");
    short
}
