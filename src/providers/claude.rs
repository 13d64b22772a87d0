use crate::core::credentials::{now_ms, Credential, CredentialStore};
use crate::core::error::{describe_reqwest, UsageError};
use crate::core::models::{UsageBucket, UsageSnapshot};
use crate::core::settings::ApiSettings;
use crate::providers::oauth::TokenRefresher;
use crate::providers::{build_http_client, truncate_body, UsageSource};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

const DASHBOARD_URL: &str = "https://claude.ai/settings/usage";

/// A 401 gets one refresh and one retried request, never more.
const MAX_UNAUTHORIZED_RETRIES: u32 = 1;

#[derive(Debug, Deserialize)]
struct OAuthUsageResponse {
    #[serde(default)]
    five_hour: Option<OAuthUsageWindow>,
    #[serde(default)]
    seven_day: Option<OAuthUsageWindow>,
}

#[derive(Debug, Deserialize)]
struct OAuthUsageWindow {
    #[serde(default)]
    utilization: Option<f64>,
    #[serde(default)]
    resets_at: Option<String>,
}

impl OAuthUsageWindow {
    fn into_bucket(self) -> UsageBucket {
        let resets_at = self.resets_at.as_deref().and_then(|raw| {
            match DateTime::parse_from_rfc3339(raw) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(e) => {
                    tracing::debug!(resets_at = raw, error = %e, "Ignoring unparseable reset time");
                    None
                }
            }
        });
        UsageBucket::new(self.utilization.unwrap_or(0.0), resets_at)
    }
}

fn to_bucket(window: Option<OAuthUsageWindow>) -> UsageBucket {
    window.map_or_else(UsageBucket::empty, OAuthUsageWindow::into_bucket)
}

enum UsageReply {
    Body(OAuthUsageResponse),
    Unauthorized,
}

/// Fetches Claude usage windows, refreshing the OAuth token when it has
/// expired or the endpoint answers 401.
pub struct ClaudeUsageClient {
    http: reqwest::Client,
    usage_url: String,
    beta_header: String,
    refresher: TokenRefresher,
}

impl ClaudeUsageClient {
    pub fn new(api: &ApiSettings, store: CredentialStore) -> Result<Self> {
        let http = build_http_client(api)?;
        Ok(Self::with_client(http, api, store))
    }

    pub fn with_client(http: reqwest::Client, api: &ApiSettings, store: CredentialStore) -> Self {
        let refresher = TokenRefresher::new(http.clone(), api.token_url.clone(), store);
        Self {
            http,
            usage_url: api.usage_url.clone(),
            beta_header: api.beta_header.clone(),
            refresher,
        }
    }

    async fn try_fetch(&self) -> Result<UsageSnapshot, UsageError> {
        let mut credential = self.refresher.store().read()?;

        if credential.is_expired(now_ms()) {
            tracing::info!("Access token expired, refreshing before fetch");
            credential = self.renew(&credential).await?;
        }

        let mut unauthorized_retries = 0;
        let usage = loop {
            match self.request_usage(&credential).await? {
                UsageReply::Body(usage) => break usage,
                UsageReply::Unauthorized if unauthorized_retries < MAX_UNAUTHORIZED_RETRIES => {
                    unauthorized_retries += 1;
                    tracing::info!("Usage endpoint returned 401, refreshing token and retrying");
                    credential = self.renew(&credential).await?;
                }
                UsageReply::Unauthorized => return Err(UsageError::Unauthorized),
            }
        };

        Ok(UsageSnapshot::success(
            to_bucket(usage.five_hour),
            to_bucket(usage.seven_day),
        ))
    }

    /// Shared by the expiry path and the 401 path.
    async fn renew(&self, credential: &Credential) -> Result<Credential, UsageError> {
        self.refresher.refresh(credential).await
    }

    async fn request_usage(&self, credential: &Credential) -> Result<UsageReply, UsageError> {
        let response = self
            .http
            .get(&self.usage_url)
            .bearer_auth(&credential.access_token)
            .header("anthropic-beta", &self.beta_header)
            .send()
            .await
            .map_err(|e| UsageError::Network(describe_reqwest(e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(UsageReply::Unauthorized);
        }

        let body = response
            .text()
            .await
            .map_err(|e| UsageError::Network(describe_reqwest(e)))?;

        if !status.is_success() {
            return Err(UsageError::Network(format!(
                "HTTP {} {}",
                status,
                truncate_body(&body)
            )));
        }

        serde_json::from_str(&body)
            .map(UsageReply::Body)
            .map_err(|e| UsageError::Parse(format!("usage response: {e}")))
    }
}

#[async_trait]
impl UsageSource for ClaudeUsageClient {
    fn name(&self) -> &'static str {
        "Claude Code"
    }

    async fn fetch(&self) -> UsageSnapshot {
        match self.try_fetch().await {
            Ok(snapshot) => {
                tracing::debug!(
                    five_hour = snapshot.short_window().utilization,
                    seven_day = snapshot.long_window().utilization,
                    "Fetched usage"
                );
                snapshot
            }
            Err(e) => {
                match &e {
                    UsageError::NotFound { path } => {
                        tracing::warn!(path = %path.display(), "Credentials file not found");
                    }
                    _ => tracing::warn!(error = %e, "Failed to fetch usage"),
                }
                UsageSnapshot::from_error(&e)
            }
        }
    }

    fn dashboard_url(&self) -> &'static str {
        DASHBOARD_URL
    }
}
