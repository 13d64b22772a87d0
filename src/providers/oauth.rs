use crate::core::credentials::{now_ms, Credential, CredentialStore};
use crate::core::error::{describe_reqwest, UsageError};
use crate::providers::truncate_body;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchanges a refresh token for a new access token and persists the result.
pub struct TokenRefresher {
    http: reqwest::Client,
    token_url: String,
    store: CredentialStore,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>, store: CredentialStore) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            store,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// One refresh attempt. Never retried here; the fetcher owns the retry budget.
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential, UsageError> {
        tracing::info!("Refreshing OAuth token");

        let response = self
            .http
            .post(&self.token_url)
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token: &credential.refresh_token,
            })
            .send()
            .await
            .map_err(|e| UsageError::Refresh(describe_reqwest(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UsageError::Refresh(format!(
                "HTTP {} {}",
                status,
                truncate_body(&body)
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            UsageError::Refresh(format!("malformed token response: {}", describe_reqwest(e)))
        })?;
        if token.access_token.is_empty() {
            return Err(UsageError::Refresh(
                "token response has an empty access_token".to_string(),
            ));
        }

        let ttl_secs = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let refreshed = Credential {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| credential.refresh_token.clone()),
            expires_at: now_ms().saturating_add(ttl_secs.saturating_mul(1000)),
            extra: credential.extra.clone(),
        };

        self.store.write(&refreshed)?;
        tracing::info!(expires_in_secs = ttl_secs, "OAuth token refreshed");

        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn expired_credential() -> Credential {
        let mut extra = Map::new();
        extra.insert("subscriptionType".to_string(), json!("pro"));
        Credential {
            access_token: "stale-access".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: 0,
            extra,
        }
    }

    async fn setup() -> (MockServer, TempDir, TokenRefresher) {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join(".credentials.json"));
        store.write(&expired_credential()).unwrap();
        let refresher = TokenRefresher::new(
            reqwest::Client::new(),
            format!("{}/v1/oauth/token", server.uri()),
            store,
        );
        (server, dir, refresher)
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens_and_persists() {
        let (server, _dir, refresher) = setup().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .and(body_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "refresh_token": "refresh-2",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let before = now_ms();
        let refreshed = refresher.refresh(&expired_credential()).await.unwrap();

        assert_eq!(refreshed.access_token, "fresh-access");
        assert_eq!(refreshed.refresh_token, "refresh-2");
        assert!(refreshed.expires_at >= before + 7_200_000);
        assert!(refreshed.expires_at <= now_ms() + 7_200_000);
        assert_eq!(refreshed.extra.get("subscriptionType"), Some(&json!("pro")));
        assert_eq!(refresher.store().read().unwrap(), refreshed);
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token_and_defaults_ttl() {
        let (server, _dir, refresher) = setup().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access"
            })))
            .mount(&server)
            .await;

        let before = now_ms();
        let refreshed = refresher.refresh(&expired_credential()).await.unwrap();

        assert_eq!(refreshed.refresh_token, "refresh-1");
        assert!(refreshed.expires_at >= before + 3_600_000);
        assert!(refreshed.expires_at <= now_ms() + 3_600_000);
    }

    #[tokio::test]
    async fn test_refresh_rejected_is_refresh_error() {
        let (server, _dir, refresher) = setup().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let message = match refresher.refresh(&expired_credential()).await {
            Err(UsageError::Refresh(message)) => message,
            other => panic!("expected refresh error, got {other:?}"),
        };
        assert!(message.contains("400"));
        assert!(message.contains("invalid_grant"));

        // Nothing persisted on failure.
        assert_eq!(
            refresher.store().read().unwrap().access_token,
            "stale-access"
        );
    }

    #[tokio::test]
    async fn test_refresh_malformed_body_is_refresh_error() {
        let (server, _dir, refresher) = setup().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = refresher.refresh(&expired_credential()).await.unwrap_err();
        assert!(matches!(err, UsageError::Refresh(_)));
    }

    #[tokio::test]
    async fn test_refresh_unreachable_is_refresh_error() {
        let dir = TempDir::new().unwrap();
        let refresher = TokenRefresher::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/v1/oauth/token",
            CredentialStore::new(dir.path().join(".credentials.json")),
        );

        let err = refresher.refresh(&expired_credential()).await.unwrap_err();
        assert!(matches!(err, UsageError::Refresh(_)));
    }
}
