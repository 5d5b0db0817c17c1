//! Client for the TeaBank web API.
//!
//! One shared `reqwest::Client` per process: 10 second per-request timeout,
//! the mobile-browser user agent and `Origin`/`Referer` headers the
//! upstream API requires, and a transparent transport-level retry (three
//! attempts, linear backoff) for connection failures and the usual
//! retryable statuses. Each operation returns a tagged result rather than
//! an ad hoc success/error map.

pub mod init_data;

use crate::config::ApiConfig;
use crate::error::{FarmError, Result};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub use init_data::{UserIdentity, extract_init_payload, parse_user_identity, parse_user_value};

/// User agent the upstream API expects (mobile Safari).
const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1";

/// Statuses retried at the transport layer before an operation sees them.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Inclusive range of valid task identifiers for `complete_task`.
pub const TASK_ID_RANGE: std::ops::RangeInclusive<u16> = 1..=257;

/// Stateless-per-call wrapper around the TeaBank HTTP API.
#[derive(Debug, Clone)]
pub struct TeaBankClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl TeaBankClient {
    /// Build a client from API settings.
    ///
    /// Fails only when the configured origin cannot be encoded as a header
    /// value.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let origin = HeaderValue::from_str(&config.app_origin)
            .map_err(|e| FarmError::Config(format!("invalid app origin: {e}")))?;
        let referer = HeaderValue::from_str(&format!("{}/", config.app_origin))
            .map_err(|e| FarmError::Config(format!("invalid app origin: {e}")))?;
        headers.insert(ORIGIN, origin);
        headers.insert(REFERER, referer);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { config, client })
    }

    fn user_api_url(&self) -> String {
        format!("{}/user-api/", self.config.base_url.trim_end_matches('/'))
    }

    fn tasks_api_url(&self) -> String {
        format!("{}/tasks-api/", self.config.base_url.trim_end_matches('/'))
    }

    fn ads_api_url(&self) -> String {
        format!("{}/ads-api/", self.config.base_url.trim_end_matches('/'))
    }

    /// POST a JSON body with bounded retry.
    ///
    /// Transport errors and statuses in [`RETRY_STATUSES`] are retried up
    /// to the configured attempt count with linear backoff; the final
    /// response (or transport error) is returned to the caller, so an
    /// operation still observes a 429 that survived every retry.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let attempts = self.config.retry_attempts.max(1);
        let backoff = Duration::from_secs(self.config.retry_backoff_secs);

        for attempt in 1..=attempts {
            match self.client.post(url).json(body).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if attempt < attempts && RETRY_STATUSES.contains(&status) {
                        debug!(url, status, attempt, "retryable status, backing off");
                        tokio::time::sleep(backoff * attempt).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if attempt < attempts => {
                    warn!(url, attempt, error = %e, "transport error, backing off");
                    tokio::time::sleep(backoff * attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        unreachable!("retry loop returns on the final attempt")
    }

    /// Register (or re-check) the user and obtain an auth token.
    ///
    /// Parses the identity embedded in the init payload and posts it with
    /// the full payload to the registration endpoint. Anything other than
    /// HTTP 200 with a `token` field is [`FarmError::AuthFailed`].
    pub async fn acquire_token(&self, init_payload: &str) -> Result<String> {
        let user = parse_user_value(init_payload)?;
        let identity: UserIdentity = serde_json::from_value(user.clone())
            .map_err(|e| FarmError::Malformed(format!("user blob has unexpected shape: {e}")))?;

        let body = json!({
            "user": user,
            "initData": init_payload,
            "id": identity.id.to_string(),
            "first_name": identity.first_name,
            "last_name": identity.last_name,
            "task": "checkOrRegisterUser",
        });

        let response = self.post_with_retry(&self.user_api_url(), &body).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FarmError::AuthFailed(format!("HTTP {}", status.as_u16())));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FarmError::AuthFailed(format!("unreadable response: {e}")))?;
        match data.get("token").and_then(serde_json::Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_owned()),
            _ => Err(FarmError::AuthFailed("response has no token".to_owned())),
        }
    }

    /// Start a farming cycle. Success is any HTTP 200.
    pub async fn start_farming(&self, token: &str) -> Result<()> {
        let body = json!({
            "task": "startFarming",
            "token": token,
        });

        let response = self.post_with_retry(&self.user_api_url(), &body).await?;
        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            Err(FarmError::RequestFailed(status))
        }
    }

    /// Complete one task by id (valid ids are [`TASK_ID_RANGE`]).
    ///
    /// A 429 that survived the transport retries is reported as
    /// [`FarmError::RateLimited`]; other non-200 statuses as
    /// [`FarmError::RequestFailed`].
    pub async fn complete_task(
        &self,
        init_payload: &str,
        token: &str,
        task_id: u16,
    ) -> Result<()> {
        let body = json!({
            "task": "completeTask",
            "token": token,
            "taskId": task_id,
            "userData": init_payload,
        });

        let response = self.post_with_retry(&self.tasks_api_url(), &body).await?;
        match response.status().as_u16() {
            200 => Ok(()),
            429 => Err(FarmError::RateLimited),
            status => Err(FarmError::RequestFailed(status)),
        }
    }

    /// Watch one ad. Success is any HTTP 200.
    pub async fn watch_ad(&self, init_payload: &str, token: &str) -> Result<()> {
        let body = json!({
            "task": "watchAd",
            "token": token,
            "userData": init_payload,
        });

        let response = self.post_with_retry(&self.ads_api_url(), &body).await?;
        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            Err(FarmError::RequestFailed(status))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn client_for(base_url: &str) -> TeaBankClient {
        TeaBankClient::new(ApiConfig {
            base_url: base_url.to_owned(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_urls_tolerate_trailing_slash() {
        let client = client_for("http://localhost:9090/");
        assert_eq!(client.user_api_url(), "http://localhost:9090/user-api/");
        assert_eq!(client.tasks_api_url(), "http://localhost:9090/tasks-api/");
        assert_eq!(client.ads_api_url(), "http://localhost:9090/ads-api/");
    }

    #[test]
    fn task_id_range_matches_upstream() {
        assert_eq!(*TASK_ID_RANGE.start(), 1);
        assert_eq!(*TASK_ID_RANGE.end(), 257);
    }

    #[test]
    fn bad_origin_is_a_config_error() {
        let result = TeaBankClient::new(ApiConfig {
            app_origin: "bad\norigin".to_owned(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(FarmError::Config(_))));
    }
}
