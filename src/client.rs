use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::credentials::CredentialStore;
use crate::error::{Error, Result, TransportError};

pub const DEFAULT_BASE_URL: &str = "https://api.laundrify.de";

/// Prefix the backend expects in front of access tokens issued to hubs
const BEARER_PREFIX: &str = "Bearer hb|";

/// Bounded exponential backoff: the n-th retry (0-indexed) waits `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Every delay this policy will wait, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|n| self.delay_for(n)).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
    /// Attach the installed bearer credential
    pub authenticated: bool,
}

impl RequestOptions {
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Format the authorization header value for an access token
pub fn bearer_value(access_token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{}{}", BEARER_PREFIX, access_token))?;
    value.set_sensitive(true);
    Ok(value)
}

/// HTTP client for the laundrify backend.
///
/// Clones share the installed credential, so a 401 seen through any clone
/// stops every other clone from sending the rejected token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    store: Arc<CredentialStore>,
    authorization: Arc<RwLock<Option<HeaderValue>>>,
}

impl ApiClient {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string(), store)
    }

    pub fn new_with_base_url(base_url: String, store: Arc<CredentialStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            store,
            authorization: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn is_authorized(&self) -> bool {
        self.authorization
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Make `access_token` the credential attached to authenticated requests
    pub(crate) fn install_authorization(&self, access_token: &str) -> Result<()> {
        let value = bearer_value(access_token)?;
        *self
            .authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(value);
        debug!("Authorization header installed");
        Ok(())
    }

    /// Drop the rejected token everywhere: installed header, memory and disk.
    fn invalidate(&self) {
        warn!("AccessToken seems to be invalid, going to remove it.");
        *self
            .authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.store.clear_access_token();
    }

    fn headers(&self, authenticated: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if authenticated {
            let authorization = self
                .authorization
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .ok_or(Error::MissingAccessToken)?;
            headers.insert(AUTHORIZATION, authorization);
        }

        Ok(headers)
    }

    /// Send one request, retrying transient failures with exponential backoff.
    ///
    /// A 401 is never retried: the token is invalidated and `Unauthorized`
    /// is returned. Returns the response body of the first 2xx response.
    pub async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<String> {
        let mut retry = 0;

        loop {
            // Re-read per attempt so an invalidation elsewhere takes effect immediately
            let headers = self.headers(options.authenticated)?;

            match self.send_once(method.clone(), path, headers, &options).await {
                Ok(body) => return Ok(body),
                Err(TransportError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED => {
                    self.invalidate();
                    return Err(Error::Unauthorized {
                        path: path.to_string(),
                    });
                }
                Err(err) => {
                    if retry >= self.retry.max_retries {
                        return Err(Error::RequestFailure {
                            path: path.to_string(),
                            attempts: retry + 1,
                            source: err,
                        });
                    }

                    let delay = self.retry.delay_for(retry);
                    debug!(
                        "{} {} failed ({}), retrying in {:?} ({}/{})",
                        method,
                        path,
                        err,
                        delay,
                        retry + 1,
                        self.retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }

    /// [`request`](Self::request) and parse the body as JSON
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request(method, path, options).await?;

        serde_json::from_str(&body).map_err(|err| {
            debug!("Raw response: {}", body);
            Error::InvalidResponseShape {
                endpoint: path.to_string(),
                reason: err.to_string(),
                payload: body,
            }
        })
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        options: &RequestOptions,
    ) -> std::result::Result<String, TransportError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.request(method, &url).headers(headers);
        if let Some(body) = &options.body {
            request = request.json(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(TransportError::Status { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<CredentialStore> {
        Arc::new(CredentialStore::new("/nonexistent/laundrify-official.json"))
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(64) >= policy.delay_for(10));
    }

    #[test]
    fn test_bearer_value_format() {
        let value = bearer_value("abc").unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer hb|abc");
        assert!(value.is_sensitive());

        assert!(bearer_value("line\nbreak").is_err());
    }

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new(store());
        assert_eq!(client.base_url(), "https://api.laundrify.de");
        assert!(!client.is_authorized());
    }

    #[test]
    fn test_client_with_custom_base_url() {
        let client = ApiClient::new_with_base_url("https://test.example.com/".to_string(), store());
        assert_eq!(client.base_url(), "https://test.example.com");
    }

    #[test]
    fn test_clones_share_authorization() {
        let client = ApiClient::new(store());
        let clone = client.clone();

        client.install_authorization("abc").unwrap();
        assert!(clone.is_authorized());

        let headers = clone.headers(true).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer hb|abc");
    }

    #[test]
    fn test_authenticated_headers_require_token() {
        let client = ApiClient::new(store());
        assert!(matches!(client.headers(true), Err(Error::MissingAccessToken)));
        assert!(client.headers(false).unwrap().get(AUTHORIZATION).is_none());
    }
}
