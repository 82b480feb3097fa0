//! HTTP client speaking the `{code, state, msg, data}` envelope

use super::errors::{NetworkError, NetworkResult};
use super::token::decode_claims;
use super::LOGIN_INVALID;
use crate::bus::EventBus;
use crate::storage::NamespacedStorage;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Storage key of the bearer token
pub const JWT_KEY: &str = "jwt";

/// Response envelope every API endpoint wraps its payload in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub state: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

/// Per-request knobs
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query string parameters
    pub params: BTreeMap<String, String>,
    /// JSON body
    pub data: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Return the raw body instead of unwrapping the envelope
    pub skip_code_check: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn skip_code_check(mut self) -> Self {
        self.skip_code_check = true;
        self
    }
}

/// API client bound to one host
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    bus: EventBus,
    storage: NamespacedStorage,
}

impl ApiClient {
    pub fn new(
        base_url: Option<String>,
        timeout: Duration,
        bus: EventBus,
        storage: NamespacedStorage,
    ) -> NetworkResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            bus,
            storage,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn resolve_url(&self, url: &str) -> NetworkResult<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| NetworkError::ConfigError(format!("No API host configured for '{}'", url)))?;
        Ok(format!("{}/{}", base, url.trim_start_matches('/')))
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        opts: RequestOptions,
    ) -> NetworkResult<T> {
        let url = self.resolve_url(url)?;
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, &url).query(&opts.params);
        for (key, value) in &opts.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(data) = &opts.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("{} answered {}", url, status);
            return Err(match serde_json::from_str::<StandardResponse>(&text) {
                Ok(envelope) if !envelope.msg.is_empty() => NetworkError::Rejected {
                    code: envelope.code,
                    msg: envelope.msg,
                },
                _ => NetworkError::Status {
                    status: status.as_u16(),
                    body: text,
                },
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        let data = self.settle(body, opts.skip_code_check)?;
        Ok(serde_json::from_value(data)?)
    }

    /// Unwrap the envelope of a successful response
    pub(crate) fn settle(&self, body: Value, skip_code_check: bool) -> NetworkResult<Value> {
        if skip_code_check {
            return Ok(body);
        }

        let envelope: StandardResponse = serde_json::from_value(body)?;
        if !envelope.state {
            debug!("Request rejected with code {}: {}", envelope.code, envelope.msg);
            return Err(NetworkError::Rejected {
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        if envelope.code == 403 {
            warn!("Login no longer valid");
            self.bus.emit(LOGIN_INVALID, &[]);
        }

        Ok(envelope.data)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> NetworkResult<T> {
        self.request(Method::GET, url, opts).await
    }

    pub async fn post<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> NetworkResult<T> {
        self.request(Method::POST, url, opts).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> NetworkResult<T> {
        self.request(Method::DELETE, url, opts).await
    }

    /// Store `token` until its `exp` claim. Returns false for unreadable or
    /// already expired tokens.
    pub fn set_jwt(&self, token: &str) -> bool {
        let claims = match decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Refusing token: {}", e);
                return false;
            }
        };

        let ttl = match claims.seconds_left(Utc::now().timestamp()) {
            Some(left) if left > 0 => Some(Duration::from_secs(left.unsigned_abs())),
            Some(_) => {
                debug!("Refusing expired token");
                return false;
            }
            None => None,
        };

        match self.storage.save(JWT_KEY, &token, ttl) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store token: {}", e);
                false
            }
        }
    }

    /// Whether a stored token exists and has not expired
    pub fn check_jwt(&self) -> bool {
        let Some(token) = self.storage.load::<String>(JWT_KEY) else {
            return false;
        };
        match decode_claims(&token) {
            Ok(claims) => claims
                .seconds_left(Utc::now().timestamp())
                .map_or(true, |left| left > 0),
            Err(e) => {
                debug!("Stored token unreadable: {}", e);
                false
            }
        }
    }

    /// `opts` plus the bearer header, when a token is stored
    pub(crate) fn with_auth(&self, mut opts: RequestOptions) -> RequestOptions {
        if let Some(token) = self.storage.load::<String>(JWT_KEY) {
            opts.headers
                .insert(AUTHORIZATION.as_str().to_string(), format!("Bearer {}", token));
        }
        opts
    }

    pub async fn auth_request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        opts: RequestOptions,
    ) -> NetworkResult<T> {
        self.request(method, url, self.with_auth(opts)).await
    }

    pub async fn auth_get<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> NetworkResult<T> {
        self.auth_request(Method::GET, url, opts).await
    }

    pub async fn auth_post<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> NetworkResult<T> {
        self.auth_request(Method::POST, url, opts).await
    }

    pub async fn auth_delete<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> NetworkResult<T> {
        self.auth_request(Method::DELETE, url, opts).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
