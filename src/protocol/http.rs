// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for Shelly devices.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{self, AuthScheme, DigestAuth};
use crate::error::ProtocolError;
use crate::protocol::rpc::{self, Params, RpcRequest};
use crate::protocol::{DEFAULT_SOURCE, Transport};
use crate::types::Generation;

// ============================================================================
// HttpConfig
// ============================================================================

/// Configuration for the HTTP transport of one device.
///
/// # Examples
///
/// ```
/// use shelly_lib::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("192.168.1.100")
///     .with_credentials("admin", "secret")
///     .with_source("my-bridge")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.base_url(), "http://192.168.1.100");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    #[serde(with = "crate::config::duration_secs")]
    timeout: Duration,
    source: String,
}

impl HttpConfig {
    /// Default HTTP port.
    pub const DEFAULT_PORT: u16 = 80;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default Basic auth user name.
    pub const DEFAULT_USERNAME: &'static str = "admin";

    /// Creates a configuration for the given host.
    ///
    /// The host may carry a port (`10.0.0.5:8080`) or a full
    /// `http://` prefix.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets user name and password.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    /// Sets only the password, keeping the default `admin` user.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `src` tag used in RPC envelopes.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the base URL from this configuration.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            return host.to_string();
        }
        if self.port == Self::DEFAULT_PORT || host.contains(':') {
            format!("http://{host}")
        } else {
            format!("http://{host}:{}", self.port)
        }
    }

    /// Creates an [`HttpClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<HttpClient, ProtocolError> {
        let base_url = self.base_url();

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProtocolError::Network)?;

        Ok(HttpClient {
            base_url,
            client,
            credentials: Credentials {
                username: self.username,
                password: self.password,
            },
            source: self.source,
            next_id: Arc::new(AtomicU32::new(1)),
        })
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: Self::DEFAULT_PORT,
            username: Self::DEFAULT_USERNAME.to_string(),
            password: None,
            timeout: Self::DEFAULT_TIMEOUT,
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// Credentials used when a device answers 401.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// User name for Basic auth.
    pub username: String,
    /// Password, if one is configured.
    pub password: Option<String>,
}

/// Credential attached to the retried request.
#[derive(Debug)]
enum Attached {
    Header(String),
    Body(DigestAuth),
}

/// HTTP client for one Shelly device.
///
/// Every call starts unauthenticated. On `401 Unauthorized` the
/// `www-authenticate` challenge is answered once; a second 401 is reported
/// as [`ProtocolError::AuthenticationFailed`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    credentials: Credentials,
    source: String,
    next_id: Arc<AtomicU32>,
}

impl HttpClient {
    /// Creates a client for `host` with default settings.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(host: impl Into<String>) -> Result<Self, ProtocolError> {
        HttpConfig::new(host).into_client()
    }

    /// Returns the base URL of the device.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the RPC source tag.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Calls a method before the device generation is known.
    ///
    /// The wire format is guessed from the method name; see
    /// [`Generation::infer_from_method`].
    ///
    /// # Errors
    ///
    /// Same as [`Transport::call`].
    pub async fn call_inferred(&self, method: &str, params: &Params) -> Result<Value, ProtocolError> {
        let generation = Generation::infer_from_method(method);
        tracing::debug!(method, %generation, "Guessing wire format from method name");
        self.call(method, params, generation).await
    }

    fn next_request_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn build_request(
        &self,
        method: &str,
        params: &Params,
        generation: Generation,
        id: u32,
        attached: Option<&Attached>,
    ) -> Result<RequestBuilder, ProtocolError> {
        let mut request = if generation.is_rpc() {
            let mut envelope = RpcRequest::new(id, &self.source, method, params);
            if let Some(Attached::Body(digest)) = attached {
                envelope = envelope.with_auth(digest);
            }
            self.client
                .post(format!("{}/rpc", self.base_url))
                .header(CONTENT_TYPE, "application/json")
                .body(envelope.to_json()?)
        } else {
            self.client
                .post(format!("{}/{}", self.base_url, method.trim_start_matches('/')))
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode_form(params))
        };
        if let Some(Attached::Header(value)) = attached {
            request = request.header(AUTHORIZATION, value);
        }
        Ok(request)
    }

    /// Answers the challenge carried by a 401 response.
    fn answer_challenge(
        &self,
        response: &Response,
        uri: &str,
        in_body: bool,
    ) -> Result<Attached, ProtocolError> {
        let header = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ProtocolError::MalformedHeader("401 without www-authenticate".into()))?;

        let Some(password) = self.credentials.password.as_deref() else {
            tracing::error!(url = %self.base_url, "Device requires authentication but no password is configured");
            return Err(ProtocolError::AuthenticationFailed);
        };

        let scheme = AuthScheme::detect(header)
            .ok_or_else(|| ProtocolError::MalformedHeader(format!("unknown scheme: {header}")))?;
        let params = auth::parse_challenge(header, scheme)?;

        match scheme {
            AuthScheme::Basic => Ok(Attached::Header(format!(
                "Basic {}",
                auth::compute_basic_credential(&self.credentials.username, password)
            ))),
            AuthScheme::Digest => {
                let digest = auth::digest_from_challenge(&params, password, auth::random_cnonce())?;
                if in_body {
                    Ok(Attached::Body(digest))
                } else {
                    Ok(Attached::Header(digest.authorization_header(uri)))
                }
            }
        }
    }

    async fn read_json(response: Response) -> Result<Value, ProtocolError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProtocolError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(ProtocolError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(ProtocolError::Network)?;
        tracing::debug!(body = %body, "Received HTTP response");

        serde_json::from_str(&body).map_err(|e| ProtocolError::InvalidResponse(e.to_string()))
    }
}

impl Transport for HttpClient {
    async fn fetch_identity(&self) -> Result<Value, ProtocolError> {
        let url = format!("{}/shelly", self.base_url);
        tracing::debug!(url = %url, "Fetching device identity");

        let response = self.client.get(&url).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::read_json(response).await;
        }

        let attached = self.answer_challenge(&response, "/shelly", false)?;
        let Attached::Header(value) = attached else {
            return Err(ProtocolError::AuthenticationFailed);
        };
        let retried = self.client.get(&url).header(AUTHORIZATION, value).send().await?;
        Self::read_json(retried).await
    }

    async fn call(
        &self,
        method: &str,
        params: &Params,
        generation: Generation,
    ) -> Result<Value, ProtocolError> {
        let id = self.next_request_id();
        tracing::debug!(url = %self.base_url, method, %generation, id, "Sending HTTP call");

        let response = self
            .build_request(method, params, generation, id, None)?
            .send()
            .await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            let uri = format!("/{}", method.trim_start_matches('/'));
            let attached = self.answer_challenge(&response, &uri, generation.is_rpc())?;
            tracing::debug!(url = %self.base_url, method, "Retrying with credentials");
            self.build_request(method, params, generation, id, Some(&attached))?
                .send()
                .await?
        } else {
            response
        };

        let body = Self::read_json(response).await?;
        if generation.is_rpc() {
            rpc::extract_result(body)
        } else {
            Ok(body)
        }
    }
}

/// URL-encodes parameters the way Gen1 endpoints expect them.
#[must_use]
pub fn encode_form(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let raw = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&raw))
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn base_url_variants() {
        assert_eq!(HttpConfig::new("10.0.0.5").base_url(), "http://10.0.0.5");
        assert_eq!(
            HttpConfig::new("10.0.0.5").with_port(8080).base_url(),
            "http://10.0.0.5:8080"
        );
        assert_eq!(
            HttpConfig::new("127.0.0.1:4321").base_url(),
            "http://127.0.0.1:4321"
        );
        assert_eq!(
            HttpConfig::new("http://127.0.0.1:4321/").base_url(),
            "http://127.0.0.1:4321"
        );
    }

    #[test]
    fn config_defaults() {
        let config = HttpConfig::new("host");
        assert_eq!(config.port(), 80);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        let client = config.into_client().unwrap();
        assert_eq!(client.source(), DEFAULT_SOURCE);
        assert!(client.credentials.password.is_none());
        assert_eq!(client.credentials.username, "admin");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: HttpConfig =
            serde_json::from_value(json!({"host": "10.0.0.7", "password": "pw", "timeout": 3}))
                .unwrap();
        assert_eq!(config.host(), "10.0.0.7");
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.password.as_deref(), Some("pw"));
    }

    #[test]
    fn encode_form_renders_scalars() {
        let mut params = Params::new();
        params.insert("turn".into(), json!("on"));
        params.insert("brightness".into(), json!(40));
        params.insert("name".into(), json!("living room"));
        params.insert("enabled".into(), json!(true));
        let encoded = encode_form(&params);
        let mut pairs: Vec<&str> = encoded.split('&').collect();
        pairs.sort_unstable();
        assert_eq!(
            pairs,
            ["brightness=40", "enabled=true", "name=living%20room", "turn=on"]
        );
    }

    #[test]
    fn request_ids_increase() {
        let client = HttpClient::new("host").unwrap();
        let first = client.next_request_id();
        let second = client.next_request_id();
        assert_eq!(second, first + 1);
    }
}
