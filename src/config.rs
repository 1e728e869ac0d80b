//! Immutable connection settings shared by every call of one client.

use std::{env, time::Duration};

use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::error::{ClientError, ClientResult, ConfigError};

pub const DEFAULT_BASE_URL: &str = "/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const JSON_CONTENT_TYPE: &str = "application/json";

const PLACEHOLDER_ORIGIN: &str = "http://base.invalid";

pub const BASE_URL_ENV: &str = "USER_API_BASE_URL";
pub const TIMEOUT_MS_ENV: &str = "USER_API_TIMEOUT_MS";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: String,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Defaults overridden by `USER_API_BASE_URL` and `USER_API_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            builder = builder.base_url(base_url);
        }
        if let Some(raw) = lookup(TIMEOUT_MS_ENV) {
            let ms: u64 = raw.trim().parse().map_err(|err| ConfigError::InvalidEnv {
                var: TIMEOUT_MS_ENV,
                reason: format!("{raw:?}: {err}"),
            })?;
            builder = if ms == 0 {
                builder.no_timeout()
            } else {
                builder.timeout(Duration::from_millis(ms))
            };
        }
        builder.build()
    }

    /// Base URL without a trailing slash; either absolute or a `/`-rooted path.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// True when `base_url` is a `/`-rooted path that needs an origin.
    pub fn is_path_prefix(&self) -> bool {
        self.base_url.is_empty() || self.base_url.starts_with('/')
    }

    /// `base_url` joined with `sub_path`. The sub-path is re-rooted under a
    /// single `/`, and segments that would climb out of the base (`.`, `..`,
    /// their `%2e` spellings, backslashes) are rejected.
    pub fn url_for(&self, sub_path: &str) -> ClientResult<String> {
        let invalid = |reason: &'static str| ClientError::InvalidPath {
            path: sub_path.to_string(),
            reason,
        };
        if sub_path.contains(['\\', '#']) {
            return Err(invalid("backslashes and fragments are not allowed"));
        }
        let sub_path = sub_path.trim_start_matches('/');
        let path = sub_path.split('?').next().unwrap_or_default();
        if path.split('/').any(is_dot_segment) {
            return Err(invalid("dot segments are not allowed"));
        }
        Ok(format!("{}/{}", self.base_url, sub_path))
    }
}

/// Path-prefix base `/api/v1`; pair it with `ResourceClient::with_origin`
/// or a custom transport.
impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_headers,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
    base_url: String,
    headers: Vec<(String, String)>,
    keep_default_headers: bool,
    timeout: Option<Duration>,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headers: Vec::new(),
            keep_default_headers: true,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Add a default header. A later value for the same (case-insensitive)
    /// name replaces the earlier one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Drop the built-in `Content-Type: application/json` default.
    pub fn without_default_headers(mut self) -> Self {
        self.keep_default_headers = false;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = normalize_base_url(&self.base_url)?;

        let mut default_headers = if self.keep_default_headers {
            ClientConfig::default().default_headers
        } else {
            HeaderMap::new()
        };
        for (name, value) in self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeaderName(name.clone()))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|_| ConfigError::InvalidHeaderValue(name.clone()))?;
            default_headers.insert(header_name, header_value);
        }

        Ok(ClientConfig {
            base_url,
            default_headers,
            timeout: self.timeout,
        })
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.contains(['?', '#']) {
        return Err(invalid("query and fragment are not allowed"));
    }

    if trimmed.starts_with('/') {
        if trimmed.starts_with("//") || trimmed.contains('\\') {
            return Err(invalid("protocol-relative urls are not allowed"));
        }
        let prefix = trimmed.trim_end_matches('/');
        // Resolving against a fixed origin must neither change the host nor
        // rewrite the path (dot segments, encoded dots, escaping).
        let origin = Url::parse(PLACEHOLDER_ORIGIN).map_err(|err| invalid(&err.to_string()))?;
        let resolved = origin.join(trimmed).map_err(|err| invalid(&err.to_string()))?;
        if resolved.host_str() != origin.host_str() {
            return Err(invalid("path prefix resolves to another host"));
        }
        if resolved.path().trim_end_matches('/') != prefix {
            return Err(invalid("path prefix must be a normalized path"));
        }
        return Ok(prefix.to_string());
    }

    let url = Url::parse(trimmed).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}
