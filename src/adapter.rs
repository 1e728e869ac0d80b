use std::{
    future::Future,
    pin::Pin,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::header::HeaderValue;
use reqwest::{Client as ReqwestClient, Method, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{ClientError, ClientResult};

pub type RestBytes = Bytes;
pub type RestFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type RestResult<T> = Result<T, RestError>;

/// Where a transport failure happened. Only failures that prevent a complete
/// response from being received are transport errors; a received non-2xx
/// response is not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestErrorKind {
    Connect,
    Send,
    Receive,
    Timeout,
    Internal,
}

#[derive(Clone, Debug, Error)]
#[error("rest error {kind:?} retryable={retryable} {message}")]
pub struct RestError {
    pub kind: RestErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl RestError {
    pub fn new(kind: RestErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn connect(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Connect, message, retryable)
    }

    pub fn send(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Send, message, retryable)
    }

    pub fn receive(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(RestErrorKind::Receive, message, retryable)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RestErrorKind::Timeout, message, true)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RestErrorKind::Internal, message, false)
    }

    /// Classifies a reqwest failure. `stage` is the kind used when reqwest
    /// reports neither a timeout nor a connect failure.
    fn from_reqwest(stage: RestErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RestErrorKind::Timeout
        } else if err.is_connect() {
            RestErrorKind::Connect
        } else if err.is_builder() {
            RestErrorKind::Internal
        } else {
            stage
        };
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self {
            kind,
            message: err.to_string(),
            retryable,
        }
    }

    pub fn kind(&self) -> RestErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[derive(Clone, Debug)]
pub struct RestRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, RestBytes)>,
    pub body: Option<RestBytes>,
    pub timeout: Option<Duration>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<RestBytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct RestResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
    pub elapsed: Duration,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        sonic_rs::from_slice(&self.body).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

/// The network seam of the client. Implementations resolve every received
/// response, whatever its status, to `Ok`; `Err` is reserved for exchanges
/// that never produced a complete response.
pub trait RestTransport: Send + Sync {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>>;
}

pub type SharedRestTransport = dyn RestTransport + Send + Sync;

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    origin: Option<Url>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(ReqwestClient::new())
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self {
            client,
            origin: None,
        }
    }

    /// Resolve path-only request URLs (`/api/v1/users`) against `origin`.
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    fn resolve(&self, url: &str) -> RestResult<Url> {
        if !url.starts_with('/') {
            return Url::parse(url)
                .map_err(|err| RestError::internal(format!("invalid url {url}: {err}")));
        }
        match &self.origin {
            Some(origin) => origin
                .join(url)
                .map_err(|err| RestError::internal(format!("cannot resolve {url}: {err}"))),
            None => Err(RestError::internal(format!(
                "relative url {url} needs a transport origin"
            ))),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTransport for ReqwestTransport {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let client = self.client.clone();
        let url = self.resolve(&request.url);
        Box::pin(async move {
            let url = url?;
            let start = Instant::now();
            let mut req = client.request(request.method, url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_maybe_shared(value)
                    .map_err(|err| RestError::internal(format!("header {key}: {err}")))?;
                req = req.header(key, value);
            }

            if let Some(body) = request.body {
                req = req.body(body);
            }

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            let resp = req
                .send()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Send, err))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Receive, err))?;

            Ok(RestResponse {
                status,
                headers,
                body,
                elapsed: start.elapsed(),
            })
        })
    }
}
