use std::{fmt, sync::Arc};

use bytes::Bytes;
use reqwest::{Method, Url};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::adapter::{ReqwestTransport, RestRequest, RestResponse, RestTransport, SharedRestTransport};
use crate::config::{ClientConfig, JSON_CONTENT_TYPE};
use crate::error::{ClientError, ClientResult, ConfigError};

/// A decoded response: the status the server answered with plus the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response<T> {
    pub status: u16,
    pub body: T,
}

impl<T> Response<T> {
    pub fn into_body(self) -> T {
        self.body
    }
}

/// Typed client for one REST backend.
///
/// Holds its configuration and transport behind `Arc`s, so clones are cheap
/// and share both. No call mutates the client; concurrent calls need no
/// coordination.
#[derive(Clone)]
pub struct ResourceClient {
    config: Arc<ClientConfig>,
    transport: Arc<SharedRestTransport>,
}

impl ResourceClient {
    /// Client over a fresh `ReqwestTransport`. A path-only base URL (such as
    /// the default `/api/v1`) has no host to talk to and is rejected; use
    /// `with_origin` for it.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        if config.is_path_prefix() {
            return Err(ConfigError::MissingOrigin(config.base_url().to_string()));
        }
        Ok(Self::with_transport(config, ReqwestTransport::new()))
    }

    /// Client over a `ReqwestTransport` resolving a path-only base URL
    /// against `origin`.
    pub fn with_origin(config: ClientConfig, origin: Url) -> Self {
        Self::with_transport(config, ReqwestTransport::new().with_origin(origin))
    }

    pub fn with_transport<T>(config: ClientConfig, transport: T) -> Self
    where
        T: RestTransport + 'static,
    {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    pub fn with_shared_transport(config: ClientConfig, transport: Arc<SharedRestTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn url_for(&self, sub_path: &str) -> ClientResult<String> {
        self.config.url_for(sub_path)
    }

    pub async fn get_json<T>(&self, sub_path: &str) -> ClientResult<Response<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.dispatch(self.request(Method::GET, sub_path)?).await?;
        decode(response)
    }

    /// POST `payload` as JSON. Never retried: the call is not idempotent.
    pub async fn post_json<P, T>(&self, sub_path: &str, payload: &P) -> ClientResult<Response<T>>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, sub_path)?;
        let body = sonic_rs::to_vec(payload).map_err(|err| ClientError::Encode(err.to_string()))?;
        let mut request = request.with_body(body);
        if request.header(CONTENT_TYPE.as_str()).is_none() {
            request = request.with_header(CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE);
        }
        let response = self.dispatch(request).await?;
        decode(response)
    }

    /// DELETE, returning the status and the raw (usually empty) body.
    pub async fn delete(&self, sub_path: &str) -> ClientResult<Response<Bytes>> {
        let response = self.dispatch(self.request(Method::DELETE, sub_path)?).await?;
        Ok(Response {
            status: response.status,
            body: response.body,
        })
    }

    fn request(&self, method: Method, sub_path: &str) -> ClientResult<RestRequest> {
        let mut request = RestRequest::new(method, self.config.url_for(sub_path)?);
        for (name, value) in self.config.default_headers() {
            request = request.with_header(name.as_str(), Bytes::copy_from_slice(value.as_bytes()));
        }
        if let Some(timeout) = self.config.timeout() {
            request = request.with_timeout(timeout);
        }
        Ok(request)
    }

    async fn dispatch(&self, request: RestRequest) -> ClientResult<RestResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.execute(request).await?;
        tracing::debug!(
            status = response.status,
            elapsed_ms = response.elapsed.as_millis() as u64,
            "received response"
        );

        if !response.is_success() {
            return Err(ClientError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }
}

impl fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(response: RestResponse) -> ClientResult<Response<T>> {
    let body = response.json::<T>()?;
    Ok(Response {
        status: response.status,
        body,
    })
}
