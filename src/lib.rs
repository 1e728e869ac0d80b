//! Typed client for a users REST backend over a pluggable transport, with an
//! in-memory mock transport for fully deterministic tests.

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod users;

pub use reqwest::Method;

pub use adapter::{
    ReqwestTransport, RestBytes, RestError, RestErrorKind, RestFuture, RestRequest, RestResponse,
    RestResult, RestTransport, SharedRestTransport,
};
pub use client::{ResourceClient, Response};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, ClientResult, ConfigError};
pub use mock::{
    MockBehavior, MockBehaviorPlan, MockResponder, MockResponse, MockRestAdapter,
    MockRestStateSnapshot, MockTransportState,
};
pub use users::{NewUser, USERS_PATH, User, UserId};
