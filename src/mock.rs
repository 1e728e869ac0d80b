use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;

use super::adapter::{
    RestBytes, RestError, RestFuture, RestRequest, RestResponse, RestResult, RestTransport,
};
use super::error::{ClientError, ClientResult};

/// What the mock transport is doing, mirroring a real connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockTransportState {
    Idle,
    Busy,
    Error,
}

#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    #[default]
    Pass,
    /// Answer after `Duration`, or fail with a timeout once the request's own
    /// timeout elapses first. Waits on the tokio timer, so the mock must be
    /// driven inside a tokio runtime.
    Delay(Duration),
    /// Answer with `status` and `reason` as the body.
    Reject {
        status: u16,
        reason: String,
    },
    ConnectError {
        reason: String,
        retryable: bool,
    },
    SendError {
        reason: String,
        retryable: bool,
    },
    ReceiveError {
        reason: String,
        retryable: bool,
    },
    TimeoutError {
        reason: String,
    },
    InternalError {
        reason: String,
    },
    Drop,
}

impl MockBehavior {
    pub fn delay(ms: u64) -> Self {
        Self::Delay(Duration::from_millis(ms))
    }

    pub fn reject(status: u16, reason: impl Into<String>) -> Self {
        Self::Reject {
            status,
            reason: reason.into(),
        }
    }

    pub fn connect_error(reason: impl Into<String>, retryable: bool) -> Self {
        Self::ConnectError {
            reason: reason.into(),
            retryable,
        }
    }

    pub fn send_error(reason: impl Into<String>, retryable: bool) -> Self {
        Self::SendError {
            reason: reason.into(),
            retryable,
        }
    }

    pub fn receive_error(reason: impl Into<String>, retryable: bool) -> Self {
        Self::ReceiveError {
            reason: reason.into(),
            retryable,
        }
    }

    pub fn timeout_error(reason: impl Into<String>) -> Self {
        Self::TimeoutError {
            reason: reason.into(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }

    pub fn drop_response() -> Self {
        Self::Drop
    }
}

/// Behaviours consumed one per request, front first. An exhausted plan
/// behaves as `Pass`.
#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    request: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.request.push_back(behavior);
        self
    }

    fn pop(&mut self) -> MockBehavior {
        self.request.pop_front().unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.request.len()
    }
}

impl FromIterator<MockBehavior> for MockBehaviorPlan {
    fn from_iter<I: IntoIterator<Item = MockBehavior>>(iter: I) -> Self {
        Self {
            request: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<RestBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, payload: &T) -> ClientResult<Self> {
        let body = sonic_rs::to_vec(payload).map_err(|err| ClientError::Encode(err.to_string()))?;
        Ok(Self::new(status, body).with_header("content-type", "application/json"))
    }
}

/// Computes a response from the request when no queued response matches.
pub type MockResponder = Arc<dyn Fn(&RestRequest) -> Option<MockResponse> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct MockRestStateSnapshot {
    pub state: MockTransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub route_queue_len: usize,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub elapsed_total: Duration,
    pub last_error: Option<String>,
}

struct MockRestAdapterState {
    state: MockTransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<(Method, String), VecDeque<MockResponse>>,
    responder: Option<MockResponder>,
    outbound_log: Vec<RestRequest>,
    inbound_log: Vec<RestResponse>,
    last_error: Option<String>,
    elapsed_total: Duration,
}

impl MockRestAdapterState {
    fn snapshot(&self) -> MockRestStateSnapshot {
        MockRestStateSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            behavior_remaining: self.behavior_plan.len(),
            response_queue_len: self.default_response_queue.len(),
            route_queue_len: self.route_response_queues.values().map(VecDeque::len).sum(),
            inbound_count: self.inbound_log.len(),
            outbound_count: self.outbound_log.len(),
            elapsed_total: self.elapsed_total,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for MockRestAdapterState {
    fn default() -> Self {
        Self {
            state: MockTransportState::Idle,
            request_count: 0,
            last_url: None,
            last_status: None,
            behavior_plan: MockBehaviorPlan::default(),
            default_response_queue: VecDeque::new(),
            route_response_queues: HashMap::new(),
            responder: None,
            outbound_log: Vec::new(),
            inbound_log: Vec::new(),
            last_error: None,
            elapsed_total: Duration::ZERO,
        }
    }
}

impl fmt::Debug for MockRestAdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRestAdapterState")
            .field("state", &self.state)
            .field("request_count", &self.request_count)
            .field("last_url", &self.last_url)
            .field("has_responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

/// In-memory `RestTransport` for deterministic tests.
///
/// Responses are picked in order: the queue for the exact `(method, url)`
/// route, then the default queue, then the responder, and finally an empty
/// 200. Clones share state, so a test can keep one handle for inspection
/// while the client owns another.
#[derive(Clone, Debug)]
pub struct MockRestAdapter {
    state: Arc<Mutex<MockRestAdapterState>>,
}

impl MockRestAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockRestAdapterState::default())),
        }
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let state = MockRestAdapterState {
            behavior_plan,
            ..MockRestAdapterState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self::with_behavior_plan([behavior].into_iter().collect())
    }

    pub fn snapshot(&self) -> MockRestStateSnapshot {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while taking snapshot")
            .snapshot()
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&RestRequest) -> Option<MockResponse> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while installing responder")
            .responder = Some(Arc::new(responder));
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while queueing response")
            .default_response_queue
            .push_back(response);
    }

    pub fn queue_response_for(&self, method: Method, url: impl Into<String>, response: MockResponse) {
        let key = (method, url.into());
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while queueing response by route")
            .route_response_queues
            .entry(key)
            .or_default()
            .push_back(response);
    }

    pub fn queue_get_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::GET, url, response);
    }

    pub fn queue_post_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::POST, url, response);
    }

    pub fn queue_delete_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::DELETE, url, response);
    }

    pub fn queue_error_text(
        &self,
        method: Method,
        url: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) {
        self.queue_response_for(method, url, MockResponse::text(status, message));
    }

    pub fn queue_error_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: impl Into<String>,
        status: u16,
        payload: &T,
    ) -> ClientResult<()> {
        let response = MockResponse::json(status, payload)?;
        self.queue_response_for(method, url, response);
        Ok(())
    }

    /// Every request the mock has received, oldest first.
    pub fn outbound_requests(&self) -> Vec<RestRequest> {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while reading outbound log")
            .outbound_log
            .clone()
    }

    /// Log the request and move to `Busy`, returning the next behaviour.
    fn begin(&self, request: &RestRequest) -> MockBehavior {
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while starting request");
        state.outbound_log.push(request.clone());
        state.request_count += 1;
        state.last_url = Some(request.url.clone());
        state.state = MockTransportState::Busy;
        state.last_error = None;
        state.behavior_plan.pop()
    }

    fn next_response(&self, request: &RestRequest) -> Option<MockResponse> {
        let responder = {
            let mut state = self
                .state
                .lock()
                .expect("mock-restapi mutex poisoned while selecting response");
            let route_key = (request.method.clone(), request.url.clone());
            if let Some(response) = state
                .route_response_queues
                .get_mut(&route_key)
                .and_then(VecDeque::pop_front)
            {
                return Some(response);
            }
            if let Some(response) = state.default_response_queue.pop_front() {
                return Some(response);
            }
            state.responder.clone()
        };
        // Run outside the lock so a responder may inspect the adapter.
        responder.and_then(|responder| responder(request))
    }

    fn finish(&self, response: MockResponse, start: Instant) -> RestResponse {
        let elapsed = start.elapsed();
        let response = RestResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
            elapsed,
        };
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while recording response");
        state.inbound_log.push(response.clone());
        state.last_status = Some(response.status);
        state.state = MockTransportState::Idle;
        state.elapsed_total += elapsed;
        response
    }

    fn fail(&self, error: RestError) -> RestError {
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while recording error");
        state.state = MockTransportState::Error;
        state.last_error = Some(error.message.clone());
        state.last_status = None;
        error
    }
}

impl Default for MockRestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTransport for MockRestAdapter {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let adapter = self.clone();
        Box::pin(async move {
            let start = Instant::now();
            let behavior = adapter.begin(&request);

            let error = match behavior {
                MockBehavior::Drop => Some(RestError::timeout("mock transport dropped response")),
                MockBehavior::ConnectError { reason, retryable } => {
                    Some(RestError::connect(reason, retryable))
                }
                MockBehavior::SendError { reason, retryable } => Some(RestError::send(reason, retryable)),
                MockBehavior::ReceiveError { reason, retryable } => {
                    Some(RestError::receive(reason, retryable))
                }
                MockBehavior::TimeoutError { reason } => Some(RestError::timeout(reason)),
                MockBehavior::InternalError { reason } => Some(RestError::internal(reason)),
                MockBehavior::Delay(delay) => match request.timeout {
                    Some(timeout) if timeout < delay => {
                        tokio::time::sleep(timeout).await;
                        Some(RestError::timeout(format!(
                            "mock response delayed {delay:?}, request timed out after {timeout:?}"
                        )))
                    }
                    _ => {
                        tokio::time::sleep(delay).await;
                        None
                    }
                },
                MockBehavior::Reject { status, reason } => {
                    return Ok(adapter.finish(MockResponse::text(status, reason), start));
                }
                MockBehavior::Pass => None,
            };
            if let Some(error) = error {
                return Err(adapter.fail(error));
            }

            let response = adapter
                .next_response(&request)
                .unwrap_or_else(|| MockResponse::empty(200));
            Ok(adapter.finish(response, start))
        })
    }
}
