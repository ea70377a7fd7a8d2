//! Scripted in-memory [`Transport`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;

use overlayctl_core::rpc::{
    ConnectionId, Endpoint, OnConnectFailed, OnConnected, OnReply, Transport,
};

/// How the mock answers a connect attempt.
#[derive(Debug, Clone)]
pub enum ConnectScript {
    Succeed,
    Fail(String),
    /// Drop both callbacks without calling either.
    Abandon,
}

/// One scripted reply to a request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Success with this JSON value as the only fragment.
    Json(Value),
    /// Success with this raw text as the only fragment.
    Raw(String),
    /// Success with these bytes as the only fragment, valid UTF-8 or not.
    Bytes(Vec<u8>),
    /// Success with no fragments.
    Empty,
    /// Transport-level failure.
    Failed,
}

/// A recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub conn: ConnectionId,
    pub method: String,
    /// The payload parsed back into JSON, if one was sent.
    pub args: Option<Value>,
}

#[derive(Default)]
struct State {
    connects: Vec<Endpoint>,
    calls: Vec<RecordedCall>,
    replies: HashMap<String, VecDeque<MockReply>>,
}

/// Scripted transport that records every connect and request.
///
/// Replies are consumed per method in FIFO order; a method with nothing
/// scripted answers [`MockReply::Failed`]. Callbacks fire inline, or on a
/// spawned task after [`MockTransport::deferred`].
pub struct MockTransport {
    connect: ConnectScript,
    deferred: bool,
    state: Mutex<State>,
}

/// Connection id handed out by the mock.
pub const MOCK_CONNECTION: ConnectionId = ConnectionId::new(1);

impl MockTransport {
    pub fn new() -> Self {
        Self::with_connect(ConnectScript::Succeed)
    }

    pub fn with_connect(connect: ConnectScript) -> Self {
        Self {
            connect,
            deferred: false,
            state: Mutex::new(State::default()),
        }
    }

    /// Fire callbacks from a spawned tokio task instead of inline.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Queue a reply for `method`.
    pub fn reply(self, method: &str, reply: MockReply) -> Self {
        self.state
            .lock()
            .unwrap()
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a JSON reply for `method`.
    pub fn reply_json(self, method: &str, value: Value) -> Self {
        self.reply(method, MockReply::Json(value))
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Methods called, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    fn fire(&self, f: impl FnOnce() + Send + 'static) {
        if self.deferred {
            tokio::spawn(async move { f() });
        } else {
            f();
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn connect_remote(
        &self,
        endpoint: &Endpoint,
        on_connected: OnConnected,
        on_failed: OnConnectFailed,
    ) {
        self.state.lock().unwrap().connects.push(endpoint.clone());
        match self.connect.clone() {
            ConnectScript::Succeed => self.fire(move || on_connected(MOCK_CONNECTION)),
            ConnectScript::Fail(msg) => self.fire(move || on_failed(msg)),
            ConnectScript::Abandon => {}
        }
    }

    fn request(&self, conn: ConnectionId, method: &str, payload: Option<String>, on_reply: OnReply) {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(RecordedCall {
                conn,
                method: method.to_string(),
                args: payload.as_deref().and_then(|p| serde_json::from_str(p).ok()),
            });
            state
                .replies
                .get_mut(method)
                .and_then(VecDeque::pop_front)
                .unwrap_or(MockReply::Failed)
        };

        self.fire(move || match reply {
            MockReply::Json(value) => on_reply(true, vec![value.to_string().into_bytes()]),
            MockReply::Raw(text) => on_reply(true, vec![text.into_bytes()]),
            MockReply::Bytes(bytes) => on_reply(true, vec![bytes]),
            MockReply::Empty => on_reply(true, Vec::new()),
            MockReply::Failed => on_reply(false, Vec::new()),
        });
    }
}
