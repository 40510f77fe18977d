//! An in-memory [`Transport`] with a fixed reply.
//!
//! Every request is recorded, including the signal the loader attached, so
//! tests can check what reached the transport. A gated transport holds each
//! request until [`Gate::release`] is called, which lets a test observe the
//! `Loading` state or tear the loader down mid-flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use loader::{RequestSpec, Transport, TransportError, TransportResponse};
use reqwest::{Method, StatusCode};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TransportResponse for ScriptedResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    async fn bytes(self) -> Result<Vec<u8>, TransportError> {
        Ok(self.body)
    }
}

/// What the transport saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub locator: String,
    pub method: Method,
    pub body: Option<Vec<u8>>,
    pub signal: CancellationToken,
}

#[derive(Debug, Clone)]
enum Reply {
    Response(ScriptedResponse),
    ConnectionFailure(String),
}

#[derive(Debug)]
struct Inner {
    reply: Reply,
    gated: AtomicBool,
    gate: Arc<Notify>,
    requests: Mutex<Vec<RecordedRequest>>,
    aborted: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

/// Releases requests held by a gated [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    /// Let one held (or the next) request complete.
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

impl ScriptedTransport {
    fn new(reply: Reply) -> Self {
        Self {
            inner: Arc::new(Inner {
                reply,
                gated: AtomicBool::new(false),
                gate: Arc::new(Notify::new()),
                requests: Mutex::new(Vec::new()),
                aborted: AtomicBool::new(false),
            }),
        }
    }

    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self::body(status, body.to_string())
    }

    pub fn body(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Reply::Response(ScriptedResponse {
            status,
            body: body.into(),
        }))
    }

    /// Reply with `status` and an empty body.
    pub fn status(status: StatusCode) -> Self {
        Self::body(status, Vec::new())
    }

    pub fn connection_failure(message: &str) -> Self {
        Self::new(Reply::ConnectionFailure(message.to_string()))
    }

    /// Hold requests until the returned gate is released.
    pub fn gated(self) -> (Self, Gate) {
        self.inner.gated.store(true, Ordering::SeqCst);
        let gate = Gate {
            notify: self.inner.gate.clone(),
        };
        (self, gate)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    /// True if a request ended because its signal was canceled.
    pub fn aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    type Response = ScriptedResponse;

    async fn send(
        &self,
        request: RequestSpec,
    ) -> Result<ScriptedResponse, TransportError> {
        let signal = request.signal();
        self.inner.requests.lock().unwrap().push(RecordedRequest {
            locator: request.locator,
            method: request.config.method,
            body: request.config.body,
            signal: signal.clone(),
        });

        let gated = self.inner.gated.load(Ordering::SeqCst);
        let gate = async {
            if gated {
                self.inner.gate.notified().await;
            }
        };
        tokio::select! {
            biased;
            _ = signal.cancelled() => {
                self.inner.aborted.store(true, Ordering::SeqCst);
                return Err(TransportError::Aborted);
            }
            _ = gate => {}
        }

        match &self.inner.reply {
            Reply::Response(response) => Ok(response.clone()),
            Reply::ConnectionFailure(message) => {
                Err(TransportError::Connection(message.clone()))
            }
        }
    }
}
