use std::time::Duration;

use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// How the transport should treat cookies and credentials.
///
/// Recorded on the request for transports that support it;
/// [`crate::ReqwestTransport`] ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// Options for a single request. Every field has a usable default, so
/// `RequestConfig::default()` is a plain GET.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub credentials: Credentials,
    pub timeout: Option<Duration>,
    /// Abort signal for the transport. A loader always replaces this with
    /// its own token; see [`RequestSpec::with_signal`].
    pub signal: Option<CancellationToken>,
}

impl RequestConfig {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self::default().method(Method::POST)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set an `Authorization: Bearer` header, marked sensitive so it is
    /// redacted from debug output.
    pub fn bearer_auth(
        self,
        token: &str,
    ) -> Result<Self, header::InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        Ok(self.header(header::AUTHORIZATION, value))
    }

    /// Serialize `body` as JSON and set the matching content type.
    pub fn json(
        mut self,
        body: &impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// A locator together with the options used to fetch it.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub locator: String,
    pub config: RequestConfig,
}

impl RequestSpec {
    pub fn new(locator: impl Into<String>, config: RequestConfig) -> Self {
        Self {
            locator: locator.into(),
            config,
        }
    }

    /// Attach the loader's cancellation token as the request signal.
    ///
    /// The loader's token always wins. A signal supplied by the caller is
    /// dropped from the request and is never canceled by the loader; the
    /// caller tears the load down through the loader instead.
    pub fn with_signal(mut self, token: CancellationToken) -> Self {
        if self.config.signal.is_some() {
            tracing::debug!(
                locator = %self.locator,
                "replacing caller-supplied signal with loader signal"
            );
        }
        self.config.signal = Some(token);
        self
    }

    /// The attached signal, or a fresh token that is never canceled.
    pub fn signal(&self) -> CancellationToken {
        self.config.signal.clone().unwrap_or_else(CancellationToken::new)
    }
}
