use std::future::Future;

use reqwest::StatusCode;

use crate::request::{Credentials, RequestSpec};

/// Performs network I/O on behalf of a loader.
///
/// Implementations must honor the request's signal: once it is canceled the
/// returned future should resolve promptly, typically with
/// [`TransportError::Aborted`].
pub trait Transport: Send + Sync + 'static {
    type Response: TransportResponse;

    fn send(
        &self,
        request: RequestSpec,
    ) -> impl Future<Output = Result<Self::Response, TransportError>> + Send;
}

/// A response whose status is known but whose body may not be read yet.
pub trait TransportResponse: Send {
    fn status(&self) -> StatusCode;

    fn bytes(
        self,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// A failure from a transport that is not backed by reqwest.
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request aborted")]
    Aborted,
}

/// HTTP transport backed by [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    pub inner_client: reqwest::Client,
    /// Prefixed to locators that start with `/`.
    pub base_url: Option<String>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(inner_client: reqwest::Client) -> Self {
        Self {
            inner_client,
            base_url: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn format_url(&self, locator: &str) -> String {
        match &self.base_url {
            Some(base) if locator.starts_with('/') => {
                format!("{}{locator}", base.trim_end_matches('/'))
            }
            _ => locator.to_string(),
        }
    }
}

impl Transport for ReqwestTransport {
    type Response = reqwest::Response;

    #[tracing::instrument(
        skip(self, request),
        fields(method = %request.config.method, url = tracing::field::Empty)
    )]
    async fn send(
        &self,
        request: RequestSpec,
    ) -> Result<reqwest::Response, TransportError> {
        let signal = request.signal();
        let url = self.format_url(&request.locator);
        tracing::Span::current().record("url", tracing::field::display(&url));

        let RequestSpec { config, .. } = request;
        let mut builder = self
            .inner_client
            .request(config.method, url)
            .headers(config.headers);
        if let Some(body) = config.body {
            builder = builder.body(body);
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        // Native reqwest has no credentials mode; cookies follow the client.
        if config.credentials != Credentials::default() {
            tracing::debug!(
                credentials = ?config.credentials,
                "credentials mode has no effect on this transport"
            );
        }

        tokio::select! {
            biased;
            _ = signal.cancelled() => {
                tracing::debug!("request aborted before a response arrived");
                Err(TransportError::Aborted)
            }
            response = builder.send() => Ok(response?),
        }
    }
}

impl TransportResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }

    async fn bytes(self) -> Result<Vec<u8>, TransportError> {
        Ok(reqwest::Response::bytes(self).await?.to_vec())
    }
}
