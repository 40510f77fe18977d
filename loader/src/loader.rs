use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::request::{RequestConfig, RequestSpec};
use crate::state::{ErrorInfo, ErrorKind, Event, LoadState, StateCell};
use crate::telemetry::log_error;
use crate::transport::{Transport, TransportError, TransportResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub struct LoaderId(pub Uuid);

impl LoaderId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Why a load ended in [`LoadState::Failure`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The response status was outside the 2xx range. The body is not read.
    #[error("{}", status_text(.0))]
    Status(StatusCode),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

fn status_text(status: &StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

impl From<&LoadError> for ErrorInfo {
    fn from(e: &LoadError) -> Self {
        let (kind, status) = match e {
            LoadError::Transport(_) => (ErrorKind::Transport, None),
            LoadError::Status(status) => {
                (ErrorKind::Status, Some(status.as_u16()))
            }
            LoadError::Decode(_) => (ErrorKind::Decode, None),
        };
        ErrorInfo {
            kind,
            message: e.to_string(),
            status,
        }
    }
}

/// A single fetch whose result is published to a [`StateCell`].
///
/// The request is issued as soon as the loader is constructed. Dropping the
/// loader, or calling [`CancelableLoader::teardown`], cancels the request;
/// after that the state is never written again.
///
/// # Example
///
/// ```no_run
/// use loader::{CancelableLoader, ReqwestTransport};
///
/// #[derive(Clone, serde::Deserialize)]
/// struct Item {
///     id: u32,
/// }
///
/// # async fn run() {
/// let transport = ReqwestTransport::new().base_url("http://127.0.0.1:8000");
/// let mut items =
///     CancelableLoader::<Item>::load(transport, Some("/api/items"), None)
///         .expect("locator supplied");
/// assert!(items.state().is_loading());
///
/// match items.settled().await.into_result() {
///     Some(Ok(item)) => println!("item {}", item.id),
///     Some(Err(e)) => eprintln!("{e}"),
///     None => {}
/// }
/// # }
/// ```
pub struct CancelableLoader<T> {
    id: LoaderId,
    cell: StateCell<T>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> CancelableLoader<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Start loading `locator`, decoding a successful JSON body as `T`.
    ///
    /// Returns `None`, without touching the network, when no locator (or an
    /// empty one) is given. Otherwise the state is already
    /// [`LoadState::Loading`] when this returns.
    ///
    /// Must be called from within a tokio runtime.
    pub fn load<Tr: Transport>(
        transport: Tr,
        locator: Option<&str>,
        config: Option<RequestConfig>,
    ) -> Option<Self> {
        let locator = locator.filter(|locator| !locator.is_empty())?;

        let id = LoaderId::new();
        let cell = StateCell::new();
        let token = CancellationToken::new();
        cell.dispatch(Event::Started);

        let request = RequestSpec::new(locator, config.unwrap_or_default())
            .with_signal(token.clone());
        let span = tracing::info_span!(
            "load",
            loader_id = %id,
            method = %request.config.method,
            locator = %locator
        );
        let task = tokio::spawn(
            run(transport, request, cell.clone(), token.clone())
                .instrument(span),
        );

        Some(Self {
            id,
            cell,
            token,
            task: Some(task),
        })
    }
}

impl<T> CancelableLoader<T> {
    pub fn id(&self) -> LoaderId {
        self.id
    }

    /// The latest state.
    pub fn state(&self) -> LoadState<T>
    where
        T: Clone,
    {
        self.cell.get()
    }

    pub fn cell(&self) -> &StateCell<T> {
        &self.cell
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<LoadState<T>> {
        self.cell.subscribe()
    }

    pub fn is_torn_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the in-flight request. Any result that has not been published
    /// yet is discarded; a result that already landed stays.
    pub fn teardown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.cell.close(&self.token);
        tracing::debug!(loader_id = %self.id, "loader torn down");
    }

    /// Wait for the load task to finish and return the final state.
    ///
    /// After a teardown this returns whatever state was current at the time,
    /// which is `Loading` if the request had not settled.
    ///
    /// Cancel safe: if the returned future is dropped early, a later call
    /// keeps waiting on the same task.
    pub async fn settled(&mut self) -> LoadState<T>
    where
        T: Clone,
    {
        if let Some(task) = &mut self.task {
            let result = task.await;
            self.task = None;
            if let Err(e) = result {
                log_error(e);
            }
        }
        self.cell.get()
    }
}

impl<T> Drop for CancelableLoader<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run<T, Tr>(
    transport: Tr,
    request: RequestSpec,
    cell: StateCell<T>,
    token: CancellationToken,
) where
    T: DeserializeOwned + Send + Sync + 'static,
    Tr: Transport,
{
    // The fetch is polled first so the transport always receives the request
    // and its signal, even when teardown happened before the task started.
    let result = tokio::select! {
        biased;
        result = fetch::<T, Tr>(&transport, request) => result,
        _ = token.cancelled() => {
            tracing::debug!("load aborted");
            return;
        }
    };

    let event = match result {
        Err(LoadError::Transport(TransportError::Aborted))
            if token.is_cancelled() =>
        {
            tracing::debug!("load aborted");
            return;
        }
        Ok(data) => {
            tracing::info!("load succeeded");
            Event::Fetched(data)
        }
        Err(e) => {
            tracing::warn!(error = %e, "load failed");
            Event::Failed(ErrorInfo::from(&e))
        }
    };
    if !cell.dispatch_if_active(&token, event) {
        tracing::debug!("load settled after teardown, result discarded");
    }
}

async fn fetch<T, Tr>(
    transport: &Tr,
    request: RequestSpec,
) -> Result<T, LoadError>
where
    T: DeserializeOwned,
    Tr: Transport,
{
    let response = transport.send(request).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Status(status));
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
