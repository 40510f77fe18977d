pub mod loader;
pub mod request;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use loader::{CancelableLoader, LoadError, LoaderId};
pub use request::{Credentials, RequestConfig, RequestSpec};
pub use state::{ErrorInfo, ErrorKind, Event, LoadState, StateCell};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportResponse,
};

/// Re-exported so callers and transports agree on one token type.
pub use tokio_util::sync::CancellationToken;
