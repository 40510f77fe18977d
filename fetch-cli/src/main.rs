mod config;

use loader::{
    CancelableLoader, LoadState, ReqwestTransport,
    telemetry::{DEFAULT_FILTER, get_subscriber, init_subscriber},
};

use crate::config::Config;

/// Load a single resource and print its final state as JSON.
///
/// Environment variables can be set directly or loaded from a .env file in
/// the working directory.
///
/// Environment variables:
/// - LOADER_URL: resource to load (or pass it as the first argument)
/// - LOADER_BASE_URL: prefix for urls starting with `/`
/// - LOADER_METHOD: HTTP method, defaults to GET
/// - LOADER_BODY: JSON request body
/// - LOADER_TIMEOUT_SECS: request timeout
/// - LOADER_BEARER_TOKEN: sent as an `Authorization: Bearer` header
/// - LOADER_CREDENTIALS: omit, same-origin, or include
///
/// Example:
/// LOADER_BASE_URL=http://127.0.0.1:8000 cargo run --bin fetch -- /api/items
///
/// Ctrl-C tears the load down; the state printed is then `Loading`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if available
    let _ = dotenvy::dotenv();

    let subscriber = get_subscriber(DEFAULT_FILTER);
    init_subscriber(subscriber)?;

    let config = Config::from_env()?;
    let request = config.request_config()?;
    let mut transport = ReqwestTransport::new();
    if let Some(base_url) = &config.base_url {
        transport = transport.base_url(base_url);
    }

    let Some(mut loader) = CancelableLoader::<serde_json::Value>::load(
        transport,
        config.url.as_deref(),
        Some(request),
    ) else {
        tracing::warn!("No url given, loading disabled");
        return Ok(());
    };

    let interrupted = tokio::select! {
        _ = loader.settled() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::info!(loader_id = %loader.id(), "Interrupted");
        loader.teardown();
    }

    let state = loader.settled().await;
    println!("{}", serde_json::to_string_pretty(&state)?);
    match state {
        LoadState::Success(_) => Ok(()),
        LoadState::Failure(error) => Err(anyhow::anyhow!("{error}")),
        LoadState::Idle | LoadState::Loading => {
            Err(anyhow::anyhow!("Load did not complete"))
        }
    }
}
