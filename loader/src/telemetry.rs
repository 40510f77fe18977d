use tracing::Subscriber;
use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Directives used when `RUST_LOG` is unset. Load spans and their
/// lifecycle events (aborts, discarded results) are logged at debug.
pub const DEFAULT_FILTER: &str = "info,loader=debug";

/// Log a failure that has no state to land in, such as a panicked load task,
/// with its full error chain.
pub fn log_error(e: impl Into<anyhow::Error>) {
    let e: anyhow::Error = e.into();
    tracing::error!(error = %format!("{e:#}"), "load task failed");
}

/// Build a subscriber writing to stderr. `RUST_LOG` takes precedence over
/// `default_filter` when set. Spans are reported when they close, so each
/// load logs its duration once it settles or is torn down.
pub fn get_subscriber(default_filter: &str) -> impl Subscriber + Sync + Send {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(fmt::format::FmtSpan::CLOSE);
    Registry::default().with(filter).with(stderr)
}

/// Register a subscriber as global default to process span data, and route
/// `log` records through it.
///
/// It should only be called once!
pub fn init_subscriber(
    subscriber: impl Subscriber + Sync + Send,
) -> anyhow::Result<()> {
    LogTracer::init()?;
    set_global_default(subscriber)?;
    Ok(())
}
