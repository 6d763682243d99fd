use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset; sqlx logs every statement at info.
const DEFAULT_FILTER: &str = "info,sqlx=warn";

pub fn init(service_name: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // try_init: tests and CLI subcommands may call this more than once.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .with_current_span(true)
        .try_init();

    tracing::info!(service = service_name, "logging initialized");
}
