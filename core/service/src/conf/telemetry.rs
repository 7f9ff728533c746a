use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::conf::TracingConf;

/// Initialize the global tracing subscriber. `RUST_LOG` overrides the
/// configured filter directive when present.
pub fn init_tracing(conf: &TracingConf) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&conf.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
    tracing::info!(service_name = %conf.service_name, "tracing initialized");
    Ok(())
}

/// Span attached to every inbound gRPC request by the trace layer.
pub fn make_span<B>(request: &http::Request<B>) -> Span {
    tracing::info_span!("grpc_request", method = %request.uri().path())
}
