use std::net::ToSocketAddrs;
use std::sync::Arc;

use anyhow::Context;
use prime_pool_grpc::v1::prime_pool_server::PrimePoolServer;
use tokio::net::TcpListener;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

use crate::conf::telemetry::make_span;
use crate::grpc::service::PrimePoolService;
use crate::pool::manager::PoolManager;

/// Merge OS termination signals with an externally supplied shutdown future
/// and forward the first occurrence to the server.
pub async fn prepare_shutdown_signals<F: std::future::Future<Output = ()> + Send + 'static>(
    external_signal: F,
    merged_signal: tokio::sync::oneshot::Sender<()>,
) {
    // Signal handlers would swallow ctrl+c during test runs, so tests drive
    // shutdown purely through the external future.
    #[cfg(all(not(test), not(feature = "testing")))]
    {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install ctrl+c handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("received ctrl+c signal");
            }
            _ = terminate => {
                tracing::info!("received terminate signal");
            }
            _ = external_signal => {
                tracing::info!("received external shutdown signal");
            }
        }
    }
    #[cfg(any(test, feature = "testing"))]
    {
        external_signal.await;
    }

    let _ = merged_signal.send(());
}

/// Bind and serve the pool over gRPC until a shutdown signal arrives, then
/// drain the pool manager (final save included) before returning.
///
/// Failing to bind `listen_address` is the one startup error that is fatal.
pub async fn run_server<F: std::future::Future<Output = ()> + Send + 'static>(
    listen_address: &str,
    pool: Arc<PoolManager>,
    shutdown_signal: F,
) -> anyhow::Result<()> {
    let socket_addr = listen_address
        .to_socket_addrs()
        .with_context(|| format!("invalid listen address {listen_address}"))?
        .next()
        .with_context(|| format!("listen address {listen_address} resolved to nothing"))?;

    let listener = TcpListener::bind(socket_addr)
        .await
        .with_context(|| format!("failed to bind {socket_addr}"))?;
    let socket_addr = listener.local_addr()?;

    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(prepare_shutdown_signals(shutdown_signal, tx));

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<PrimePoolServer<PrimePoolService>>()
        .await;

    let trace_layer = tower::ServiceBuilder::new()
        .layer(TraceLayer::new_for_grpc().make_span_with(make_span));

    let service = PrimePoolService::new(Arc::clone(&pool));
    let incoming = TcpIncoming::from_listener(listener, true, None)
        .map_err(|e| anyhow::anyhow!("failed to accept on {socket_addr}: {e}"))?;

    tracing::info!("starting prime pool service on {socket_addr}");

    let graceful = Server::builder()
        .layer(trace_layer)
        .add_service(health_service)
        .add_service(PrimePoolServer::new(service))
        .serve_with_incoming_shutdown(incoming, async move {
            let _ = rx.await;
            tracing::info!("starting graceful shutdown of prime pool service on {socket_addr}");
            pool.stop().await;
        });

    graceful
        .await
        .with_context(|| format!("prime pool service on {socket_addr} stopped with error"))?;
    tracing::info!("prime pool service on {socket_addr} shut down");
    Ok(())
}
