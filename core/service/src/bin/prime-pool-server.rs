use std::sync::Arc;

use clap::Parser;
use prime_pool_service::conf::{self, telemetry};
use prime_pool_service::cryptography::generator::RealPreParamsGenerator;
use prime_pool_service::grpc::server::run_server;
use prime_pool_service::pool::manager::PoolManager;

#[derive(Parser)]
#[clap(name = "prime-pool-server")]
#[clap(
    about = "Pre-computes and serves the expensive cryptographic parameters required by \
    threshold-ECDSA DKG. \n
    Run with the default configuration: \n
    ./prime-pool-server \n
    or with an explicit configuration file: \n
    cargo run --bin prime-pool-server -- --config-file core/service/config/default.toml \n
    Every setting can also be overridden through PRIME_POOL__-prefixed environment \
    variables, e.g. PRIME_POOL__POOL__MIN_SIZE=4."
)]
struct ServerArgs {
    #[clap(long, help = "path to the configuration file")]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    let config = conf::load_service_config(args.config_file.as_deref())?;
    telemetry::init_tracing(&config.tracing)?;

    tracing::info!(
        listen = %config.listen_address,
        min_size = config.pool.min_size,
        max_size = config.pool.max_size,
        pool_dir = %config.pool.pool_dir.display(),
        "starting prime pool server"
    );

    let generator = Arc::new(RealPreParamsGenerator::new(
        config.pool.prime_bits,
        config.pool.paillier_bits,
    ));
    let pool = Arc::new(PoolManager::new(config.pool.clone(), generator).await);
    pool.start();

    run_server(&config.listen_address, pool, std::future::pending()).await
}
