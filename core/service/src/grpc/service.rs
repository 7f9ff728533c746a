use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use prime_pool_grpc::v1::prime_pool_server::PrimePool;
use prime_pool_grpc::v1::{
    Empty, GetPreParamsRequest, GetPreParamsResponse, HealthStatus, PoolInfo, PoolStatusResponse,
};
use tonic::{Request, Response, Status};

use crate::cryptography::pre_params::unix_seconds;
use crate::grpc::wire;
use crate::pool::manager::PoolManager;

/// gRPC facade over the pool manager.
pub struct PrimePoolService {
    pool: Arc<PoolManager>,
    started: Instant,
}

impl PrimePoolService {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self {
            pool,
            started: Instant::now(),
        }
    }
}

#[tonic::async_trait]
impl PrimePool for PrimePoolService {
    async fn get_pre_params(
        &self,
        request: Request<GetPreParamsRequest>,
    ) -> Result<Response<GetPreParamsResponse>, Status> {
        let started = Instant::now();
        let count = request.into_inner().count;
        tracing::info!(count, "get_pre_params request");

        let params = self.pool.get_pre_params(count).await.map_err(|e| {
            tracing::warn!("get_pre_params failed: {e}");
            Status::from(e)
        })?;

        Ok(Response::new(GetPreParamsResponse {
            params: params.iter().map(wire::to_wire).collect(),
            generation_time_ms: started.elapsed().as_millis() as i64,
        }))
    }

    async fn get_pool_status(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<PoolStatusResponse>, Status> {
        let snapshot = self.pool.status().await;
        let prime_bits = self.pool.config().prime_bits;

        let mut pools = HashMap::new();
        pools.insert(
            format!("{prime_bits}_true"),
            PoolInfo {
                bits: prime_bits as u32,
                safe_prime: true,
                available: snapshot.available as u32,
                target_size: snapshot.min_size as u32,
                generating: u32::from(snapshot.is_refilling),
                last_refill_time: snapshot.last_refill.map(unix_seconds).unwrap_or(0),
            },
        );

        Ok(Response::new(PoolStatusResponse {
            pools,
            total_generated: snapshot.total_generated as i64,
            total_served: snapshot.total_served as i64,
        }))
    }

    async fn health_check(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<HealthStatus>, Status> {
        Ok(Response::new(HealthStatus {
            healthy: true,
            message: "prime pool service is running".to_string(),
            uptime_seconds: self.started.elapsed().as_secs() as i64,
        }))
    }
}
