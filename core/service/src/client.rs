use anyhow::ensure;
use prime_pool_grpc::v1::prime_pool_client::PrimePoolClient as GrpcClient;
use prime_pool_grpc::v1::{Empty, GetPreParamsRequest, HealthStatus, PoolStatusResponse};
use tonic::transport::Channel;

use crate::cryptography::pre_params::PreParams;
use crate::grpc::wire;

/// Typed client for the pool service: decodes wire bundles back into domain
/// [`PreParams`] so DKG consumers never touch the byte encoding.
pub struct PrimePoolClient {
    inner: GrpcClient<Channel>,
}

impl PrimePoolClient {
    /// Connect to `endpoint`, e.g. `http://127.0.0.1:50055`.
    pub async fn connect(endpoint: String) -> Result<Self, tonic::transport::Error> {
        let inner = GrpcClient::connect(endpoint).await?;
        Ok(Self { inner })
    }

    /// Retrieve `count` parameter sets; 0 is treated as 1.
    pub async fn get_pre_params(&mut self, count: u32) -> anyhow::Result<Vec<PreParams>> {
        let count = count.max(1);
        let response = self
            .inner
            .get_pre_params(GetPreParamsRequest { count })
            .await?
            .into_inner();
        ensure!(
            !response.params.is_empty(),
            "no parameters returned from service"
        );
        Ok(response.params.into_iter().map(wire::from_wire).collect())
    }

    pub async fn pool_status(&mut self) -> anyhow::Result<PoolStatusResponse> {
        Ok(self.inner.get_pool_status(Empty {}).await?.into_inner())
    }

    pub async fn health_check(&mut self) -> anyhow::Result<HealthStatus> {
        Ok(self.inner.health_check(Empty {}).await?.into_inner())
    }
}
