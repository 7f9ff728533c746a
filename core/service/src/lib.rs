//! Warm pool of pre-computed DKG parameters for threshold ECDSA.
//!
//! Each parameter set costs tens of seconds of CPU (four safe primes plus a
//! Paillier key); this crate amortizes that cost by generating sets in
//! bounded-concurrency background workers, persisting them across restarts,
//! and serving them over gRPC in milliseconds, with synchronous fallback
//! when the pool runs dry.

pub mod client;
pub mod conf;
pub mod cryptography {
    pub mod generator;
    pub mod pre_params;
}
pub mod error;
pub mod grpc {
    pub mod server;
    pub mod service;
    pub mod wire;
}
pub mod pool {
    pub mod core;
    pub mod manager;
    pub mod refill;
    pub mod store;
}
#[cfg(any(test, feature = "testing"))]
pub mod testing;
