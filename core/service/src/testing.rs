//! Deterministic generator stubs and fixtures shared by unit and
//! integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use num_bigint::BigUint;
use tokio_util::sync::CancellationToken;

use crate::cryptography::generator::PreParamsGenerator;
use crate::cryptography::pre_params::{from_unix_seconds, PaillierPrivateKey, PreParams};
use crate::error::Error;

/// Deterministic parameter set: the same `tag` always yields an equal value,
/// and distinct tags yield distinguishable sets.
pub fn test_pre_params(tag: u64) -> PreParams {
    PreParams {
        paillier: PaillierPrivateKey {
            n: BigUint::from(77u8),
            p: BigUint::from(7u8),
            q: BigUint::from(11u8),
            phi_n: BigUint::from(60u8),
            lambda_n: BigUint::from(30u8),
        },
        n_tilde: BigUint::from(1081u16),
        h1: BigUint::from(4u8),
        h2: BigUint::from(1024u16),
        alpha: BigUint::from(tag + 2),
        beta: BigUint::from(tag + 3),
        p_tilde: BigUint::from(23u8),
        q_tilde: BigUint::from(47u8),
        generated_at: from_unix_seconds(1_700_000_000 + tag as i64),
    }
}

/// Returns `test_pre_params(1)`, `test_pre_params(2)`, ... in call order.
#[derive(Default)]
pub struct CountingGenerator {
    counter: AtomicU64,
}

impl CountingGenerator {
    pub fn generated(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

impl PreParamsGenerator for CountingGenerator {
    fn generate(&self, cancel: &CancellationToken) -> Result<PreParams, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let tag = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(test_pre_params(tag))
    }
}

/// Always fails, for exercising the all-or-nothing shortfall path.
pub struct FailingGenerator;

impl PreParamsGenerator for FailingGenerator {
    fn generate(&self, _cancel: &CancellationToken) -> Result<PreParams, Error> {
        Err(Error::GenerationFailure("stub generator failure".to_string()))
    }
}

/// Blocks for up to `block_for`, polling the token, to exercise shutdown
/// while a generation is in flight.
pub struct BlockingGenerator {
    pub block_for: Duration,
}

impl PreParamsGenerator for BlockingGenerator {
    fn generate(&self, cancel: &CancellationToken) -> Result<PreParams, Error> {
        let deadline = std::time::Instant::now() + self.block_for;
        while std::time::Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        Ok(test_pre_params(0))
    }
}
