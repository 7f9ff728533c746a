use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use mockall::automock;
use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_prime::nt_funcs::is_prime;
use num_prime::PrimalityTestConfig;
use num_traits::One;
use rand::rngs::OsRng;
use tokio_util::sync::CancellationToken;

use crate::cryptography::pre_params::{PaillierPrivateKey, PreParams};
use crate::error::Error;

/// Bound on each sub-generation (Paillier key, each safe prime pair).
const SUB_GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Capability boundary between the pool and the slow cryptographic
/// primitive. The pool only ever sees this one operation; tests substitute
/// deterministic stubs.
#[automock]
pub trait PreParamsGenerator: Send + Sync {
    /// Produce one complete parameter set. Blocks for tens of seconds at
    /// production bit sizes; observes `cancel` between primality attempts.
    fn generate(&self, cancel: &CancellationToken) -> Result<PreParams, Error>;
}

#[derive(Default)]
struct GenerationStats {
    count: u64,
    total_time: Duration,
}

/// Real generator backed by `num-bigint`/`num-prime`.
///
/// Safe to invoke concurrently with itself; the only shared state is the
/// statistics counter.
pub struct RealPreParamsGenerator {
    prime_bits: u64,
    paillier_bits: u64,
    sub_timeout: Duration,
    stats: Mutex<GenerationStats>,
}

impl RealPreParamsGenerator {
    pub fn new(prime_bits: u64, paillier_bits: u64) -> Self {
        Self {
            prime_bits,
            paillier_bits,
            sub_timeout: SUB_GENERATION_TIMEOUT,
            stats: Mutex::new(GenerationStats::default()),
        }
    }

    pub fn with_sub_timeout(mut self, sub_timeout: Duration) -> Self {
        self.sub_timeout = sub_timeout;
        self
    }

    /// Cumulative `(successful generations, total wall time)`.
    pub fn statistics(&self) -> (u64, Duration) {
        match self.stats.lock() {
            Ok(stats) => (stats.count, stats.total_time),
            Err(_) => (0, Duration::ZERO),
        }
    }

    /// Generate a Sophie-Germain pair `(q, 2q + 1)` where both are prime and
    /// the safe prime has exactly `bits` bits.
    fn generate_safe_prime(
        &self,
        bits: u64,
        cancel: &CancellationToken,
    ) -> Result<(BigUint, BigUint), Error> {
        let config = PrimalityTestConfig::default();
        let deadline = Instant::now() + self.sub_timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if Instant::now() >= deadline {
                return Err(Error::GenerationTimeout);
            }

            let mut rng = OsRng;
            let mut germain = rng.gen_biguint(bits - 1);
            germain.set_bit(bits - 2, true);
            germain |= BigUint::one();
            if !is_prime(&germain, Some(config)).probably() {
                continue;
            }

            let safe = (&germain << 1usize) + BigUint::one();
            if is_prime(&safe, Some(config)).probably() {
                return Ok((germain, safe));
            }
        }
    }

    /// Paillier key of `paillier_bits`: two distinct safe primes of half the
    /// size, `phi_n = (p-1)(q-1)`, `lambda_n = phi_n / 2`.
    fn generate_paillier_key(&self, cancel: &CancellationToken) -> Result<PaillierPrivateKey, Error> {
        let half = self.paillier_bits / 2;
        let (_, p) = self.generate_safe_prime(half, cancel)?;
        let q = loop {
            let (_, q) = self.generate_safe_prime(half, cancel)?;
            if q != p {
                break q;
            }
        };

        let n = &p * &q;
        let phi_n = (&p - BigUint::one()) * (&q - BigUint::one());
        let lambda_n = &phi_n >> 1usize;
        Ok(PaillierPrivateKey {
            n,
            p,
            q,
            phi_n,
            lambda_n,
        })
    }
}

/// Uniform element of `[1, modulus)` coprime to `modulus`.
fn random_coprime(modulus: &BigUint) -> BigUint {
    let mut rng = OsRng;
    loop {
        let candidate = rng.gen_biguint_below(modulus);
        if candidate.gcd(modulus).is_one() {
            return candidate;
        }
    }
}

impl PreParamsGenerator for RealPreParamsGenerator {
    fn generate(&self, cancel: &CancellationToken) -> Result<PreParams, Error> {
        let started = Instant::now();

        let paillier = self.generate_paillier_key(cancel)?;

        let (germain_p, p_tilde) = self.generate_safe_prime(self.prime_bits, cancel)?;
        let (germain_q, q_tilde) = loop {
            let pair = self.generate_safe_prime(self.prime_bits, cancel)?;
            if pair.1 != p_tilde {
                break pair;
            }
        };

        let n_tilde = &p_tilde * &q_tilde;
        let germain_product = &germain_p * &germain_q;

        let f1 = random_coprime(&n_tilde);
        // alpha must additionally be invertible modulo the Germain product;
        // redraw on the rare miss.
        let (alpha, beta) = loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let alpha = random_coprime(&n_tilde);
            if let Some(beta) = alpha.modinv(&germain_product) {
                break (alpha, beta);
            }
        };

        let h1 = (&f1 * &f1) % &n_tilde;
        let h2 = h1.modpow(&alpha, &n_tilde);

        let elapsed = started.elapsed();
        if let Ok(mut stats) = self.stats.lock() {
            stats.count += 1;
            stats.total_time += elapsed;
            tracing::info!(
                ?elapsed,
                generated = stats.count,
                avg = ?stats.total_time.checked_div(stats.count as u32).unwrap_or_default(),
                "generated pre-computed parameter set"
            );
        }

        Ok(PreParams {
            paillier,
            n_tilde,
            h1,
            h2,
            alpha,
            beta,
            p_tilde,
            q_tilde,
            generated_at: SystemTime::now(),
        })
    }
}
