use std::time::{Duration, SystemTime, UNIX_EPOCH};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Paillier private key material as produced by key generation.
///
/// `lambda_n` follows the safe-prime convention (`phi_n / 2`), matching the
/// quantity the DKG consumer expects verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierPrivateKey {
    #[serde(with = "biguint_hex")]
    pub n: BigUint,
    #[serde(with = "biguint_hex")]
    pub p: BigUint,
    #[serde(with = "biguint_hex")]
    pub q: BigUint,
    #[serde(with = "biguint_hex")]
    pub phi_n: BigUint,
    #[serde(with = "biguint_hex")]
    pub lambda_n: BigUint,
}

/// One complete pre-computed parameter set for a DKG participant.
///
/// Immutable after construction: a set either comes straight out of the
/// generator or was deserialized from the pool file with every field intact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreParams {
    pub paillier: PaillierPrivateKey,
    /// Composite modulus, product of the two safe primes below.
    #[serde(with = "biguint_hex")]
    pub n_tilde: BigUint,
    /// Quadratic residue modulo `n_tilde`.
    #[serde(with = "biguint_hex")]
    pub h1: BigUint,
    /// `h1^alpha mod n_tilde`.
    #[serde(with = "biguint_hex")]
    pub h2: BigUint,
    #[serde(with = "biguint_hex")]
    pub alpha: BigUint,
    /// Modular inverse of `alpha` modulo the product of the Germain primes.
    #[serde(with = "biguint_hex")]
    pub beta: BigUint,
    /// Safe prime underlying `n_tilde`.
    #[serde(with = "biguint_hex")]
    pub p_tilde: BigUint,
    /// Safe prime underlying `n_tilde`.
    #[serde(with = "biguint_hex")]
    pub q_tilde: BigUint,
    /// Diagnostics only; never affects correctness.
    #[serde(with = "unix_secs")]
    pub generated_at: SystemTime,
}

/// Unix seconds for wire encoding; pre-epoch timestamps clamp to 0.
pub fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn from_unix_seconds(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

/// Large integers persist as lowercase hex strings, which round-trip exactly
/// and keep the pool file inspectable.
pub mod biguint_hex {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(16))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        BigUint::parse_bytes(text.as_bytes(), 16)
            .ok_or_else(|| de::Error::custom(format!("invalid hex integer: {text:?}")))
    }
}

pub mod unix_secs {
    use std::time::SystemTime;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(super::unix_seconds(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<SystemTime, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(super::from_unix_seconds(secs))
    }
}
