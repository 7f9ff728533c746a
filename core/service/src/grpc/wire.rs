use num_bigint::BigUint;
use prime_pool_grpc::v1::PreParamsData;

use crate::cryptography::pre_params::{
    from_unix_seconds, unix_seconds, PaillierPrivateKey, PreParams,
};

/// Encode a parameter set for the wire: big-endian unsigned bytes per large
/// integer, Unix seconds for the timestamp.
pub fn to_wire(params: &PreParams) -> PreParamsData {
    PreParamsData {
        paillier_p: params.paillier.p.to_bytes_be(),
        paillier_q: params.paillier.q.to_bytes_be(),
        paillier_n: params.paillier.n.to_bytes_be(),
        paillier_phi_n: params.paillier.phi_n.to_bytes_be(),
        paillier_lambda_n: params.paillier.lambda_n.to_bytes_be(),
        n_tilde: params.n_tilde.to_bytes_be(),
        h1: params.h1.to_bytes_be(),
        h2: params.h2.to_bytes_be(),
        alpha: params.alpha.to_bytes_be(),
        beta: params.beta.to_bytes_be(),
        p: params.p_tilde.to_bytes_be(),
        q: params.q_tilde.to_bytes_be(),
        generated_at: unix_seconds(params.generated_at),
    }
}

pub fn from_wire(proto: PreParamsData) -> PreParams {
    PreParams {
        paillier: PaillierPrivateKey {
            p: BigUint::from_bytes_be(&proto.paillier_p),
            q: BigUint::from_bytes_be(&proto.paillier_q),
            n: BigUint::from_bytes_be(&proto.paillier_n),
            phi_n: BigUint::from_bytes_be(&proto.paillier_phi_n),
            lambda_n: BigUint::from_bytes_be(&proto.paillier_lambda_n),
        },
        n_tilde: BigUint::from_bytes_be(&proto.n_tilde),
        h1: BigUint::from_bytes_be(&proto.h1),
        h2: BigUint::from_bytes_be(&proto.h2),
        alpha: BigUint::from_bytes_be(&proto.alpha),
        beta: BigUint::from_bytes_be(&proto.beta),
        p_tilde: BigUint::from_bytes_be(&proto.p),
        q_tilde: BigUint::from_bytes_be(&proto.q),
        generated_at: from_unix_seconds(proto.generated_at),
    }
}
