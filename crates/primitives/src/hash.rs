//! Native Poseidon hashes over the Pallas base field.
//!
//! All three arities use the `P128Pow5T3` permutation (width 3, rate 2) with
//! constant-length domains, matching the in-circuit Poseidon chip.

use halo2_gadgets::poseidon::primitives::{self as poseidon, ConstantLength, P128Pow5T3};
use pasta_curves::Fp;

pub fn hash<const L: usize>(message: [Fp; L]) -> Fp {
    poseidon::Hash::<Fp, P128Pow5T3, ConstantLength<L>, 3, 2>::init().hash(message)
}

pub fn poseidon1(a: Fp) -> Fp {
    hash([a])
}

/// Merkle node combiner.
pub fn poseidon2(left: Fp, right: Fp) -> Fp {
    hash([left, right])
}

pub fn poseidon4(a: Fp, b: Fp, c: Fp, d: Fp) -> Fp {
    hash([a, b, c, d])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_separates_domains() {
        let x = Fp::from(5u64);
        assert_ne!(poseidon1(x), poseidon2(x, Fp::from(0u64)));
        assert_ne!(poseidon2(x, x), poseidon4(x, x, Fp::from(0u64), Fp::from(0u64)));
    }

    #[test]
    fn combiner_is_order_sensitive() {
        let a = Fp::from(1u64);
        let b = Fp::from(2u64);
        assert_ne!(poseidon2(a, b), poseidon2(b, a));
        assert_eq!(poseidon2(a, b), poseidon2(a, b));
    }
}
