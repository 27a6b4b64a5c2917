//! Test doubles for the proof oracle.
//!
//! [`DigestOracle`] issues a keyed BLAKE2b tag over the public inputs instead
//! of a succinct proof. It refuses unsatisfiable witnesses, so a tag exists
//! only for statements that hold, which is enough to exercise the protocol
//! and gateway without paying for halo2 key generation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use blake2b_simd::Params as Blake2bParams;
use ff::PrimeField;
use pasta_curves::Fp;
use primitives::{
    derive_hashed_secret, derive_leaf, derive_nullifier, Caller, Error, Result,
};
use tree::MerkleTree;

use crate::{build_witness, check_witness, ProofOracle, Witness, PUBLIC_INPUT_LEN};

const DS_DIGEST_ORACLE: &[u8; 16] = b"zktree.digest.v1";

#[derive(Debug)]
pub struct DigestOracle {
    key: Vec<u8>,
    delay: Option<Duration>,
    available: bool,
    prove_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl DigestOracle {
    /// Keys longer than 64 bytes are truncated.
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: key[..key.len().min(64)].to_vec(),
            delay: None,
            available: true,
            prove_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    /// An oracle whose every call fails with `OracleUnavailable`.
    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new(b"unavailable") }
    }

    /// Sleep this long inside `prove`, to stand in for a slow backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prove_calls(&self) -> usize {
        self.prove_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn tag(&self, public_inputs: &[Fp]) -> Vec<u8> {
        let mut state = Blake2bParams::new()
            .hash_length(32)
            .key(&self.key)
            .personal(DS_DIGEST_ORACLE)
            .to_state();
        for f in public_inputs {
            state.update(&f.to_repr());
        }
        state.finalize().as_bytes().to_vec()
    }
}

impl ProofOracle for DigestOracle {
    fn prove(&self, witness: &Witness) -> Result<Vec<u8>> {
        self.prove_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(Error::OracleUnavailable("digest oracle disabled".into()));
        }
        check_witness(witness)?;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self.tag(&witness.public_inputs().to_fields()))
    }

    fn verify(&self, proof: &[u8], public_inputs: &[Fp]) -> Result<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(Error::OracleUnavailable("digest oracle disabled".into()));
        }
        if public_inputs.len() != PUBLIC_INPUT_LEN {
            return Err(Error::invalid_input(format!(
                "expected {PUBLIC_INPUT_LEN} public inputs, got {}",
                public_inputs.len()
            )));
        }
        Ok(proof == self.tag(public_inputs).as_slice())
    }
}

/// A consistent witness for the third leaf of a fresh tree of `depth`.
pub fn sample_witness(depth: usize) -> Witness {
    try_sample_witness(depth).unwrap_or_else(|e| panic!("sample witness for depth {depth}: {e}"))
}

fn try_sample_witness(depth: usize) -> Result<Witness> {
    let tree = MerkleTree::new(depth)?;
    for secret in [&b"alice"[..], b"bob"] {
        tree.insert(derive_leaf(&derive_hashed_secret(secret)?)?)?;
    }
    let hs = derive_hashed_secret(b"carol")?;
    let leaf = derive_leaf(&hs)?;
    let ins = tree.insert(leaf)?;
    let caller = Caller::from_address([0xca; 20]);
    let nullifier = derive_nullifier(ins.index, &hs, &caller, &leaf)?;
    build_witness(ins.index, hs, caller, leaf, ins.root, ins.path.as_slice(), nullifier, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify;

    #[test]
    fn tags_bind_root_and_nullifier() {
        let oracle = DigestOracle::new(b"key");
        let w = sample_witness(3);
        let proof = oracle.prove(&w).unwrap();
        assert!(verify(&oracle, &proof, &w.root, &w.nullifier_hash).unwrap());

        let mut other_root = w.root;
        other_root.0[31] ^= 1;
        assert!(!verify(&oracle, &proof, &other_root, &w.nullifier_hash).unwrap());

        let other_key = DigestOracle::new(b"other key");
        assert!(!verify(&other_key, &proof, &w.root, &w.nullifier_hash).unwrap());
    }

    #[test]
    fn refuses_false_statements() {
        let oracle = DigestOracle::new(b"key");
        let mut w = sample_witness(3);
        w.caller = Caller::from_address([1; 20]);
        assert!(matches!(oracle.prove(&w), Err(Error::UnsatisfiableWitness(_))));
    }
}
