//! Membership-and-nullifier proof protocol.
//!
//! A [`Witness`] is assembled from tree data with [`build_witness`], checked
//! locally with [`check_witness`], then handed to a [`ProofOracle`] either
//! through the cancellable [`prove`] task or [`prove_blocking`]. Verification
//! is a pure function of the proof bytes and the public inputs.

pub mod circuit;
pub mod halo2;
pub mod task;
pub mod witness;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use pasta_curves::Fp;
use primitives::{NullifierHash, Result, Root, ROOT_PUBLIC_LEN};
use serde::{Deserialize, Serialize};

pub use halo2::{Halo2Oracle, DEFAULT_CIRCUIT_K};
pub use task::{prove, prove_blocking, ProvingHandle};
pub use witness::{build_witness, check_witness, Witness};

/// Number of field elements in [`PublicInputs::to_fields`].
pub const PUBLIC_INPUT_LEN: usize = ROOT_PUBLIC_LEN + 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PublicInputs {
    pub root: Root,
    pub nullifier_hash: NullifierHash,
}

impl PublicInputs {
    /// Root bytes as 32 elements (most significant first), then the nullifier hash.
    pub fn to_fields(&self) -> Vec<Fp> {
        let mut out = Vec::with_capacity(PUBLIC_INPUT_LEN);
        out.extend_from_slice(&self.root.byte_fields());
        // Non-canonical words are reduced; `verify` rejects them before this point.
        out.push(primitives::reduce_bytes(&self.nullifier_hash.0));
        out
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "serde_bytes")]
    pub proof: Vec<u8>,
    pub public: PublicInputs,
}

/// Prover/verifier backend. Implementations may be slow; callers use
/// [`prove`] to run them off the async executor.
pub trait ProofOracle: Send + Sync + 'static {
    fn prove(&self, witness: &Witness) -> Result<Vec<u8>>;

    /// `Ok(false)` for a proof that does not verify; `Err` only when the
    /// backend itself could not answer.
    fn verify(&self, proof: &[u8], public_inputs: &[Fp]) -> Result<bool>;
}

/// Check `proof` against `root` and `nullifier_hash`. Never consults tree state.
pub fn verify<O: ProofOracle + ?Sized>(
    oracle: &O,
    proof: &[u8],
    root: &Root,
    nullifier_hash: &NullifierHash,
) -> Result<bool> {
    // A non-canonical word can never be a tree root or a nullifier.
    root.to_field()?;
    nullifier_hash.to_field()?;
    let public = PublicInputs { root: *root, nullifier_hash: *nullifier_hash };
    oracle.verify(proof, &public.to_fields())
}
