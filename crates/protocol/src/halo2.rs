//! Halo2 (IPA over the Pasta cycle) backend for [`ProofOracle`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use halo2_proofs::{
    plonk::{create_proof, keygen_pk, keygen_vk, verify_proof, ProvingKey, SingleVerifier, VerifyingKey},
    poly::commitment::Params,
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use pasta_curves::{vesta, Fp};
use primitives::{Error, Result};
use rand_core::OsRng;
use tracing::{debug, info};
use tree::check_depth;

use crate::circuit::MembershipCircuit;
use crate::{ProofOracle, Witness, PUBLIC_INPUT_LEN};

/// Circuit size parameter: the proving system has `2^k` rows.
pub const DEFAULT_CIRCUIT_K: u32 = 11;

fn backend(e: halo2_proofs::plonk::Error) -> Error {
    Error::OracleUnavailable(format!("halo2: {e:?}"))
}

/// Parameters and keys for one (k, depth) pair, generated once and shared.
#[derive(Clone)]
pub struct Halo2Oracle {
    k: u32,
    depth: usize,
    params: Arc<Params<vesta::Affine>>,
    pk: Arc<ProvingKey<vesta::Affine>>,
}

impl Halo2Oracle {
    pub fn setup(k: u32, depth: usize) -> Result<Self> {
        check_depth(depth)?;
        let started = Instant::now();
        let params = Params::<vesta::Affine>::new(k);
        let circuit = MembershipCircuit::blank(depth);
        let vk = keygen_vk(&params, &circuit).map_err(backend)?;
        let pk = keygen_pk(&params, vk, &circuit).map_err(backend)?;
        info!(k, depth, elapsed_ms = started.elapsed().as_millis() as u64, "halo2 keys generated");
        Ok(Self { k, depth, params: Arc::new(params), pk: Arc::new(pk) })
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn verifying_key(&self) -> &VerifyingKey<vesta::Affine> {
        self.pk.get_vk()
    }
}

impl fmt::Debug for Halo2Oracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Halo2Oracle").field("k", &self.k).field("depth", &self.depth).finish()
    }
}

impl ProofOracle for Halo2Oracle {
    fn prove(&self, witness: &Witness) -> Result<Vec<u8>> {
        if witness.depth() != self.depth {
            return Err(Error::malformed_path(format!(
                "keys were generated for depth {}, witness has {}",
                self.depth,
                witness.depth()
            )));
        }
        let circuit = MembershipCircuit::from_witness(witness)?;
        let public = witness.public_inputs().to_fields();

        let instances: &[&[&[Fp]]] = &[&[&public]];
        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        create_proof(&*self.params, &*self.pk, &[circuit], instances, OsRng, &mut transcript)
            .map_err(backend)?;
        let proof = transcript.finalize();
        debug!(bytes = proof.len(), "halo2 proof created");
        Ok(proof)
    }

    fn verify(&self, proof: &[u8], public_inputs: &[Fp]) -> Result<bool> {
        if public_inputs.len() != PUBLIC_INPUT_LEN {
            return Err(Error::invalid_input(format!(
                "expected {PUBLIC_INPUT_LEN} public inputs, got {}",
                public_inputs.len()
            )));
        }
        let instances: &[&[&[Fp]]] = &[&[public_inputs]];
        let strategy = SingleVerifier::new(&*self.params);
        let mut transcript = Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(proof);
        let result = verify_proof(&*self.params, self.pk.get_vk(), strategy, instances, &mut transcript);
        if let Err(err) = &result {
            debug!(?err, "halo2 proof rejected");
        }
        Ok(result.is_ok())
    }
}
