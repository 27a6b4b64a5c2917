//! Verification gateway: the externally callable surface over a membership
//! tree, a proof oracle and the spent-nullifier registry.
//!
//! A spend names a historical root by index. The gateway resolves it,
//! verifies the proof against it, and records the nullifier exactly once.

pub mod config;
pub mod spend;

use std::fmt;
use std::sync::Arc;

use anyhow::Context as _;
use primitives::{Caller, Error, Leaf, NullifierHash, Result, Root};
use protocol::{Halo2Oracle, ProofOracle};
use tracing::{debug, info, warn};
use tree::{Insertion, MemoryStore, MerklePath, MerkleTree, NullifierStore, TreeStore};

pub use config::Config;
pub use spend::{Rejection, SpendOutcome, SpendReceipt, SpendRegistry};

pub struct VerificationGateway<S = MemoryStore, N = MemoryStore> {
    tree: MerkleTree<S>,
    oracle: Arc<dyn ProofOracle>,
    spends: SpendRegistry<N>,
    root_window: Option<u64>,
    owner: Option<Caller>,
}

impl VerificationGateway {
    /// In-memory gateway backed by `oracle`.
    pub fn with_oracle(config: &Config, oracle: Arc<dyn ProofOracle>) -> Result<Self> {
        Self::with_stores(config, oracle, MemoryStore::new(), MemoryStore::new())
    }

    /// In-memory gateway with freshly generated halo2 keys.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let oracle = Halo2Oracle::setup(config.prover.circuit_k, config.tree.depth)
            .context("halo2 key generation failed")?;
        Ok(Self::with_oracle(config, Arc::new(oracle))?)
    }
}

impl<S: TreeStore, N: NullifierStore> VerificationGateway<S, N> {
    pub fn with_stores(
        config: &Config,
        oracle: Arc<dyn ProofOracle>,
        tree_store: S,
        nullifier_store: N,
    ) -> Result<Self> {
        let tree = MerkleTree::with_store(config.tree.depth, tree_store)?;
        info!(
            depth = tree.depth(),
            root_window = ?config.spend.root_window,
            owner = ?config.tree.owner,
            "verification gateway ready"
        );
        Ok(Self {
            tree,
            oracle,
            spends: SpendRegistry::new(nullifier_store),
            root_window: config.spend.root_window,
            owner: config.tree.owner,
        })
    }

    pub fn tree(&self) -> &MerkleTree<S> {
        &self.tree
    }

    pub fn insert_leaf(&self, leaf: Leaf) -> Result<Insertion> {
        self.tree.insert(leaf)
    }

    /// Clear slot `index`. Restricted to the configured owner, if any.
    pub fn remove_leaf(&self, requester: &Caller, index: u64) -> Result<MerklePath> {
        if let Some(owner) = &self.owner {
            if owner != requester {
                warn!(%requester, index, "removal refused");
                return Err(Error::Unauthorized);
            }
        }
        self.tree.remove(index)
    }

    pub fn root_at(&self, k: u64) -> Root {
        self.tree.root_at(k)
    }

    pub fn is_spent(&self, nullifier: &NullifierHash) -> Result<bool> {
        self.spends.is_spent(nullifier)
    }

    /// Verify `proof` against the root at `root_index` and spend `nullifier_hash`.
    ///
    /// A rejected request leaves no trace. `Err` means the request could not
    /// be decided at all (oracle or storage failure) and may be retried.
    #[tracing::instrument(level = "debug", skip(self, proof), fields(proof_len = proof.len()))]
    pub fn accept_spend(
        &self,
        proof: &[u8],
        root_index: u64,
        nullifier_hash: NullifierHash,
        caller: Caller,
    ) -> Result<SpendOutcome> {
        let root = self.tree.root_at(root_index);
        if root.is_zero() {
            return Ok(self.reject(Rejection::InvalidProof));
        }

        if let Some(window) = self.root_window {
            let oldest = self.tree.mutation_count().saturating_sub(window);
            if root_index < oldest {
                return Ok(self.reject(Rejection::StaleRoot { root_index, oldest }));
            }
        }

        let valid = match protocol::verify(&*self.oracle, proof, &root, &nullifier_hash) {
            Ok(valid) => valid,
            Err(Error::InvalidInput(msg)) => {
                debug!(%msg, "unverifiable public inputs");
                false
            }
            Err(err) => return Err(err),
        };
        if !valid {
            return Ok(self.reject(Rejection::InvalidProof));
        }

        if !self.spends.record(nullifier_hash)? {
            return Ok(self.reject(Rejection::NullifierAlreadyUsed));
        }

        info!(%nullifier_hash, %caller, root_index, "spend accepted");
        Ok(SpendOutcome::Accepted(SpendReceipt { nullifier_hash, caller, root_index, root }))
    }

    fn reject(&self, rejection: Rejection) -> SpendOutcome {
        warn!(%rejection, "spend rejected");
        SpendOutcome::Rejected(rejection)
    }
}

impl<S, N> fmt::Debug for VerificationGateway<S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationGateway")
            .field("root_window", &self.root_window)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
