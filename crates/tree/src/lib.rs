//! Fixed-depth Poseidon Merkle tree with an append-only root history.
//!
//! Leaves live in slots `0..2^depth`. Inserts take the lowest free slot,
//! removals overwrite a slot with the zero sentinel without compacting. Every
//! mutation appends the resulting root, so `root_at(k)` is the root right after
//! mutation `k` and `root_at(0)` is the empty-tree root.

pub mod event;
pub mod path;
pub mod store;

pub use event::LeafAdded;
pub use path::{check_depth, combine, reconstruct_root, MerklePath};
pub use store::{MemoryStore, Mutation, NodeKey, NullifierStore, TreeStore};

use ff::Field;
use parking_lot::RwLock;
use pasta_curves::Fp;
use primitives::{
    encode::{field_from_bytes, field_to_bytes},
    poseidon2, Error, Leaf, Result, Root,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::path::capacity;

/// Result of a successful insert: where the leaf went, its sibling path at
/// that moment, and the history index of the root it produced.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Insertion {
    pub index: u64,
    pub path: MerklePath,
    pub root_index: u64,
    pub root: Root,
}

/// Empty-subtree hashes: `zeros[0]` is the empty leaf, `zeros[l + 1] = H(zeros[l], zeros[l])`.
pub fn zero_hashes(depth: usize) -> Vec<Fp> {
    let mut zeros = Vec::with_capacity(depth + 1);
    zeros.push(Fp::ZERO);
    for level in 0..depth {
        zeros.push(poseidon2(zeros[level], zeros[level]));
    }
    zeros
}

#[derive(Debug)]
pub struct MerkleTree<S = MemoryStore> {
    depth: usize,
    zeros: Vec<Fp>,
    store: RwLock<S>,
}

impl MerkleTree<MemoryStore> {
    pub fn new(depth: usize) -> Result<Self> {
        Self::with_store(depth, MemoryStore::new())
    }
}

impl<S: TreeStore> MerkleTree<S> {
    /// Opens a tree over `store`, seeding the history with the empty root if
    /// the store has none yet.
    pub fn with_store(depth: usize, mut store: S) -> Result<Self> {
        check_depth(depth)?;
        let zeros = zero_hashes(depth);
        if store.root_count()? == 0 {
            store.append_root(Root::from_field(&zeros[depth]))?;
        }
        Ok(Self { depth, zeros, store: RwLock::new(store) })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> u64 {
        capacity(self.depth)
    }

    pub fn empty_root(&self) -> Root {
        Root::from_field(&self.zeros[self.depth])
    }

    pub fn insert(&self, leaf: Leaf) -> Result<Insertion> {
        if leaf.is_zero() {
            return Err(Error::invalid_input("the zero leaf marks empty slots and cannot be inserted"));
        }
        let value = leaf.to_field()?;
        let capacity = self.capacity();

        let mut store = self.store.write();
        let index = store
            .first_free_slot(capacity)?
            .ok_or(Error::TreeFull { capacity })?;
        let (path, mutation) = self.plan(&*store, index, leaf, value)?;
        let root = mutation.root;
        let root_index = store.apply(&mutation)?;
        debug!(index, root_index, %root, "leaf inserted");

        Ok(Insertion { index, path, root_index, root })
    }

    /// Clears a slot. The returned path is the slot's sibling path, which the
    /// removal does not change.
    pub fn remove(&self, index: u64) -> Result<MerklePath> {
        let capacity = self.capacity();
        if index >= capacity {
            return Err(Error::IndexOutOfRange { index, capacity });
        }

        let mut store = self.store.write();
        if store.get_leaf(index)?.map_or(true, |leaf| leaf.is_zero()) {
            return Err(Error::AlreadyEmpty(index));
        }
        let (path, mutation) = self.plan(&*store, index, Leaf::ZERO, Fp::ZERO)?;
        let root = mutation.root;
        let root_index = store.apply(&mutation)?;
        debug!(index, root_index, %root, "leaf removed");

        Ok(path)
    }

    /// Root after mutation `k`, or `Root::ZERO` when no such mutation exists.
    pub fn root_at(&self, k: u64) -> Root {
        match self.store.read().get_root(k) {
            Ok(root) => root.unwrap_or(Root::ZERO),
            Err(err) => {
                warn!(k, %err, "root lookup failed");
                Root::ZERO
            }
        }
    }

    pub fn current_root(&self) -> Root {
        let store = self.store.read();
        let latest = store
            .root_count()
            .and_then(|n| store.get_root(n.saturating_sub(1)));
        match latest {
            Ok(root) => root.unwrap_or(Root::ZERO),
            Err(err) => {
                warn!(%err, "current root lookup failed");
                Root::ZERO
            }
        }
    }

    /// Number of inserts and removals applied so far.
    pub fn mutation_count(&self) -> u64 {
        match self.store.read().root_count() {
            Ok(n) => n.saturating_sub(1),
            Err(err) => {
                warn!(%err, "root count lookup failed");
                0
            }
        }
    }

    /// Current sibling path of `index`. Valid against `current_root()` only
    /// until the next mutation.
    pub fn path(&self, index: u64) -> Result<MerklePath> {
        self.check_index(index)?;
        let store = self.store.read();
        self.siblings(&*store, index).map(|(path, _)| path)
    }

    pub fn leaf(&self, index: u64) -> Result<Leaf> {
        self.check_index(index)?;
        Ok(self.store.read().get_leaf(index)?.unwrap_or(Leaf::ZERO))
    }

    /// Run `f` against the store under the read lock.
    pub fn with_store_read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.store.read())
    }

    fn check_index(&self, index: u64) -> Result<()> {
        let capacity = self.capacity();
        if index >= capacity {
            return Err(Error::IndexOutOfRange { index, capacity });
        }
        Ok(())
    }

    fn node_at(&self, store: &S, level: usize, index: u64) -> Result<Fp> {
        let stored = if level == 0 {
            store.get_leaf(index)?.map(|leaf| leaf.0)
        } else {
            store.get_node((level, index))?
        };
        match stored {
            None => Ok(self.zeros[level]),
            Some(bytes) => field_from_bytes(&bytes).ok_or_else(|| {
                Error::Storage(format!("node ({level}, {index}) is not a field element"))
            }),
        }
    }

    fn siblings(&self, store: &S, index: u64) -> Result<(MerklePath, Vec<Fp>)> {
        let mut words = Vec::with_capacity(self.depth);
        let mut fields = Vec::with_capacity(self.depth);
        for level in 0..self.depth {
            let sibling = self.node_at(store, level, (index >> level) ^ 1)?;
            words.push(field_to_bytes(&sibling));
            fields.push(sibling);
        }
        Ok((MerklePath(words), fields))
    }

    // Computes every write of a mutation without touching the store. Siblings
    // along the path are unaffected by the write, so the path read up front is
    // also the path afterwards.
    fn plan(&self, store: &S, index: u64, leaf: Leaf, value: Fp) -> Result<(MerklePath, Mutation)> {
        let (path, siblings) = self.siblings(store, index)?;

        let mut nodes = Vec::with_capacity(self.depth);
        let mut node = value;
        let mut position = index;
        for (level, sibling) in siblings.into_iter().enumerate() {
            node = combine(node, sibling, position & 1 == 1);
            position >>= 1;
            let stored = (node != self.zeros[level + 1]).then(|| field_to_bytes(&node));
            nodes.push(((level + 1, position), stored));
        }
        let mutation = Mutation { index, leaf, nodes, root: Root::from_field(&node) };
        Ok((path, mutation))
    }
}
