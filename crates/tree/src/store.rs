//! Storage backends for tree nodes, root history and spent nullifiers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;

use primitives::{Leaf, NullifierHash, Result, Root};
use tracing::warn;

/// Node coordinates: `level` 0 is the leaf layer, `level == depth` holds the root.
pub type NodeKey = (usize, u64);

/// Every write produced by one tree mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub index: u64,
    /// `Leaf::ZERO` clears the slot.
    pub leaf: Leaf,
    /// Ancestors from level 1 up to the root level. `None` restores the default.
    pub nodes: Vec<(NodeKey, Option<[u8; 32]>)>,
    pub root: Root,
}

/// Backing storage for a [`MerkleTree`](crate::MerkleTree).
///
/// Stores hold only non-default values. A missing leaf is the zero sentinel
/// and a missing node is the empty-subtree hash for its level.
pub trait TreeStore: Debug + Send + Sync {
    fn get_leaf(&self, index: u64) -> Result<Option<Leaf>>;

    /// Writing `Leaf::ZERO` clears the slot.
    fn set_leaf(&mut self, index: u64, leaf: Leaf) -> Result<()>;

    fn get_node(&self, key: NodeKey) -> Result<Option<[u8; 32]>>;

    /// `None` clears the node back to its empty-subtree default.
    fn set_node(&mut self, key: NodeKey, node: Option<[u8; 32]>) -> Result<()>;

    /// Appends a root and returns its history index.
    fn append_root(&mut self, root: Root) -> Result<u64>;

    fn get_root(&self, k: u64) -> Result<Option<Root>>;

    fn root_count(&self) -> Result<u64>;

    /// Writes `mutation` and appends its root, returning the root's history
    /// index. On error the store must hold exactly what it held before.
    ///
    /// The default writes one key at a time and restores the previous leaf and
    /// nodes if a later write fails. Backends with transactions should commit
    /// the whole mutation in one step instead.
    fn apply(&mut self, mutation: &Mutation) -> Result<u64> {
        let previous_leaf = self.get_leaf(mutation.index)?.unwrap_or(Leaf::ZERO);
        let mut previous_nodes = Vec::with_capacity(mutation.nodes.len());
        for (key, _) in &mutation.nodes {
            previous_nodes.push((*key, self.get_node(*key)?));
        }

        match write_mutation(self, mutation) {
            Ok(root_index) => Ok(root_index),
            Err(err) => {
                let restore = Mutation {
                    index: mutation.index,
                    leaf: previous_leaf,
                    nodes: previous_nodes,
                    root: mutation.root,
                };
                if let Err(rollback) = restore_nodes(self, &restore) {
                    warn!(index = mutation.index, %rollback, "rollback after failed mutation did not complete");
                }
                Err(err)
            }
        }
    }

    /// Lowest slot below `capacity` holding the zero sentinel.
    fn first_free_slot(&self, capacity: u64) -> Result<Option<u64>> {
        for index in 0..capacity {
            if self.get_leaf(index)?.is_none() {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

fn write_mutation<S: TreeStore + ?Sized>(store: &mut S, mutation: &Mutation) -> Result<u64> {
    store.set_leaf(mutation.index, mutation.leaf)?;
    for (key, node) in &mutation.nodes {
        store.set_node(*key, *node)?;
    }
    store.append_root(mutation.root)
}

// Writes back leaf and nodes only; the root was never appended.
fn restore_nodes<S: TreeStore + ?Sized>(store: &mut S, previous: &Mutation) -> Result<()> {
    store.set_leaf(previous.index, previous.leaf)?;
    for (key, node) in &previous.nodes {
        store.set_node(*key, *node)?;
    }
    Ok(())
}

/// Registry of nullifier hashes that have already been spent.
pub trait NullifierStore: Debug + Send + Sync {
    fn has_nullifier(&self, nullifier: &NullifierHash) -> Result<bool>;

    /// Returns `true` if the nullifier was not present before.
    fn insert_nullifier(&mut self, nullifier: NullifierHash) -> Result<bool>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    leaves: BTreeMap<u64, Leaf>,
    nodes: HashMap<NodeKey, [u8; 32]>,
    roots: Vec<Root>,
    nullifiers: HashSet<NullifierHash>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }
}

impl TreeStore for MemoryStore {
    fn get_leaf(&self, index: u64) -> Result<Option<Leaf>> {
        Ok(self.leaves.get(&index).copied())
    }

    fn set_leaf(&mut self, index: u64, leaf: Leaf) -> Result<()> {
        if leaf.is_zero() {
            self.leaves.remove(&index);
        } else {
            self.leaves.insert(index, leaf);
        }
        Ok(())
    }

    fn get_node(&self, key: NodeKey) -> Result<Option<[u8; 32]>> {
        Ok(self.nodes.get(&key).copied())
    }

    fn set_node(&mut self, key: NodeKey, node: Option<[u8; 32]>) -> Result<()> {
        match node {
            Some(bytes) => self.nodes.insert(key, bytes),
            None => self.nodes.remove(&key),
        };
        Ok(())
    }

    fn append_root(&mut self, root: Root) -> Result<u64> {
        self.roots.push(root);
        Ok(self.roots.len() as u64 - 1)
    }

    fn get_root(&self, k: u64) -> Result<Option<Root>> {
        Ok(usize::try_from(k).ok().and_then(|k| self.roots.get(k)).copied())
    }

    fn root_count(&self) -> Result<u64> {
        Ok(self.roots.len() as u64)
    }

    // Memory writes cannot fail, so there is nothing to roll back.
    fn apply(&mut self, mutation: &Mutation) -> Result<u64> {
        write_mutation(self, mutation)
    }

    // Occupied slots are sorted, so the first gap is the lowest free index.
    fn first_free_slot(&self, capacity: u64) -> Result<Option<u64>> {
        let mut expected = 0u64;
        for &index in self.leaves.keys() {
            if index != expected {
                break;
            }
            expected += 1;
        }
        Ok((expected < capacity).then_some(expected))
    }
}

impl NullifierStore for MemoryStore {
    fn has_nullifier(&self, nullifier: &NullifierHash) -> Result<bool> {
        Ok(self.nullifiers.contains(nullifier))
    }

    fn insert_nullifier(&mut self, nullifier: NullifierHash) -> Result<bool> {
        Ok(self.nullifiers.insert(nullifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: u8) -> Leaf {
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        Leaf(bytes)
    }

    #[test]
    fn first_free_slot_finds_gaps() {
        let mut store = MemoryStore::new();
        assert_eq!(store.first_free_slot(4).unwrap(), Some(0));
        for i in 0..3 {
            store.set_leaf(i, leaf(1)).unwrap();
        }
        assert_eq!(store.first_free_slot(4).unwrap(), Some(3));
        store.set_leaf(1, Leaf::ZERO).unwrap();
        assert_eq!(store.first_free_slot(4).unwrap(), Some(1));
        store.set_leaf(1, leaf(2)).unwrap();
        store.set_leaf(3, leaf(2)).unwrap();
        assert_eq!(store.first_free_slot(4).unwrap(), None);
    }

    #[test]
    fn default_scan_matches_memory_override() {
        #[derive(Debug)]
        struct Scan(MemoryStore);
        impl TreeStore for Scan {
            fn get_leaf(&self, index: u64) -> Result<Option<Leaf>> { self.0.get_leaf(index) }
            fn set_leaf(&mut self, index: u64, leaf: Leaf) -> Result<()> { self.0.set_leaf(index, leaf) }
            fn get_node(&self, key: NodeKey) -> Result<Option<[u8; 32]>> { self.0.get_node(key) }
            fn set_node(&mut self, key: NodeKey, node: Option<[u8; 32]>) -> Result<()> { self.0.set_node(key, node) }
            fn append_root(&mut self, root: Root) -> Result<u64> { self.0.append_root(root) }
            fn get_root(&self, k: u64) -> Result<Option<Root>> { self.0.get_root(k) }
            fn root_count(&self) -> Result<u64> { self.0.root_count() }
        }

        let mut scan = Scan(MemoryStore::new());
        for i in [0u64, 1, 2, 5] {
            scan.set_leaf(i, leaf(9)).unwrap();
        }
        assert_eq!(scan.first_free_slot(8).unwrap(), Some(3));
        assert_eq!(scan.0.first_free_slot(8).unwrap(), Some(3));
    }

    #[test]
    fn nullifiers_insert_once() {
        let mut store = MemoryStore::new();
        let nf = NullifierHash([7u8; 32]);
        assert!(!store.has_nullifier(&nf).unwrap());
        assert!(store.insert_nullifier(nf).unwrap());
        assert!(!store.insert_nullifier(nf).unwrap());
        assert!(store.has_nullifier(&nf).unwrap());
    }

    #[test]
    fn roots_are_indexed_in_order() {
        let mut store = MemoryStore::new();
        assert_eq!(store.append_root(Root([1; 32])).unwrap(), 0);
        assert_eq!(store.append_root(Root([2; 32])).unwrap(), 1);
        assert_eq!(store.get_root(1).unwrap(), Some(Root([2; 32])));
        assert_eq!(store.get_root(2).unwrap(), None);
        assert_eq!(store.root_count().unwrap(), 2);
    }
}
