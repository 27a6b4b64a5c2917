//! Sibling paths and root reconstruction.

use pasta_curves::Fp;
use primitives::{
    encode::{field_from_bytes, parse_hex_word},
    poseidon2, Error, Leaf, Result, Root, MAX_DEPTH,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Sibling hashes from the leaf level up to the child of the root, each a
/// 32-byte big-endian word.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MerklePath(pub Vec<[u8; 32]>);

impl MerklePath {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[[u8; 32]] {
        &self.0
    }

    /// Parse a textual list such as `[0x01.., 0x02..]`. Brackets are optional and
    /// elements may be separated by commas or whitespace.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);
        inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| parse_hex_word(s).map_err(|e| Error::malformed_path(e.to_string())))
            .collect::<Result<Vec<_>>>()
            .map(MerklePath)
    }

    /// Decode every element, failing on the first non-canonical one.
    pub fn to_fields(&self) -> Result<Vec<Fp>> {
        path_fields(&self.0)
    }
}

impl From<Vec<[u8; 32]>> for MerklePath {
    fn from(v: Vec<[u8; 32]>) -> Self {
        MerklePath(v)
    }
}

impl Serialize for MerklePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|w| format!("0x{}", hex::encode(w))))
    }
}

impl<'de> Deserialize<'de> for MerklePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let words = Vec::<String>::deserialize(deserializer)?;
        words
            .iter()
            .map(|w| parse_hex_word(w).map_err(de::Error::custom))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(MerklePath)
    }
}

pub(crate) fn path_fields(path: &[[u8; 32]]) -> Result<Vec<Fp>> {
    path.iter()
        .enumerate()
        .map(|(level, word)| {
            field_from_bytes(word).ok_or_else(|| {
                Error::malformed_path(format!("sibling at level {level} is not a field element"))
            })
        })
        .collect()
}

/// Parent of `node` and `sibling`; `is_right` is the index bit at this level.
pub fn combine(node: Fp, sibling: Fp, is_right: bool) -> Fp {
    if is_right {
        poseidon2(sibling, node)
    } else {
        poseidon2(node, sibling)
    }
}

/// Fold `path` over `leaf` at `index` in a tree of `depth` levels.
pub fn reconstruct_root(leaf: &Leaf, index: u64, path: &[[u8; 32]], depth: usize) -> Result<Root> {
    check_depth(depth)?;
    if path.len() != depth {
        return Err(Error::malformed_path(format!(
            "expected {depth} siblings, got {}",
            path.len()
        )));
    }
    let capacity = capacity(depth);
    if index >= capacity {
        return Err(Error::IndexOutOfRange { index, capacity });
    }
    let siblings = path_fields(path)?;
    let mut node = leaf.to_field()?;
    for (level, sibling) in siblings.into_iter().enumerate() {
        node = combine(node, sibling, (index >> level) & 1 == 1);
    }
    Ok(Root::from_field(&node))
}

pub fn check_depth(depth: usize) -> Result<()> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(Error::invalid_input(format!(
            "tree depth must be in 1..={MAX_DEPTH}, got {depth}"
        )));
    }
    Ok(())
}

pub(crate) fn capacity(depth: usize) -> u64 {
    u32::try_from(depth)
        .ok()
        .and_then(|d| 1u64.checked_shl(d))
        .unwrap_or(u64::MAX)
}
