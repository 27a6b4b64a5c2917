//! Prover input: the private and public values of one membership claim.

use std::fmt;

use primitives::{
    derive_leaf, derive_nullifier, Caller, Error, HashedSecret, Leaf, NullifierHash, Result, Root,
};
use serde::{Deserialize, Serialize};
use tree::{check_depth, reconstruct_root, MerklePath};

use crate::PublicInputs;

/// Serialises as the prover input map, every value a `0x` hex word.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    #[serde(with = "index_word")]
    pub index: u64,
    pub hashed_secret: HashedSecret,
    pub caller: Caller,
    pub leaf: Leaf,
    pub root: Root,
    pub merkle_path: MerklePath,
    pub nullifier_hash: NullifierHash,
}

impl Witness {
    pub fn depth(&self) -> usize {
        self.merkle_path.len()
    }

    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs { root: self.root, nullifier_hash: self.nullifier_hash }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::invalid_input(e.to_string()))
    }

    /// Parses a prover input map and applies the same structural checks as
    /// [`build_witness`], taking the depth from the path length.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Witness = serde_json::from_str(json).map_err(|e| Error::invalid_input(e.to_string()))?;
        let depth = path_depth(&raw.merkle_path)?;
        build_witness(
            raw.index,
            raw.hashed_secret,
            raw.caller,
            raw.leaf,
            raw.root,
            raw.merkle_path.as_slice(),
            raw.nullifier_hash,
            depth,
        )
    }
}

// The hashed secret never reaches logs.
impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Witness")
            .field("index", &self.index)
            .field("hashed_secret", &"<redacted>")
            .field("caller", &self.caller)
            .field("leaf", &self.leaf)
            .field("root", &self.root)
            .field("depth", &self.depth())
            .field("nullifier_hash", &self.nullifier_hash)
            .finish()
    }
}

/// Assemble a witness, rejecting structurally invalid input. Does not check
/// that the values satisfy the membership relation; see [`check_witness`].
#[allow(clippy::too_many_arguments)]
pub fn build_witness(
    index: u64,
    hashed_secret: HashedSecret,
    caller: Caller,
    leaf: Leaf,
    root: Root,
    path: &[[u8; 32]],
    nullifier_hash: NullifierHash,
    depth: usize,
) -> Result<Witness> {
    check_depth(depth)?;
    if path.len() != depth {
        return Err(Error::malformed_path(format!(
            "expected {depth} siblings, got {}",
            path.len()
        )));
    }
    let merkle_path = MerklePath(path.to_vec());
    merkle_path.to_fields()?;

    let capacity = 1u64 << depth;
    if index >= capacity {
        return Err(Error::IndexOutOfRange { index, capacity });
    }
    hashed_secret.to_field()?;
    caller.to_field()?;
    leaf.to_field()?;
    root.to_field()?;
    nullifier_hash.to_field()?;

    Ok(Witness { index, hashed_secret, caller, leaf, root, merkle_path, nullifier_hash })
}

/// Recompute the leaf commitment, the root and the nullifier from the private
/// values and compare them with the claimed ones.
pub fn check_witness(witness: &Witness) -> Result<()> {
    let depth = path_depth(&witness.merkle_path)?;
    let leaf = derive_leaf(&witness.hashed_secret)?;
    if leaf != witness.leaf {
        return Err(Error::unsatisfiable("leaf is not the commitment of the hashed secret"));
    }

    let root = reconstruct_root(
        &witness.leaf,
        witness.index,
        witness.merkle_path.as_slice(),
        depth,
    )?;
    if root != witness.root {
        return Err(Error::unsatisfiable("path does not reconstruct the claimed root"));
    }

    let nullifier = derive_nullifier(
        witness.index,
        &witness.hashed_secret,
        &witness.caller,
        &witness.leaf,
    )?;
    if nullifier != witness.nullifier_hash {
        return Err(Error::unsatisfiable("nullifier hash does not match its inputs"));
    }
    Ok(())
}

fn path_depth(path: &MerklePath) -> Result<usize> {
    let depth = path.len();
    check_depth(depth)
        .map_err(|_| Error::malformed_path(format!("a path of {depth} siblings has no supported depth")))?;
    Ok(depth)
}

mod index_word {
    use primitives::encode::{decode_u64_word, encode_u64_word, parse_hex_word};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(index: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(encode_u64_word(*index))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        let word = parse_hex_word(&s).map_err(de::Error::custom)?;
        decode_u64_word(&word).map_err(de::Error::custom)
    }
}
