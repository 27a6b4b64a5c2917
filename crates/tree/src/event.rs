//! Leaf-added event payload.
//!
//! Wire layout: one 32-byte big-endian index word followed by `depth` 32-byte
//! sibling words, leaf level first. Clients read the index and path for their
//! freshly inserted leaf from this payload.

use primitives::{
    encode::{decode_u64_word, encode_u64_word, read_word, WORD_LEN},
    Error, Result,
};
use serde::{Deserialize, Serialize};

use crate::path::MerklePath;
use crate::Insertion;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LeafAdded {
    pub index: u64,
    pub path: MerklePath,
}

impl LeafAdded {
    pub fn encoded_len(depth: usize) -> usize {
        WORD_LEN * (1 + depth)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::encoded_len(self.path.len()));
        out.extend_from_slice(&encode_u64_word(self.index));
        for word in self.path.as_slice() {
            out.extend_from_slice(word);
        }
        out
    }

    pub fn decode(data: &[u8], depth: usize) -> Result<Self> {
        let expected = Self::encoded_len(depth);
        if data.len() != expected {
            return Err(Error::invalid_input(format!(
                "leaf-added payload is {} bytes, expected {expected}",
                data.len()
            )));
        }
        let mut cursor = data;
        let index = decode_u64_word(&read_word(&mut cursor)?)?;
        let path = (0..depth)
            .map(|_| read_word(&mut cursor))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { index, path: MerklePath(path) })
    }
}

impl From<&Insertion> for LeafAdded {
    fn from(ins: &Insertion) -> Self {
        Self { index: ins.index, path: ins.path.clone() }
    }
}
