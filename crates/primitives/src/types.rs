//! Core value types for the membership protocol.
//!
//! Every value is held as its canonical 32-byte big-endian encoding. Field
//! conversion is checked at the boundary with [`to_field`](Leaf::to_field).

use std::fmt;
use std::str::FromStr;

use ff::Field;
use pasta_curves::Fp;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::encode::{field_from_bytes, field_to_bytes, pad_word, parse_hex_word, WORD_LEN};
use crate::error::{Error, Result};

macro_rules! word_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(transparent)]
        pub struct $name(pub [u8; WORD_LEN]);

        impl $name {
            pub const ZERO: Self = Self([0u8; WORD_LEN]);

            pub fn from_field(f: &Fp) -> Self {
                Self(field_to_bytes(f))
            }

            /// Fails with `InvalidInput` when the bytes are not a canonical field element.
            pub fn to_field(&self) -> Result<Fp> {
                field_from_bytes(&self.0).ok_or_else(|| {
                    Error::invalid_input(format!(
                        concat!(stringify!($name), " {} is not a canonical field element"),
                        self
                    ))
                })
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; WORD_LEN]
            }

            pub fn as_bytes(&self) -> &[u8; WORD_LEN] {
                &self.0
            }
        }

        impl From<[u8; WORD_LEN]> for $name {
            fn from(bytes: [u8; WORD_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                parse_hex_word(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

word_type!(
    /// `Keccak256(secret)` reduced into the field. Treat as secret material.
    HashedSecret
);
word_type!(
    /// Commitment stored in the tree. `Leaf::ZERO` marks an empty slot.
    Leaf
);
word_type!(
    /// Merkle root. `Root::ZERO` means "no root" for history lookups.
    Root
);
word_type!(Caller);
word_type!(
    /// One-time spend tag bound to a leaf, its slot and the consuming caller.
    NullifierHash
);

impl Caller {
    /// Left-pad a 20-byte account address into a word.
    pub fn from_address(address: [u8; 20]) -> Self {
        let mut out = [0u8; WORD_LEN];
        out[WORD_LEN - 20..].copy_from_slice(&address);
        Self(out)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        pad_word(bytes).map(Self)
    }
}

/// Number of field elements a root contributes to the public inputs.
pub const ROOT_PUBLIC_LEN: usize = WORD_LEN;

impl Root {
    /// One field element per byte of the big-endian encoding, most significant first.
    pub fn byte_fields(&self) -> [Fp; ROOT_PUBLIC_LEN] {
        let mut out = [Fp::ZERO; ROOT_PUBLIC_LEN];
        for (dst, b) in out.iter_mut().zip(self.0.iter()) {
            *dst = Fp::from(u64::from(*b));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let leaf = Leaf::from_field(&Fp::from(7u64));
        let text = leaf.to_string();
        assert_eq!(text, format!("0x{}07", "00".repeat(31)));
        assert_eq!(text.parse::<Leaf>().unwrap(), leaf);
        assert_eq!("0x7".parse::<Leaf>().unwrap(), leaf);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let root = Root::from_field(&Fp::from(0xabu64));
        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, format!("\"0x{}ab\"", "00".repeat(31)));
        let back: Root = serde_json::from_str(&json).unwrap();
        assert_eq!(back, root);
        assert!(serde_json::from_str::<Root>("\"0xnothex\"").is_err());
    }

    #[test]
    fn non_canonical_word_is_invalid_input() {
        let leaf = Leaf([0xff; 32]);
        assert!(matches!(leaf.to_field(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn caller_from_address_left_pads() {
        let caller = Caller::from_address([0x11; 20]);
        assert!(caller.0[..12].iter().all(|&b| b == 0));
        assert!(caller.0[12..].iter().all(|&b| b == 0x11));
        assert_eq!(Caller::from_slice(&[0x11; 20]).unwrap(), caller);
        assert!(Caller::from_slice(&[0u8; 40]).is_err());
    }

    #[test]
    fn root_byte_fields_are_most_significant_first() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x12;
        bytes[31] = 0x34;
        let fields = Root(bytes).byte_fields();
        assert_eq!(fields[0], Fp::from(0x12u64));
        assert_eq!(fields[31], Fp::from(0x34u64));
        assert_eq!(fields[1], Fp::ZERO);
    }
}
