//! Commitment and nullifier derivations.
//!
//! secret -> HashedSecret = Keccak256(secret) mod ORDER
//! HashedSecret -> Leaf = Poseidon1(hs)
//! (index, hs, caller, leaf) -> NullifierHash = Poseidon4(..)

use pasta_curves::Fp;
use sha3::{Digest, Keccak256};

use crate::encode::reduce_bytes;
use crate::error::{Error, Result};
use crate::hash::{poseidon1, poseidon4};
use crate::types::{Caller, HashedSecret, Leaf, NullifierHash};

pub fn derive_hashed_secret(secret: &[u8]) -> Result<HashedSecret> {
    if secret.is_empty() {
        return Err(Error::invalid_input("secret must not be empty"));
    }
    let digest: [u8; 32] = Keccak256::digest(secret).into();
    Ok(HashedSecret::from_field(&reduce_bytes(&digest)))
}

pub fn derive_leaf(hashed_secret: &HashedSecret) -> Result<Leaf> {
    let hs = hashed_secret.to_field()?;
    Ok(Leaf::from_field(&poseidon1(hs)))
}

/// Binds the spend to the slot it was inserted at and to the consuming caller.
/// The same leaf spent by a different caller yields a different nullifier.
pub fn derive_nullifier(
    index: u64,
    hashed_secret: &HashedSecret,
    caller: &Caller,
    leaf: &Leaf,
) -> Result<NullifierHash> {
    let out = poseidon4(
        Fp::from(index),
        hashed_secret.to_field()?,
        caller.to_field()?,
        leaf.to_field()?,
    );
    Ok(NullifierHash::from_field(&out))
}
