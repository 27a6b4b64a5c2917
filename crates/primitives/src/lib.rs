//! Field types, encodings and hash derivations for the ZkTree membership protocol.

pub mod encode;
pub mod error;
pub mod hash;
pub mod types;
pub mod digest;

pub use pasta_curves::Fp;

pub use digest::*;
pub use encode::*;
pub use error::{Error, Result};
pub use hash::*;
pub use types::*;

/// Default tree depth.
pub const DEFAULT_DEPTH: usize = 6;
/// Largest depth the store accepts.
pub const MAX_DEPTH: usize = 20;
