//! Error kinds shared by every ZkTree crate.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed secret, oversized word or non-canonical field encoding.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("index {index} is out of range for a tree of {capacity} leaves")]
    IndexOutOfRange { index: u64, capacity: u64 },

    #[error("tree is full ({capacity} leaves)")]
    TreeFull { capacity: u64 },

    #[error("slot {0} is already empty")]
    AlreadyEmpty(u64),

    #[error("malformed merkle path: {0}")]
    MalformedPath(String),

    /// The witness was rejected locally; the prover was never invoked.
    #[error("witness does not satisfy the membership relation: {0}")]
    UnsatisfiableWitness(String),

    #[error("proof rejected by verifier")]
    InvalidProof,

    #[error("nullifier already used")]
    NullifierAlreadyUsed,

    #[error("root index {root_index} is older than the accepted window (oldest {oldest})")]
    StaleRoot { root_index: u64, oldest: u64 },

    #[error("requester is not allowed to perform this operation")]
    Unauthorized,

    /// The prover or verifier backend failed to produce an answer. Callers may retry.
    #[error("proof oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("proving was cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn malformed_path(msg: impl Into<String>) -> Self {
        Error::MalformedPath(msg.into())
    }

    pub fn unsatisfiable(msg: impl Into<String>) -> Self {
        Error::UnsatisfiableWitness(msg.into())
    }
}
