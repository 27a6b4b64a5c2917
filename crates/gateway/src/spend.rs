//! Spend admission: outcomes and the one-time nullifier registry.

use std::fmt;

use parking_lot::Mutex;
use primitives::{Caller, Error, NullifierHash, Result, Root};
use serde::{Deserialize, Serialize};
use tree::{MemoryStore, NullifierStore};

/// Why a well-formed spend request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// The proof did not verify, or the root index names no known root.
    InvalidProof,
    NullifierAlreadyUsed,
    StaleRoot { root_index: u64, oldest: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidProof => f.write_str("invalid proof"),
            Rejection::NullifierAlreadyUsed => f.write_str("nullifier already used"),
            Rejection::StaleRoot { root_index, oldest } => {
                write!(f, "stale root {root_index} (oldest accepted {oldest})")
            }
        }
    }
}

impl From<Rejection> for Error {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::InvalidProof => Error::InvalidProof,
            Rejection::NullifierAlreadyUsed => Error::NullifierAlreadyUsed,
            Rejection::StaleRoot { root_index, oldest } => Error::StaleRoot { root_index, oldest },
        }
    }
}

/// Record of an accepted spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendReceipt {
    pub nullifier_hash: NullifierHash,
    pub caller: Caller,
    pub root_index: u64,
    pub root: Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpendOutcome {
    Accepted(SpendReceipt),
    Rejected(Rejection),
}

impl SpendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SpendOutcome::Accepted(_))
    }

    /// Rejections become the matching [`Error`] kind.
    pub fn into_result(self) -> Result<SpendReceipt> {
        match self {
            SpendOutcome::Accepted(receipt) => Ok(receipt),
            SpendOutcome::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// Spent nullifiers. Check and insert happen under one lock, so of any number
/// of concurrent records of the same nullifier exactly one succeeds.
#[derive(Debug, Default)]
pub struct SpendRegistry<N = MemoryStore> {
    store: Mutex<N>,
}

impl<N: NullifierStore> SpendRegistry<N> {
    pub fn new(store: N) -> Self {
        Self { store: Mutex::new(store) }
    }

    pub fn is_spent(&self, nullifier: &NullifierHash) -> Result<bool> {
        self.store.lock().has_nullifier(nullifier)
    }

    /// `true` if `nullifier` was unspent and is now recorded.
    pub fn record(&self, nullifier: NullifierHash) -> Result<bool> {
        let mut store = self.store.lock();
        if store.has_nullifier(&nullifier)? {
            return Ok(false);
        }
        store.insert_nullifier(nullifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn nf(byte: u8) -> NullifierHash {
        let mut word = [0u8; 32];
        word[31] = byte;
        NullifierHash(word)
    }

    #[test]
    fn record_is_one_time() {
        let registry = SpendRegistry::new(MemoryStore::new());
        assert!(!registry.is_spent(&nf(1)).unwrap());
        assert!(registry.record(nf(1)).unwrap());
        assert!(!registry.record(nf(1)).unwrap());
        assert!(registry.is_spent(&nf(1)).unwrap());
        assert!(!registry.is_spent(&nf(2)).unwrap());
    }

    #[test]
    fn concurrent_records_admit_one() {
        let registry = Arc::new(SpendRegistry::new(MemoryStore::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.record(nf(9)).unwrap())
            })
            .collect();
        let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn rejections_map_to_error_kinds() {
        let stale = SpendOutcome::Rejected(Rejection::StaleRoot { root_index: 1, oldest: 3 });
        assert_eq!(stale.into_result().unwrap_err(), Error::StaleRoot { root_index: 1, oldest: 3 });
        assert_eq!(
            SpendOutcome::Rejected(Rejection::NullifierAlreadyUsed).into_result().unwrap_err(),
            Error::NullifierAlreadyUsed
        );
    }
}
