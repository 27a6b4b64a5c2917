//! Off-thread proving with a cancellable completion handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use primitives::{Error, Result};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{check_witness, Proof, ProofOracle, Witness};

/// Pending proof. Resolves to the proof once the oracle finishes.
///
/// Dropping the handle cancels the task: a task that has not started skips
/// the oracle, and a running one has its result discarded.
#[derive(Debug)]
pub struct ProvingHandle {
    rx: oneshot::Receiver<Result<Proof>>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ProvingHandle {
    /// Non-blocking poll. `None` while the proof is still being produced.
    pub fn try_result(&mut self) -> Option<Result<Proof>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(self.closed_error())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // Only prevents a blocking task that has not started yet.
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> Error {
        if self.is_cancelled() {
            Error::Cancelled
        } else {
            Error::OracleUnavailable("proving task ended without a result".into())
        }
    }
}

impl Future for ProvingHandle {
    type Output = Result<Proof>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(self.closed_error())),
        }
    }
}

impl Drop for ProvingHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Check the witness, then run the oracle on tokio's blocking pool.
///
/// Structural and consistency errors are returned immediately and the oracle
/// is never invoked. Must be called from within a tokio runtime.
#[tracing::instrument(level = "debug", skip_all, fields(index = witness.index, root = %witness.root))]
pub fn prove<O: ProofOracle + ?Sized>(oracle: Arc<O>, witness: Witness) -> Result<ProvingHandle> {
    check_witness(&witness)?;
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::OracleUnavailable(format!("no async runtime: {e}")))?;

    let (tx, rx) = oneshot::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);

    let task = runtime.spawn_blocking(move || {
        if flag.load(Ordering::Acquire) {
            debug!("proving cancelled before start");
            return;
        }
        let started = Instant::now();
        let public = witness.public_inputs();
        let result = oracle.prove(&witness).map(|proof| Proof { proof, public });
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(p) => info!(elapsed_ms, bytes = p.proof.len(), "proof generated"),
            Err(err) => warn!(elapsed_ms, %err, "prover failed"),
        }
        if flag.load(Ordering::Acquire) {
            debug!("proving cancelled, result dropped");
            return;
        }
        let _ = tx.send(result);
    });

    Ok(ProvingHandle { rx, cancelled, task })
}

/// Synchronous form of [`prove`] for callers outside an async runtime.
pub fn prove_blocking<O: ProofOracle + ?Sized>(oracle: &O, witness: &Witness) -> Result<Proof> {
    check_witness(witness)?;
    let started = Instant::now();
    let proof = oracle.prove(witness)?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, bytes = proof.len(), "proof generated");
    Ok(Proof { proof, public: witness.public_inputs() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_witness, DigestOracle};
    use std::time::Duration;

    #[tokio::test]
    async fn proof_resolves_and_verifies() {
        let oracle = Arc::new(DigestOracle::new(b"task"));
        let w = sample_witness(4);
        let proof = prove(Arc::clone(&oracle), w.clone()).unwrap().await.unwrap();
        assert_eq!(proof.public, w.public_inputs());
        assert!(crate::verify(&*oracle, &proof.proof, &w.root, &w.nullifier_hash).unwrap());
    }

    #[tokio::test]
    async fn unsatisfiable_witness_fails_before_scheduling() {
        let oracle = Arc::new(DigestOracle::new(b"task"));
        let mut w = sample_witness(4);
        w.index ^= 1;
        let err = prove(Arc::clone(&oracle), w).unwrap_err();
        assert!(matches!(err, Error::UnsatisfiableWitness(_)));
        assert_eq!(oracle.prove_calls(), 0);
    }

    #[test]
    fn prove_needs_a_runtime() {
        let oracle = Arc::new(DigestOracle::new(b"task"));
        let err = prove(oracle, sample_witness(2)).unwrap_err();
        assert!(matches!(err, Error::OracleUnavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_proof_resolves_to_cancelled() {
        let oracle = Arc::new(DigestOracle::new(b"task").with_delay(Duration::from_millis(200)));
        let mut handle = prove(oracle, sample_witness(4)).unwrap();
        assert!(handle.try_result().is_none());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.await.unwrap_err(), Error::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn try_result_polls_until_done() {
        let oracle = Arc::new(DigestOracle::new(b"task").with_delay(Duration::from_millis(50)));
        let mut handle = prove(oracle, sample_witness(4)).unwrap();
        let proof = loop {
            if let Some(result) = handle.try_result() {
                break result.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert!(!proof.proof.is_empty());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn oracle_failure_surfaces_as_unavailable() {
        let oracle = Arc::new(DigestOracle::unavailable());
        let err = prove(oracle, sample_witness(3)).unwrap().await.unwrap_err();
        assert!(matches!(err, Error::OracleUnavailable(_)));
    }

    #[test]
    fn blocking_form_matches_async_form() {
        let oracle = DigestOracle::new(b"task");
        let w = sample_witness(3);
        let proof = prove_blocking(&oracle, &w).unwrap();
        assert!(crate::verify(&oracle, &proof.proof, &w.root, &w.nullifier_hash).unwrap());
    }
}
