//! End-to-end proofs with the halo2 backend.

use std::sync::{Arc, OnceLock};

use primitives::{
    derive_hashed_secret, derive_leaf, derive_nullifier, Caller, Error, Fp, NullifierHash,
};
use protocol::{build_witness, prove, prove_blocking, verify, Halo2Oracle, Witness, DEFAULT_CIRCUIT_K};
use tree::MerkleTree;

const DEPTH: usize = 6;

fn oracle() -> Arc<Halo2Oracle> {
    static ORACLE: OnceLock<Arc<Halo2Oracle>> = OnceLock::new();
    ORACLE
        .get_or_init(|| Arc::new(Halo2Oracle::setup(DEFAULT_CIRCUIT_K, DEPTH).unwrap()))
        .clone()
}

fn witness_for(tree: &MerkleTree, secret: &[u8], caller: Caller) -> Witness {
    let hs = derive_hashed_secret(secret).unwrap();
    let leaf = derive_leaf(&hs).unwrap();
    let ins = tree.insert(leaf).unwrap();
    let nf = derive_nullifier(ins.index, &hs, &caller, &leaf).unwrap();
    build_witness(ins.index, hs, caller, leaf, ins.root, ins.path.as_slice(), nf, DEPTH).unwrap()
}

#[test]
fn proof_is_bound_to_its_historical_root() {
    let oracle = oracle();
    let tree = MerkleTree::new(DEPTH).unwrap();
    let caller = Caller::from_address([0x11; 20]);

    let _first = witness_for(&tree, b"first", caller);
    let w = witness_for(&tree, b"second", caller);
    assert_eq!(w.index, 1);
    let r2 = tree.root_at(2);
    assert_eq!(w.root, r2);

    let proof = prove_blocking(&*oracle, &w).unwrap();
    assert!(verify(&*oracle, &proof.proof, &r2, &w.nullifier_hash).unwrap());

    tree.remove(0).unwrap();
    tree.insert(derive_leaf(&derive_hashed_secret(b"third").unwrap()).unwrap()).unwrap();
    let r4 = tree.root_at(4);
    assert_ne!(r4, r2);
    assert!(!verify(&*oracle, &proof.proof, &r4, &w.nullifier_hash).unwrap());

    let other_nf = NullifierHash::from_field(&Fp::from(5u64));
    assert!(!verify(&*oracle, &proof.proof, &r2, &other_nf).unwrap());

    let mut tampered = proof.proof.clone();
    let mid = tampered.len() / 2;
    tampered[mid] ^= 0x01;
    assert!(!verify(&*oracle, &tampered, &r2, &w.nullifier_hash).unwrap());
    assert!(!verify(&*oracle, &[], &r2, &w.nullifier_hash).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_proof_verifies() {
    let oracle = oracle();
    let tree = MerkleTree::new(DEPTH).unwrap();
    let w = witness_for(&tree, b"async", Caller::from_address([0x22; 20]));

    let handle = prove(Arc::clone(&oracle), w.clone()).unwrap();
    let proof = handle.await.unwrap();
    assert_eq!(proof.public, w.public_inputs());
    assert!(verify(&*oracle, &proof.proof, &w.root, &w.nullifier_hash).unwrap());
}

#[test]
fn depth_mismatch_is_rejected_before_proving() {
    let oracle = oracle();
    let tree = MerkleTree::new(4).unwrap();
    let hs = derive_hashed_secret(b"shallow").unwrap();
    let leaf = derive_leaf(&hs).unwrap();
    let ins = tree.insert(leaf).unwrap();
    let caller = Caller::from_address([0x33; 20]);
    let nf = derive_nullifier(ins.index, &hs, &caller, &leaf).unwrap();
    let w = build_witness(ins.index, hs, caller, leaf, ins.root, ins.path.as_slice(), nf, 4).unwrap();

    let err = prove_blocking(&*oracle, &w).unwrap_err();
    assert!(matches!(err, Error::MalformedPath(_)));
}
