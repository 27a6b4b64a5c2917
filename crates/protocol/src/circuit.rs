//! Halo2 membership-and-nullifier circuit over the Pallas base field.
//!
//! Instance layout (33 rows): rows 0..32 hold the root's big-endian bytes,
//! row 32 the nullifier hash. Private inputs are the hashed secret, caller,
//! leaf, sibling path and the index bits.

use ff::Field;
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{Advice, Circuit, Column, ConstraintSystem, Error as PlonkError, Expression, Instance, Selector},
    poly::Rotation,
};
use pasta_curves::Fp;
use primitives::{Result, ROOT_PUBLIC_LEN};

use crate::Witness;

/// Instance row of the nullifier hash.
pub const NULLIFIER_ROW: usize = ROOT_PUBLIC_LEN;

#[derive(Clone, Debug)]
pub struct MembershipConfig {
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    s_level: Selector,
    s_index: Selector,
    s_root: Selector,
    poseidon: Pow5Config<Fp, 3, 2>,
}

#[derive(Clone, Debug)]
pub struct MembershipCircuit {
    depth: usize,
    hashed_secret: Value<Fp>,
    caller: Value<Fp>,
    leaf: Value<Fp>,
    siblings: Vec<Value<Fp>>,
    /// Direction per level, leaf level first.
    index_bits: Vec<Value<Fp>>,
    root: Value<[u8; 32]>,
}

impl MembershipCircuit {
    /// Shape-only circuit for key generation.
    pub fn blank(depth: usize) -> Self {
        Self {
            depth,
            hashed_secret: Value::unknown(),
            caller: Value::unknown(),
            leaf: Value::unknown(),
            siblings: vec![Value::unknown(); depth],
            index_bits: vec![Value::unknown(); depth],
            root: Value::unknown(),
        }
    }

    pub fn from_witness(witness: &Witness) -> Result<Self> {
        let depth = witness.depth();
        let siblings = witness.merkle_path.to_fields()?;
        Ok(Self {
            depth,
            hashed_secret: Value::known(witness.hashed_secret.to_field()?),
            caller: Value::known(witness.caller.to_field()?),
            leaf: Value::known(witness.leaf.to_field()?),
            siblings: siblings.into_iter().map(Value::known).collect(),
            index_bits: (0..depth)
                .map(|level| Value::known(Fp::from((witness.index >> level) & 1)))
                .collect(),
            root: Value::known(witness.root.0),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn poseidon<const L: usize>(
    config: &MembershipConfig,
    mut layouter: impl Layouter<Fp>,
    message: [AssignedCell<Fp, Fp>; L],
) -> std::result::Result<AssignedCell<Fp, Fp>, PlonkError> {
    let chip = Pow5Chip::<Fp, 3, 2>::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<Fp, Pow5Chip<Fp, 3, 2>, P128Pow5T3, ConstantLength<L>, 3, 2>::init(
        chip,
        layouter.namespace(|| "init"),
    )?;
    hasher.hash(layouter.namespace(|| "hash"), message)
}

impl Circuit<Fp> for MembershipCircuit {
    type Config = MembershipConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::blank(self.depth)
    }

    fn configure(meta: &mut ConstraintSystem<Fp>) -> Self::Config {
        let advice = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        for column in &advice {
            meta.enable_equality(*column);
        }
        let instance = meta.instance_column();
        meta.enable_equality(instance);

        let rc_a = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        meta.enable_constant(rc_b[0]);
        let poseidon = Pow5Chip::<Fp, 3, 2>::configure::<P128Pow5T3>(
            meta,
            [advice[0], advice[1], advice[2]],
            advice[3],
            rc_a,
            rc_b,
        );

        let s_level = meta.selector();
        let s_index = meta.selector();
        let s_root = meta.selector();

        // Row: [bit, cur, sibling, left, right]. bit = 0 keeps cur on the left.
        meta.create_gate("merkle level", |meta| {
            let s = meta.query_selector(s_level);
            let bit = meta.query_advice(advice[0], Rotation::cur());
            let cur = meta.query_advice(advice[1], Rotation::cur());
            let sib = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(Fp::ONE);
            vec![
                s.clone() * bit.clone() * (one - bit.clone()),
                s.clone() * (left.clone() - (cur.clone() + bit * (sib.clone() - cur.clone()))),
                s * (right - (sib + cur - left)),
            ]
        });

        // Running sums, most significant limb first: acc' = base * acc + limb.
        meta.create_gate("index recomposition", |meta| {
            let s = meta.query_selector(s_index);
            let acc = meta.query_advice(advice[0], Rotation::cur());
            let bit = meta.query_advice(advice[1], Rotation::cur());
            let next = meta.query_advice(advice[0], Rotation::next());
            vec![s * (next - (acc * Fp::from(2u64) + bit))]
        });

        meta.create_gate("root recomposition", |meta| {
            let s = meta.query_selector(s_root);
            let acc = meta.query_advice(advice[0], Rotation::cur());
            let byte = meta.query_advice(advice[1], Rotation::cur());
            let next = meta.query_advice(advice[0], Rotation::next());
            vec![s * (next - (acc * Fp::from(256u64) + byte))]
        });

        MembershipConfig { advice, instance, s_level, s_index, s_root, poseidon }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<Fp>,
    ) -> std::result::Result<(), PlonkError> {
        let a = config.advice;

        let (hashed_secret, caller, leaf) = layouter.assign_region(
            || "private inputs",
            |mut region| {
                let hs = region.assign_advice(|| "hashed secret", a[0], 0, || self.hashed_secret)?;
                let caller = region.assign_advice(|| "caller", a[1], 0, || self.caller)?;
                let leaf = region.assign_advice(|| "leaf", a[2], 0, || self.leaf)?;
                Ok((hs, caller, leaf))
            },
        )?;

        let commitment = poseidon(&config, layouter.namespace(|| "leaf commitment"), [hashed_secret.clone()])?;
        layouter.assign_region(
            || "leaf binding",
            |mut region| region.constrain_equal(commitment.cell(), leaf.cell()),
        )?;

        let mut node = leaf.clone();
        let mut bits = Vec::with_capacity(self.depth);
        for level in 0..self.depth {
            let (bit, left, right) = layouter.assign_region(
                || format!("level {level}"),
                |mut region| {
                    config.s_level.enable(&mut region, 0)?;
                    let bit_value = self.index_bits[level];
                    let sib_value = self.siblings[level];
                    let cur_value = node.value().copied();

                    let bit = region.assign_advice(|| "bit", a[0], 0, || bit_value)?;
                    node.copy_advice(|| "cur", &mut region, a[1], 0)?;
                    region.assign_advice(|| "sibling", a[2], 0, || sib_value)?;

                    let left_value = bit_value
                        .zip(cur_value)
                        .zip(sib_value)
                        .map(|((b, c), s)| c + b * (s - c));
                    let right_value = cur_value
                        .zip(sib_value)
                        .zip(left_value)
                        .map(|((c, s), l)| s + c - l);
                    let left = region.assign_advice(|| "left", a[3], 0, || left_value)?;
                    let right = region.assign_advice(|| "right", a[4], 0, || right_value)?;
                    Ok((bit, left, right))
                },
            )?;
            node = poseidon(&config, layouter.namespace(|| format!("node {level}")), [left, right])?;
            bits.push(bit);
        }

        let index = layouter.assign_region(
            || "index bits",
            |mut region| {
                let mut acc = region.assign_advice_from_constant(|| "acc", a[0], 0, Fp::ZERO)?;
                for (row, bit) in bits.iter().rev().enumerate() {
                    config.s_index.enable(&mut region, row)?;
                    let bit = bit.copy_advice(|| "bit", &mut region, a[1], row)?;
                    let next = acc
                        .value()
                        .copied()
                        .zip(bit.value().copied())
                        .map(|(acc, b)| acc.double() + b);
                    acc = region.assign_advice(|| "acc", a[0], row + 1, || next)?;
                }
                Ok(acc)
            },
        )?;

        let (root, root_bytes) = layouter.assign_region(
            || "root bytes",
            |mut region| {
                let mut acc = region.assign_advice_from_constant(|| "acc", a[0], 0, Fp::ZERO)?;
                let mut bytes = Vec::with_capacity(ROOT_PUBLIC_LEN);
                for row in 0..ROOT_PUBLIC_LEN {
                    config.s_root.enable(&mut region, row)?;
                    let byte_value = self.root.map(|r| Fp::from(u64::from(r[row])));
                    let byte = region.assign_advice(|| "byte", a[1], row, || byte_value)?;
                    let next = acc
                        .value()
                        .copied()
                        .zip(byte_value)
                        .map(|(acc, b)| acc * Fp::from(256u64) + b);
                    acc = region.assign_advice(|| "acc", a[0], row + 1, || next)?;
                    bytes.push(byte);
                }
                Ok((acc, bytes))
            },
        )?;
        layouter.assign_region(
            || "root binding",
            |mut region| region.constrain_equal(root.cell(), node.cell()),
        )?;
        for (row, byte) in root_bytes.iter().enumerate() {
            layouter.constrain_instance(byte.cell(), config.instance, row)?;
        }

        let nullifier = poseidon(
            &config,
            layouter.namespace(|| "nullifier"),
            [index, hashed_secret, caller, leaf],
        )?;
        layouter.constrain_instance(nullifier.cell(), config.instance, NULLIFIER_ROW)
    }
}
