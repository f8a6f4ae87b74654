//! Binary Merkle tree over serialized definitions.
//!
//! Leaves are hashed as `SHA-256(0x00 || leaf)` and sorted by that hash, so
//! the root does not depend on the order records were assembled in. Inner
//! nodes are `SHA-256(0x01 || left || right)`. A level with an odd number of
//! nodes carries its last node up unchanged.

use std::collections::HashMap;

use chaindefs_types::Digest;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{MerkleError, MerkleResult};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Binary Merkle tree with inclusion proofs.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: Digest,
    /// Level 0 holds the sorted leaf hashes, the last level holds the root.
    levels: Vec<Vec<Digest>>,
    /// Leaf hash to position in level 0.
    positions: HashMap<Digest, usize>,
}

impl MerkleTree {
    /// Build a tree from raw leaf values. Identical leaves collapse into one.
    ///
    /// An empty input produces the hash of the empty leaf as root.
    pub fn build<I, B>(leaves: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut hashed: Vec<Digest> = leaves
            .into_iter()
            .map(|leaf| leaf_hash(leaf.as_ref()))
            .collect();
        hashed.sort();
        hashed.dedup();

        if hashed.is_empty() {
            return Self {
                root: leaf_hash(&[]),
                levels: vec![],
                positions: HashMap::new(),
            };
        }

        let positions = hashed.iter().enumerate().map(|(i, h)| (*h, i)).collect();
        let mut levels = vec![hashed];

        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Digest> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => node_hash(left, right),
                    // odd node, carried up
                    _ => pair[0],
                })
                .collect();
            levels.push(next);
        }

        let root = levels[levels.len() - 1][0];
        Self {
            root,
            levels,
            positions,
        }
    }

    /// The root hash of the tree.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Number of distinct leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Returns `true` if `leaf` is committed by this tree.
    pub fn contains(&self, leaf: &[u8]) -> bool {
        self.positions.contains_key(&leaf_hash(leaf))
    }

    /// Inclusion proof for a leaf value.
    pub fn proof(&self, leaf: &[u8]) -> MerkleResult<MerkleProof> {
        let hash = leaf_hash(leaf);
        let mut idx = *self
            .positions
            .get(&hash)
            .ok_or(MerkleError::NotFound(hash))?;

        let mut path = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            if let Some(sibling) = level.get(sibling_idx) {
                let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
                path.push(ProofStep {
                    sibling: *sibling,
                    side,
                });
            }
            // No sibling: the node was carried up unchanged.
            idx /= 2;
        }

        Ok(MerkleProof { path })
    }
}

/// One level of an inclusion proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub side: Side,
}

/// Merkle inclusion proof: sibling hashes from leaf to root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Maximum number of steps the one-byte count can describe.
    pub const MAX_STEPS: usize = u8::MAX as usize;

    /// Recompute the root from a leaf value and this path.
    pub fn compute_root(&self, leaf: &[u8]) -> Digest {
        self.path
            .iter()
            .fold(leaf_hash(leaf), |current, step| match step.side {
                Side::Left => node_hash(&step.sibling, &current),
                Side::Right => node_hash(&current, &step.sibling),
            })
    }

    /// Verify that `leaf` is committed by `root`.
    pub fn verify(&self, leaf: &[u8], root: &Digest) -> bool {
        self.compute_root(leaf) == *root
    }

    /// Length of the encoded form in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + self.path.len() * 32 + self.path.len().div_ceil(8)
    }

    /// Encode as `count || siblings || side bits`.
    ///
    /// Bit `i` of the trailing bitmap (little-endian within each byte) is set
    /// when sibling `i` sits on the left.
    pub fn encode(&self) -> MerkleResult<Vec<u8>> {
        let count = self.path.len();
        if count > Self::MAX_STEPS {
            return Err(MerkleError::TooDeep(count));
        }
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(count as u8);
        for step in &self.path {
            out.extend_from_slice(step.sibling.as_bytes());
        }
        let mut sides = vec![0u8; count.div_ceil(8)];
        for (i, step) in self.path.iter().enumerate() {
            if step.side == Side::Left {
                sides[i / 8] |= 1 << (i % 8);
            }
        }
        out.extend_from_slice(&sides);
        Ok(out)
    }

    /// Decode a proof from the start of `data`. Returns (proof, bytes_consumed).
    pub fn decode(data: &[u8]) -> MerkleResult<(Self, usize)> {
        let count = *data
            .first()
            .ok_or_else(|| MerkleError::MalformedProof("empty input".into()))?
            as usize;
        let hashes_end = 1 + count * 32;
        let total = hashes_end + count.div_ceil(8);
        if data.len() < total {
            return Err(MerkleError::MalformedProof(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }

        let sides = &data[hashes_end..total];
        let path = data[1..hashes_end]
            .chunks_exact(32)
            .enumerate()
            .map(|(i, chunk)| {
                let sibling = Digest::from_slice(chunk)
                    .map_err(|e| MerkleError::MalformedProof(e.to_string()))?;
                let side = if sides[i / 8] & (1 << (i % 8)) != 0 {
                    Side::Left
                } else {
                    Side::Right
                };
                Ok(ProofStep { sibling, side })
            })
            .collect::<MerkleResult<Vec<_>>>()?;

        Ok((Self { path }, total))
    }
}

/// Hash of a leaf value.
pub fn leaf_hash(leaf: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    finish(hasher)
}

/// Hash of an inner node.
pub fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    finish(hasher)
}

fn finish(hasher: Sha256) -> Digest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Digest::from_hash(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaves(n: u8) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![b'l', i]).collect()
    }

    fn sorted_hashes(values: &[Vec<u8>]) -> Vec<Digest> {
        let mut hashes: Vec<Digest> = values.iter().map(|v| leaf_hash(v)).collect();
        hashes.sort();
        hashes
    }

    #[test]
    fn empty_tree_root_is_empty_leaf_hash() {
        let tree = MerkleTree::build(Vec::<Vec<u8>>::new());
        assert_eq!(tree.root(), leaf_hash(b""));
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn single_leaf_is_root() {
        let tree = MerkleTree::build([b"only".to_vec()]);
        assert_eq!(tree.root(), leaf_hash(b"only"));
        let proof = tree.proof(b"only").unwrap();
        assert!(proof.path.is_empty());
        assert!(proof.verify(b"only", &tree.root()));
    }

    #[test]
    fn two_leaves_hash_in_sorted_order() {
        let values = leaves(2);
        let h = sorted_hashes(&values);
        let tree = MerkleTree::build(&values);
        assert_eq!(tree.root(), node_hash(&h[0], &h[1]));

        // Input order does not matter.
        let reversed: Vec<_> = values.iter().rev().cloned().collect();
        assert_eq!(MerkleTree::build(&reversed).root(), tree.root());
    }

    #[test]
    fn odd_node_is_carried_up_unchanged() {
        let values = leaves(3);
        let h = sorted_hashes(&values);
        let tree = MerkleTree::build(&values);
        assert_eq!(tree.root(), node_hash(&node_hash(&h[0], &h[1]), &h[2]));

        // The carried leaf's proof has a single step: the left subtree.
        let carried = values.iter().find(|v| leaf_hash(v) == h[2]).unwrap();
        let proof = tree.proof(carried).unwrap();
        assert_eq!(proof.path.len(), 1);
        assert_eq!(proof.path[0].side, Side::Left);
        assert_eq!(proof.path[0].sibling, node_hash(&h[0], &h[1]));
    }

    #[test]
    fn five_leaves_layout() {
        let values = leaves(5);
        let h = sorted_hashes(&values);
        let tree = MerkleTree::build(&values);
        let left = node_hash(&node_hash(&h[0], &h[1]), &node_hash(&h[2], &h[3]));
        assert_eq!(tree.root(), node_hash(&left, &h[4]));
    }

    #[test]
    fn duplicate_leaves_collapse() {
        let tree = MerkleTree::build([b"a".to_vec(), b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.root(), MerkleTree::build([b"a", b"b"]).root());
    }

    #[test]
    fn proof_verifies_for_all_leaves() {
        let values = leaves(11);
        let tree = MerkleTree::build(&values);
        for v in &values {
            let proof = tree.proof(v).expect("proof should exist");
            assert!(proof.verify(v, &tree.root()));
        }
    }

    #[test]
    fn power_of_two_proofs_have_full_depth() {
        let values = leaves(8);
        let tree = MerkleTree::build(&values);
        for v in &values {
            assert_eq!(tree.proof(v).unwrap().path.len(), 3);
        }
    }

    #[test]
    fn missing_leaf_is_not_found() {
        let tree = MerkleTree::build(leaves(4));
        let err = tree.proof(b"absent").unwrap_err();
        assert_eq!(err, MerkleError::NotFound(leaf_hash(b"absent")));
        assert!(!tree.contains(b"absent"));
    }

    #[test]
    fn proof_against_other_root_fails() {
        let a = MerkleTree::build(leaves(4));
        let b = MerkleTree::build(leaves(5));
        let v = &leaves(4)[0];
        assert!(!a.proof(v).unwrap().verify(v, &b.root()));
    }

    #[test]
    fn flipped_side_fails() {
        let values = leaves(4);
        let tree = MerkleTree::build(&values);
        let mut proof = tree.proof(&values[0]).unwrap();
        proof.path[0].side = match proof.path[0].side {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };
        assert!(!proof.verify(&values[0], &tree.root()));
    }

    #[test]
    fn encode_decode_preserves_sides() {
        let values = leaves(13);
        let tree = MerkleTree::build(&values);
        for v in &values {
            let proof = tree.proof(v).unwrap();
            let encoded = proof.encode().unwrap();
            assert_eq!(encoded.len(), proof.encoded_len());
            let (decoded, consumed) = MerkleProof::decode(&encoded).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded, proof);
        }
    }

    #[test]
    fn decode_truncated_fails() {
        let tree = MerkleTree::build(leaves(4));
        let encoded = tree.proof(&leaves(4)[0]).unwrap().encode().unwrap();
        let err = MerkleProof::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, MerkleError::MalformedProof(_)));
        assert!(MerkleProof::decode(&[]).is_err());
    }

    #[test]
    fn too_deep_proof_cannot_be_encoded() {
        let step = ProofStep {
            sibling: Digest::zero(),
            side: Side::Right,
        };
        let proof = MerkleProof {
            path: vec![step; 256],
        };
        assert_eq!(proof.encode(), Err(MerkleError::TooDeep(256)));
    }

    proptest! {
        #[test]
        fn root_is_deterministic(values in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..40)) {
            prop_assert_eq!(MerkleTree::build(&values).root(), MerkleTree::build(&values).root());
        }

        #[test]
        fn any_byte_flip_breaks_proof(
            values in proptest::collection::hash_set(proptest::collection::vec(any::<u8>(), 1..40), 2..30),
            pick in any::<prop::sample::Index>(),
            flip in any::<prop::sample::Index>(),
        ) {
            let values: Vec<Vec<u8>> = values.into_iter().collect();
            let tree = MerkleTree::build(&values);
            let leaf = pick.get(&values).clone();
            let proof = tree.proof(&leaf).unwrap();
            prop_assert!(proof.verify(&leaf, &tree.root()));

            let mut bad_leaf = leaf.clone();
            let i = flip.index(bad_leaf.len());
            bad_leaf[i] ^= 0x01;
            prop_assert!(!proof.verify(&bad_leaf, &tree.root()));

            let mut bad_root = *tree.root().as_bytes();
            bad_root[flip.index(32)] ^= 0x01;
            prop_assert!(!proof.verify(&leaf, &Digest::from_hash(bad_root)));

            if !proof.path.is_empty() {
                let mut bad_proof = proof.clone();
                let step = flip.index(bad_proof.path.len());
                let mut sibling = *bad_proof.path[step].sibling.as_bytes();
                sibling[flip.index(32)] ^= 0x01;
                bad_proof.path[step].sibling = Digest::from_hash(sibling);
                prop_assert!(!bad_proof.verify(&leaf, &tree.root()));
            }
        }
    }
}
