//! Intra-batch hash chain: a Merkle tree over per-request digests.
//!
//! The signing backend signs only the chain root; each caller receives its
//! authentication path ([`ChainFragment`]) and can prove its own request is
//! covered by the shared signature.

use sealog_types::{HashAlg, to_hex};

/// One step of an authentication path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// Lowercase-hex digest of the sibling node.
    pub sibling: String,
    /// True when the sibling sits to the right of the path node.
    pub sibling_right: bool,
}

/// A caller's fragment of the batch hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFragment {
    /// Index of the caller's leaf in the batch.
    pub leaf_index: usize,
    /// Authentication path from the leaf up to (excluding) the root.
    pub path: Vec<ChainLink>,
}

impl ChainFragment {
    /// Verify that `leaf_digest` chains up to `root` through this fragment.
    pub fn verify(&self, leaf_digest: &str, root: &str, alg: HashAlg) -> bool {
        let mut node = leaf_digest.to_string();
        for link in &self.path {
            node = if link.sibling_right {
                combine(alg, &node, &link.sibling)
            } else {
                combine(alg, &link.sibling, &node)
            };
        }
        node == root
    }
}

/// Builds the hash chain for one batch.
pub struct HashChainBuilder {
    alg: HashAlg,
    leaves: Vec<String>,
}

impl HashChainBuilder {
    pub fn new(alg: HashAlg) -> Self {
        Self {
            alg,
            leaves: Vec::new(),
        }
    }

    /// Add one request's input digests; they are folded into a single leaf.
    pub fn add_inputs(&mut self, input_digests: &[Vec<u8>]) {
        let mut concat = Vec::new();
        for digest in input_digests {
            concat.extend_from_slice(digest);
        }
        self.leaves.push(to_hex(&self.alg.digest(&concat)));
    }

    /// Leaf digest for a given batch index (hex).
    pub fn leaf(&self, index: usize) -> Option<&str> {
        self.leaves.get(index).map(String::as_str)
    }

    /// Finish building: returns the hex chain root and one fragment per
    /// added input, in insertion order.
    pub fn finish(self) -> (String, Vec<ChainFragment>) {
        assert!(!self.leaves.is_empty(), "hash chain needs at least one leaf");

        let mut fragments: Vec<ChainFragment> = (0..self.leaves.len())
            .map(|i| ChainFragment {
                leaf_index: i,
                path: Vec::new(),
            })
            .collect();

        // `level` holds (node digest, indexes of leaves below the node).
        let mut level: Vec<(String, Vec<usize>)> = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| (leaf.clone(), vec![i]))
            .collect();

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut iter = level.into_iter();
            while let Some(left) = iter.next() {
                match iter.next() {
                    Some(right) => {
                        for i in &left.1 {
                            fragments[*i].path.push(ChainLink {
                                sibling: right.0.clone(),
                                sibling_right: true,
                            });
                        }
                        for i in &right.1 {
                            fragments[*i].path.push(ChainLink {
                                sibling: left.0.clone(),
                                sibling_right: false,
                            });
                        }
                        let combined = combine(self.alg, &left.0, &right.0);
                        let mut below = left.1;
                        below.extend(right.1);
                        next.push((combined, below));
                    }
                    // Odd node is promoted unchanged.
                    None => next.push(left),
                }
            }
            level = next;
        }

        let root = level.remove(0).0;
        (root, fragments)
    }
}

/// Hash of two adjacent nodes.
fn combine(alg: HashAlg, left: &str, right: &str) -> String {
    let mut input = String::with_capacity(left.len() + right.len());
    input.push_str(left);
    input.push_str(right);
    alg.digest_hex(input.as_bytes())
}
