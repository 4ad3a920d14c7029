use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};

/// Number of leading `'0'` hex digits the reference network requires
pub const DEFAULT_DIFFICULTY: usize = 3;

/// Largest difficulty a SHA-256 hex digest can satisfy
pub const MAX_DIFFICULTY: usize = 64;

/// Proof-of-work puzzle chaining each block's proof to its predecessor's
///
/// A proof is valid when SHA-256 of the decimal concatenation
/// `"<last_proof><proof>"` starts with `difficulty` zero hex digits.
/// Checking a proof costs one hash; finding one costs about
/// `16^difficulty` hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofOfWork {
    /// Creates a puzzle with the given difficulty, capped at [`MAX_DIFFICULTY`]
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty: difficulty.min(MAX_DIFFICULTY),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Checks whether `proof` solves the puzzle for `last_proof`
    pub fn is_valid_proof(&self, last_proof: u64, proof: u64) -> bool {
        let guess = format!("{}{}", last_proof, proof);
        let digest = Sha256::digest(guess.as_bytes());
        has_leading_zero_digits(&digest, self.difficulty)
    }

    /// Finds the smallest non-negative proof for `last_proof`
    ///
    /// Blocks the calling thread until a proof is found.
    pub fn find_proof(&self, last_proof: u64) -> u64 {
        let mut proof = 0;
        while !self.is_valid_proof(last_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Same search as [`find_proof`](Self::find_proof), but gives up and
    /// returns `None` as soon as `cancel` is raised.
    pub fn find_proof_until(&self, last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
        let mut proof = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            if self.is_valid_proof(last_proof, proof) {
                return Some(proof);
            }
            proof += 1;
        }
    }
}

/// Checks the leading nibbles of a digest without rendering it as hex
fn has_leading_zero_digits(digest: &[u8], digits: usize) -> bool {
    if digits > digest.len() * 2 {
        return false;
    }

    (0..digits).all(|i| {
        let byte = digest[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        nibble == 0
    })
}
