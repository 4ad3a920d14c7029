use super::block::Block;
use super::chain::LedgerError;
use super::pow::ProofOfWork;

/// Checks every link of a candidate chain
///
/// The first block is trusted as genesis. Each later block must carry the
/// canonical hash of its predecessor and a proof that solves the puzzle for
/// the predecessor's proof. Empty and single-block chains have no links and
/// are valid.
///
/// # Returns
///
/// `ValidationFailed` describing the first broken link
pub fn validate_chain(chain: &[Block], pow: &ProofOfWork) -> Result<(), LedgerError> {
    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);

        let expected_hash = previous.hash();
        if block.previous_hash != expected_hash {
            return Err(LedgerError::ValidationFailed(format!(
                "block {} links to {} but block {} hashes to {}",
                block.index, block.previous_hash, previous.index, expected_hash
            )));
        }

        if !pow.is_valid_proof(previous.proof, block.proof) {
            return Err(LedgerError::ValidationFailed(format!(
                "block {} has proof {} which does not solve the puzzle for {}",
                block.index, block.proof, previous.proof
            )));
        }
    }

    Ok(())
}

/// Returns true if every link of `chain` validates
pub fn is_valid_chain(chain: &[Block], pow: &ProofOfWork) -> bool {
    validate_chain(chain, pow).is_ok()
}
