//! Program Derived Address (PDA) search.
//!
//! A PDA is `SHA-256(seed_0 || .. || seed_n || bump || program_id ||
//! "ProgramDerivedAddress")` for the first bump (255 down to 0) whose hash is
//! NOT a valid Ed25519 point. Because the search is a pure function of the
//! seeds and the program id, the same inputs always yield the same address.

use sha2::{Digest, Sha256};

use crate::address::Pubkey;
use crate::error::SolError;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds, including the bump.
pub const MAX_SEEDS: usize = 16;

/// A derived address together with its canonical bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Find the canonical PDA for `seeds` under `program_id`.
///
/// Fails with [`SolError::InvalidSeeds`] when the seed list breaks the
/// runtime's limits and with [`SolError::DerivationExhausted`] when no bump
/// in `0..=255` produces an off-curve address.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<DerivedAddress, SolError> {
    check_seeds(seeds, 1)?;

    for bump in (0u8..=255).rev() {
        if let Some(address) = hash_off_curve(seeds, &[bump], program_id) {
            return Ok(DerivedAddress { address, bump });
        }
    }

    Err(SolError::DerivationExhausted(program_id.to_string()))
}

/// Compute a PDA from seeds that already include the bump.
///
/// Returns an error if the resulting hash lands on the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<Pubkey, SolError> {
    check_seeds(seeds, 0)?;

    hash_off_curve(seeds, &[], program_id).ok_or_else(|| {
        SolError::InvalidSeeds("derived address falls on the ed25519 curve".into())
    })
}

fn check_seeds(seeds: &[&[u8]], reserved: usize) -> Result<(), SolError> {
    if seeds.len() + reserved > MAX_SEEDS {
        return Err(SolError::InvalidSeeds(format!(
            "at most {} seeds allowed, got {}",
            MAX_SEEDS - reserved,
            seeds.len()
        )));
    }
    if let Some((i, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(SolError::InvalidSeeds(format!(
            "seed {i} is {} bytes, max {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

fn hash_off_curve(seeds: &[&[u8]], bump_seed: &[u8], program_id: &Pubkey) -> Option<Pubkey> {
    let mut hasher = Sha256::new();

    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return None;
    }

    Some(Pubkey::new_from_array(hash))
}

/// Check if 32 bytes represent a valid Ed25519 curve point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
