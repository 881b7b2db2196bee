//! Ed25519 keypairs for accounts the SDK creates itself.
//!
//! The SDK never manages a user's long-lived keys. It only mints throwaway
//! keypairs for accounts that must sign their own `CreateAccount` (stream data
//! accounts, multisig accounts, proposal accounts). `ed25519-dalek` zeroizes
//! the secret on drop.

use ed25519_dalek::Signer as _;
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::address::Pubkey;

/// Anything that can produce an Ed25519 signature for a known public key.
pub trait Signer {
    fn pubkey(&self) -> Pubkey;

    fn sign_message(&self, message: &[u8]) -> [u8; 64];
}

/// An in-memory Ed25519 keypair.
#[derive(Clone)]
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate() -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from its 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut copy = *seed;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&copy);
        copy.zeroize();
        Self { signing_key }
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.signing_key.verifying_key().to_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, VerifyingKey};

    #[test]
    fn generated_keys_differ() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn from_seed_is_deterministic() {
        let a = Keypair::from_seed(&[0x42; 32]);
        let b = Keypair::from_seed(&[0x42; 32]);
        assert_eq!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn signature_verifies() {
        let kp = Keypair::from_seed(&[0x07; 32]);
        let sig = kp.sign_message(b"hello");

        let vk = VerifyingKey::from_bytes(kp.pubkey().as_array()).unwrap();
        assert!(vk.verify_strict(b"hello", &Signature::from_bytes(&sig)).is_ok());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::from_seed(&[0x01; 32]);
        let debug = format!("{kp:?}");
        assert!(debug.contains("pubkey"));
        assert!(!debug.contains("signing_key"));
    }
}
