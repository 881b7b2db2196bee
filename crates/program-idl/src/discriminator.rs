//! Anchor discriminators.

use sha2::{Digest, Sha256};

use crate::schema::DISCRIMINATOR_LEN;

/// `sha256("global:<snake_case_name>")[..8]`.
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    hash_prefix(&format!("global:{}", to_snake_case(name)))
}

/// `sha256("account:<Name>")[..8]`.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    hash_prefix(&format!("account:{name}"))
}

fn hash_prefix(preimage: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(preimage.as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// camelCase to snake_case, the way Anchor names instruction handlers.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("depositSol"), "deposit_sol");
        assert_eq!(to_snake_case("pauseResumeTokenStream"), "pause_resume_token_stream");
        assert_eq!(to_snake_case("approve"), "approve");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn instruction_discriminator_uses_snake_case() {
        let expected = Sha256::digest(b"global:create_multisig");
        assert_eq!(instruction_discriminator("createMultisig"), expected[..8]);
    }

    #[test]
    fn account_discriminator_keeps_case() {
        let expected = Sha256::digest(b"account:Multisig");
        assert_eq!(account_discriminator("Multisig"), expected[..8]);
        assert_ne!(account_discriminator("Multisig"), account_discriminator("multisig"));
    }
}
