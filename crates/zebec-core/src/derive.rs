//! Seed recipes for every program-owned account the SDK touches.
//!
//! Each entity has exactly one recipe. Using the wrong one yields a valid but
//! unrelated address, so callers go through these functions instead of
//! assembling seeds inline.

use chain_sol::{associated_token_address, find_program_address, DerivedAddress, Pubkey};

use crate::error::SdkError;

/// Seed tags, byte-for-byte as the programs expect them.
pub mod seeds {
    pub const VAULT_SOL: &[u8] = b"withdraw_sol";
    pub const VAULT_TOKEN: &[u8] = b"withdraw_token";
    pub const MULTISIG_OPTIONS: &[u8] = b"NewVaultOption";
    pub const MULTISIG_OPTIONS_DATA: &[u8] = b"NewVaultOptionData";
    pub const FEE_VAULT: &[u8] = b"fee_vault";
}

fn find(entity: &str, parts: &[&[u8]], program: &Pubkey) -> Result<DerivedAddress, SdkError> {
    find_program_address(parts, program).map_err(|err| {
        tracing::error!(entity, %program, error = %err, "address derivation failed");
        SdkError::from(err)
    })
}

/// Per-owner vault holding deposited funds: `[owner]` under the stream program.
pub fn zebec_vault(stream_program: &Pubkey, owner: &Pubkey) -> Result<DerivedAddress, SdkError> {
    find("zebec vault", &[owner.as_ref()], stream_program)
}

/// Native withdraw escrow: `[VAULT_SOL, owner]`.
pub fn withdraw_escrow_native(
    stream_program: &Pubkey,
    owner: &Pubkey,
) -> Result<DerivedAddress, SdkError> {
    find(
        "native withdraw escrow",
        &[seeds::VAULT_SOL, owner.as_ref()],
        stream_program,
    )
}

/// Token withdraw escrow: `[VAULT_TOKEN, owner, mint]`.
pub fn withdraw_escrow_token(
    stream_program: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<DerivedAddress, SdkError> {
    find(
        "token withdraw escrow",
        &[seeds::VAULT_TOKEN, owner.as_ref(), mint.as_ref()],
        stream_program,
    )
}

/// `[fee_owner, MULTISIG_OPTIONS]`.
pub fn fee_vault(stream_program: &Pubkey, fee_owner: &Pubkey) -> Result<DerivedAddress, SdkError> {
    find(
        "fee vault",
        &[fee_owner.as_ref(), seeds::MULTISIG_OPTIONS],
        stream_program,
    )
}

/// `[fee_owner, MULTISIG_OPTIONS_DATA, fee_vault]`.
pub fn fee_vault_data(
    stream_program: &Pubkey,
    fee_owner: &Pubkey,
    fee_vault: &Pubkey,
) -> Result<DerivedAddress, SdkError> {
    find(
        "fee vault data",
        &[
            fee_owner.as_ref(),
            seeds::MULTISIG_OPTIONS_DATA,
            fee_vault.as_ref(),
        ],
        stream_program,
    )
}

/// The key a multisig safe signs with. Its bump is the safe's `nonce`.
pub fn multisig_signer(
    multisig_program: &Pubkey,
    multisig: &Pubkey,
) -> Result<DerivedAddress, SdkError> {
    find("multisig signer", &[multisig.as_ref()], multisig_program)
}

pub fn batch_vault(batch_program: &Pubkey, owner: &Pubkey) -> Result<DerivedAddress, SdkError> {
    find("batch vault", &[owner.as_ref()], batch_program)
}

pub fn batch_fee_vault(batch_program: &Pubkey) -> Result<DerivedAddress, SdkError> {
    find("batch fee vault", &[seeds::FEE_VAULT], batch_program)
}

pub fn associated_token_account(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey, SdkError> {
    Ok(associated_token_address(wallet, mint)?)
}
