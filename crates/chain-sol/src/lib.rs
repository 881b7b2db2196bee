//! Solana chain primitives for the Zebec SDK.
//!
//! This crate handles addresses, program derived address search, the legacy
//! transaction wire format, multi-signer assembly and the SPL token pieces
//! the SDK needs, without pulling in `solana-sdk` (which drags in tokio
//! and 200+ transitive dependencies).
//!
//! Instead we implement Solana's compact binary wire format by hand, using
//! `ed25519-dalek` for Ed25519 signing and `bs58` for Base58 encoding.

pub mod address;
pub mod error;
pub mod keypair;
pub mod pda;
pub mod spl_token;
pub mod system;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::Pubkey;
pub use error::SolError;
pub use keypair::{Keypair, Signer};
pub use pda::{create_program_address, find_program_address, DerivedAddress};
pub use spl_token::{
    associated_token_address, Mint, ASSOCIATED_TOKEN_PROGRAM_ID, MINT_LEN, TOKEN_PROGRAM_ID,
};
pub use system::{SYSTEM_PROGRAM_ID, SYSVAR_RENT_ID};
pub use transaction::{
    assemble_signed_transaction, compile_transaction, decode_compact_u16, encode_compact_u16,
    serialize_message, sign_transaction, transaction_id, AccountMeta, CompiledInstruction,
    Instruction, SolTransaction,
};
