//! SPL Token operations for Solana.
//!
//! Implements the handful of SPL Token and Associated Token Account pieces
//! the SDK needs (checked transfers, idempotent ATA creation, ATA address
//! derivation and mint account parsing) without pulling in the `spl-token`
//! crates.

use crate::address::Pubkey;
use crate::error::SolError;
use crate::pda::find_program_address;
use crate::system::SYSTEM_PROGRAM_ID;
use crate::transaction::{AccountMeta, Instruction};

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
]);

/// Byte length of an SPL mint account.
pub const MINT_LEN: usize = 82;

/// Byte length of an SPL token account.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

const TRANSFER_CHECKED_IX: u8 = 12;
const ATA_CREATE_IDEMPOTENT_IX: u8 = 1;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Build an SPL Token `TransferChecked` instruction.
///
/// `amount` is in the token's smallest unit; the program re-checks `decimals`
/// against the mint.
///
/// # Wire format
///
/// `[12] + u64 LE amount + u8 decimals`, 10 bytes total.
pub fn transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, SolError> {
    if amount == 0 {
        return Err(SolError::TransactionBuildError(
            "SPL transfer amount must be > 0".into(),
        ));
    }

    let mut data = Vec::with_capacity(10);
    data.push(TRANSFER_CHECKED_IX);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Ok(Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data,
    })
}

/// Create `wallet`'s associated token account for `mint` unless it exists.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, SolError> {
    let ata = associated_token_address(wallet, mint)?;

    Ok(Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![ATA_CREATE_IDEMPOTENT_IX],
    })
}

// ---------------------------------------------------------------------------
// Associated Token Account (PDA) derivation
// ---------------------------------------------------------------------------

/// Derive the associated token account address for a wallet + mint pair.
///
/// Seeds: `[wallet, token_program_id, mint]` under the ATA program.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey, SolError> {
    find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|found| found.address)
}

// ---------------------------------------------------------------------------
// Mint layout
// ---------------------------------------------------------------------------

/// The fields of an SPL mint account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mint {
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Pubkey>,
}

impl Mint {
    /// Parse the 82-byte mint layout.
    ///
    /// ```text
    /// 0..36   COption<Pubkey> mint_authority (u32 tag + key)
    /// 36..44  u64 supply
    /// 44      u8 decimals
    /// 45      bool is_initialized
    /// 46..82  COption<Pubkey> freeze_authority
    /// ```
    pub fn unpack(data: &[u8]) -> Result<Self, SolError> {
        if data.len() != MINT_LEN {
            return Err(SolError::InvalidAccountData(format!(
                "mint account must be {MINT_LEN} bytes, got {}",
                data.len()
            )));
        }

        let supply = u64::from_le_bytes(
            data[36..44]
                .try_into()
                .map_err(|_| SolError::InvalidAccountData("bad supply field".into()))?,
        );

        let is_initialized = match data[45] {
            0 => false,
            1 => true,
            other => {
                return Err(SolError::InvalidAccountData(format!(
                    "invalid is_initialized flag {other}"
                )))
            }
        };

        Ok(Self {
            mint_authority: unpack_coption_key(&data[0..36])?,
            supply,
            decimals: data[44],
            is_initialized,
            freeze_authority: unpack_coption_key(&data[46..82])?,
        })
    }
}

fn unpack_coption_key(src: &[u8]) -> Result<Option<Pubkey>, SolError> {
    match src[..4] {
        [0, 0, 0, 0] => Ok(None),
        [1, 0, 0, 0] => Pubkey::try_from_slice(&src[4..36]).map(Some),
        _ => Err(SolError::InvalidAccountData("invalid COption tag".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint_bytes(decimals: u8, authority: Option<[u8; 32]>) -> Vec<u8> {
        let mut data = vec![0u8; MINT_LEN];
        if let Some(key) = authority {
            data[0] = 1;
            data[4..36].copy_from_slice(&key);
        }
        data[36..44].copy_from_slice(&1_000_000u64.to_le_bytes());
        data[44] = decimals;
        data[45] = 1;
        data
    }

    // -- Constant verification ----------------------------------------------

    #[test]
    fn token_program_id_roundtrip() {
        assert_eq!(
            TOKEN_PROGRAM_ID.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
    }

    #[test]
    fn associated_token_program_id_roundtrip() {
        assert_eq!(
            ASSOCIATED_TOKEN_PROGRAM_ID.to_string(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
    }

    // -- TransferChecked ------------------------------------------------------

    #[test]
    fn transfer_checked_encoding() {
        let ix = transfer_checked(
            &Pubkey::new_from_array([1; 32]),
            &Pubkey::new_from_array([2; 32]),
            &Pubkey::new_from_array([3; 32]),
            &Pubkey::new_from_array([4; 32]),
            500_000,
            6,
        )
        .unwrap();

        assert_eq!(ix.program_id, TOKEN_PROGRAM_ID);
        assert_eq!(ix.data.len(), 10);
        assert_eq!(ix.data[0], 12);
        assert_eq!(u64::from_le_bytes(ix.data[1..9].try_into().unwrap()), 500_000);
        assert_eq!(ix.data[9], 6);
    }

    #[test]
    fn transfer_checked_account_roles() {
        let owner = Pubkey::new_from_array([4; 32]);
        let ix = transfer_checked(
            &Pubkey::new_from_array([1; 32]),
            &Pubkey::new_from_array([2; 32]),
            &Pubkey::new_from_array([3; 32]),
            &owner,
            1,
            0,
        )
        .unwrap();

        let flags: Vec<(bool, bool)> = ix
            .accounts
            .iter()
            .map(|m| (m.is_writable, m.is_signer))
            .collect();
        assert_eq!(flags, vec![(true, false), (false, false), (true, false), (false, true)]);
        assert_eq!(ix.accounts[3].pubkey, owner);
    }

    #[test]
    fn transfer_checked_zero_amount_fails() {
        let k = Pubkey::new_from_array([1; 32]);
        assert!(transfer_checked(&k, &k, &k, &k, 0, 6).is_err());
    }

    // -- ATA ------------------------------------------------------------------

    #[test]
    fn ata_derivation_is_deterministic() {
        let wallet = Pubkey::new_from_array([0x11; 32]);
        let mint = Pubkey::new_from_array([0x22; 32]);
        assert_eq!(
            associated_token_address(&wallet, &mint).unwrap(),
            associated_token_address(&wallet, &mint).unwrap()
        );
    }

    #[test]
    fn ata_differs_per_wallet_and_mint() {
        let mint = Pubkey::new_from_array([0xFF; 32]);
        let a = associated_token_address(&Pubkey::new_from_array([1; 32]), &mint).unwrap();
        let b = associated_token_address(&Pubkey::new_from_array([2; 32]), &mint).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn create_ata_idempotent_layout() {
        let payer = Pubkey::new_from_array([1; 32]);
        let wallet = Pubkey::new_from_array([2; 32]);
        let mint = Pubkey::new_from_array([3; 32]);
        let ix = create_associated_token_account_idempotent(&payer, &wallet, &mint).unwrap();

        assert_eq!(ix.program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(ix.accounts[1].pubkey, associated_token_address(&wallet, &mint).unwrap());
        assert!(ix.accounts[0].is_signer);
    }

    // -- Mint -----------------------------------------------------------------

    #[test]
    fn mint_unpack_reads_decimals() {
        let mint = Mint::unpack(&mint_bytes(6, Some([9; 32]))).unwrap();
        assert_eq!(mint.decimals, 6);
        assert_eq!(mint.supply, 1_000_000);
        assert!(mint.is_initialized);
        assert_eq!(mint.mint_authority, Some(Pubkey::new_from_array([9; 32])));
        assert_eq!(mint.freeze_authority, None);
    }

    #[test]
    fn mint_unpack_rejects_wrong_length() {
        let err = Mint::unpack(&[0u8; 165]).unwrap_err();
        assert!(matches!(err, SolError::InvalidAccountData(_)));
    }

    #[test]
    fn mint_unpack_rejects_bad_option_tag() {
        let mut data = mint_bytes(6, None);
        data[0] = 7;
        assert!(Mint::unpack(&data).is_err());
    }
}
