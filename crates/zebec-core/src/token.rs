//! Native and SPL token amounts, and mint validation.

use chain_sol::system::SOL_DECIMALS;
use chain_sol::{Mint, Pubkey, MINT_LEN, TOKEN_PROGRAM_ID};

use crate::error::SdkError;
use crate::ledger::LedgerClient;

/// Which asset an operation moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Native,
    Token { mint: Pubkey },
}

impl TokenKind {
    pub fn mint(&self) -> Option<&Pubkey> {
        match self {
            TokenKind::Native => None,
            TokenKind::Token { mint } => Some(mint),
        }
    }
}

/// An amount either in the asset's smallest unit or as a decimal string in
/// whole units (`"1.25"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Base(u64),
    Ui(String),
}

impl Amount {
    /// Scale to base units. Never goes through floating point.
    pub fn to_base_units(&self, decimals: u8) -> Result<u64, SdkError> {
        match self {
            Amount::Base(v) => Ok(*v),
            Amount::Ui(s) => parse_ui_amount(s, decimals),
        }
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount::Base(v)
    }
}

fn parse_ui_amount(raw: &str, decimals: u8) -> Result<u64, SdkError> {
    let invalid = || SdkError::Precondition(format!("invalid amount {raw:?}"));
    let s = raw.trim();

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) || (s.contains('.') && frac.is_empty()) {
        return Err(invalid());
    }
    if frac.len() > decimals as usize {
        return Err(SdkError::Precondition(format!(
            "amount {raw:?} has more than {decimals} decimal places"
        )));
    }

    let scale = 10u64
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| SdkError::Precondition(format!("unsupported decimals {decimals}")))?;
    let overflow = || SdkError::Precondition(format!("amount {raw:?} overflows u64"));

    let whole: u64 = whole.parse().map_err(|_| overflow())?;
    let mut frac_units: u64 = 0;
    if !frac.is_empty() {
        let padding = 10u64.pow(u32::from(decimals) - frac.len() as u32);
        frac_units = frac.parse::<u64>().map_err(|_| invalid())? * padding;
    }

    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Load and validate a mint account.
pub async fn load_mint(ledger: &dyn LedgerClient, mint: &Pubkey) -> Result<Mint, SdkError> {
    let account = ledger
        .get_account_info(mint)
        .await?
        .ok_or_else(|| SdkError::Precondition(format!("token not found: {mint}")))?;

    if account.owner != TOKEN_PROGRAM_ID {
        return Err(SdkError::Precondition(format!(
            "mint owner mismatch: {mint} is owned by {}",
            account.owner
        )));
    }
    if account.data.len() != MINT_LEN {
        return Err(SdkError::Precondition(format!(
            "invalid mint account size: expected {MINT_LEN} bytes, got {}",
            account.data.len()
        )));
    }

    let parsed = Mint::unpack(&account.data)?;
    if !parsed.is_initialized {
        return Err(SdkError::Precondition(format!("mint {mint} is not initialized")));
    }
    Ok(parsed)
}

/// Decimals of the asset, validating the mint for token operations.
pub async fn decimals_of(ledger: &dyn LedgerClient, token: &TokenKind) -> Result<u8, SdkError> {
    match token {
        TokenKind::Native => Ok(SOL_DECIMALS),
        TokenKind::Token { mint } => load_mint(ledger, mint).await.map(|m| m.decimals),
    }
}

/// Resolve a non-zero amount in base units.
pub async fn resolve_amount(
    ledger: &dyn LedgerClient,
    amount: &Amount,
    token: &TokenKind,
) -> Result<u64, SdkError> {
    let decimals = decimals_of(ledger, token).await?;
    let value = amount.to_base_units(decimals)?;
    if value == 0 {
        return Err(SdkError::Precondition("amount must be greater than zero".into()));
    }
    Ok(value)
}
