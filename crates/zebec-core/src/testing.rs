//! Shared fixtures for unit tests.

use std::sync::Arc;

use chain_sol::{Keypair, Pubkey, MINT_LEN, TOKEN_PROGRAM_ID};

use crate::config::SdkConfig;
use crate::context::SdkContext;
use crate::ledger::{AccountInfo, MockLedgerClient};

pub const FEE_OWNER: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";

pub fn config() -> SdkConfig {
    SdkConfig {
        fee_owner: Some(FEE_OWNER.into()),
        ..SdkConfig::default()
    }
}

pub fn context(ledger: MockLedgerClient) -> Arc<SdkContext> {
    context_with(ledger, config())
}

pub fn context_with(ledger: MockLedgerClient, config: SdkConfig) -> Arc<SdkContext> {
    Arc::new(SdkContext::new(&config, Arc::new(ledger)).unwrap())
}

/// Timing short enough for polling tests.
pub fn fast_config() -> SdkConfig {
    SdkConfig {
        transaction_time_delay_ms: 1,
        poll_interval_ms: 1,
        transaction_time_attempts: 3,
        ..config()
    }
}

pub fn wallet() -> Keypair {
    Keypair::from_seed(&[0x5a; 32])
}

pub fn mint_account(decimals: u8) -> AccountInfo {
    let mut data = vec![0u8; MINT_LEN];
    data[44] = decimals;
    data[45] = 1;
    AccountInfo {
        owner: TOKEN_PROGRAM_ID,
        lamports: 1_461_600,
        data,
    }
}

/// A ledger that serves `accounts` by address and records every sent
/// transaction into `sent`.
pub fn ledger_with_accounts(
    accounts: Vec<(Pubkey, AccountInfo)>,
    sent: Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
) -> MockLedgerClient {
    let mut ledger = MockLedgerClient::new();
    ledger.expect_get_account_info().returning(move |address| {
        let found = accounts
            .iter()
            .find(|(key, _)| key == address)
            .map(|(_, info)| info.clone());
        Box::pin(async move { Ok(found) })
    });
    ledger
        .expect_get_latest_blockhash()
        .returning(|| Box::pin(async { Ok([1u8; 32]) }));
    ledger.expect_send_and_confirm().returning(move |wire| {
        let id = chain_sol::transaction_id(wire).unwrap();
        sent.lock().unwrap().push(wire.to_vec());
        Box::pin(async move { Ok(id) })
    });
    ledger
}
