//! The ledger collaborator: account reads, submission and clock reads.

use async_trait::async_trait;
use chain_sol::Pubkey;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Raw account state as the ledger reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction was refused, either in preflight or on execution.
    #[error("Transaction rejected: {message}")]
    Rejected { message: String, logs: Vec<String> },

    /// Submitted, but confirmation was not observed.
    #[error("Transaction {signature} unconfirmed: {message}")]
    Unconfirmed { signature: String, message: String },
}

/// Operations the SDK needs from a ledger node.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait LedgerClient: Send + Sync {
    /// `None` when the account does not exist.
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, LedgerError>;

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], LedgerError>;

    /// Submit a signed wire transaction and wait for confirmation. Returns the
    /// transaction signature.
    async fn send_and_confirm(&self, transaction: &[u8]) -> Result<String, LedgerError>;

    /// Block time of a confirmed transaction, `None` while not yet visible.
    async fn get_transaction_time(&self, signature: &str) -> Result<Option<i64>, LedgerError>;

    /// Current cluster unix timestamp.
    async fn get_cluster_time(&self) -> Result<i64, LedgerError>;
}
