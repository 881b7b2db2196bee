//! Client SDK for the Zebec payment-streaming, multisig vault and
//! batch-transfer programs on Solana.
//!
//! ```text
//! ZebecClient
//!   ├── StreamService         deposits, stream lifecycle, instant transfers
//!   ├── MultisigService       safes, proposals, approvals, execution
//!   └── BatchTransferService  one vault, many receivers
//! ```
//!
//! Every service builds instructions from the embedded interface documents,
//! signs with the caller's [`WalletSigner`] plus any accounts it creates, and
//! reports the outcome as an [`OperationResult`].

pub mod accounts;
pub mod batch;
pub mod builder;
pub mod config;
pub mod context;
pub mod derive;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod multisig;
pub mod response;
pub mod rpc;
pub mod stream;
pub mod submit;
pub mod token;
pub mod wallet;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use batch::{BatchTransferService, Transfer, MAX_BATCH_RECEIVERS, MAX_TOKEN_BATCH_RECEIVERS};
pub use builder::{InstructionBuilder, InstructionSpec};
pub use config::{Commitment, ProgramIds, SdkConfig};
pub use context::SdkContext;
pub use error::SdkError;
pub use ledger::{AccountInfo, LedgerClient, LedgerError};
pub use multisig::{MultisigService, ProposalState, SafeState};
pub use response::{FailureKind, OperationData, OperationResult, Status};
pub use rpc::RpcLedgerClient;
pub use stream::{StreamParams, StreamRef, StreamService, StreamState, StreamStatus, WithdrawParams};
pub use token::{Amount, TokenKind};
pub use wallet::WalletSigner;

/// Entry point: one configured context, handed to a service per wallet.
#[derive(Debug, Clone)]
pub struct ZebecClient {
    ctx: Arc<SdkContext>,
}

impl ZebecClient {
    pub fn new(config: &SdkConfig, ledger: Arc<dyn LedgerClient>) -> Result<Self, SdkError> {
        Ok(Self {
            ctx: Arc::new(SdkContext::new(config, ledger)?),
        })
    }

    /// Connect to the configured JSON-RPC endpoint.
    pub fn connect(config: &SdkConfig) -> Result<Self, SdkError> {
        let ledger = RpcLedgerClient::from_config(config)?;
        tracing::info!(endpoint = %config.rpc_url, "connected zebec client");
        Self::new(config, Arc::new(ledger))
    }

    pub fn context(&self) -> &Arc<SdkContext> {
        &self.ctx
    }

    pub fn stream(&self, wallet: Arc<dyn WalletSigner>) -> StreamService {
        StreamService::new(self.ctx.clone(), wallet)
    }

    pub fn multisig(&self, wallet: Arc<dyn WalletSigner>) -> MultisigService {
        MultisigService::new(self.ctx.clone(), wallet)
    }

    pub fn batch_transfer(&self, wallet: Arc<dyn WalletSigner>) -> BatchTransferService {
        BatchTransferService::new(self.ctx.clone(), wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedgerClient;
    use crate::testing::{config, wallet};

    #[test]
    fn services_share_one_context() {
        let client = ZebecClient::new(&config(), Arc::new(MockLedgerClient::new())).unwrap();
        let wallet: Arc<dyn WalletSigner> = Arc::new(wallet());

        let _stream = client.stream(wallet.clone());
        let _multisig = client.multisig(wallet.clone());
        let _batch = client.batch_transfer(wallet);
        // Each service and its submitter hold the context.
        assert_eq!(Arc::strong_count(client.context()), 7);
    }

    #[test]
    fn connect_rejects_a_bad_endpoint() {
        let config = SdkConfig {
            rpc_url: "not a url".into(),
            ..config()
        };
        assert!(matches!(
            ZebecClient::connect(&config),
            Err(SdkError::Config(_))
        ));
    }

    #[test]
    fn bad_program_id_is_a_config_error() {
        let config = SdkConfig {
            multisig_program_id: "zzz".into(),
            ..config()
        };
        let err = ZebecClient::new(&config, Arc::new(MockLedgerClient::new())).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }
}
