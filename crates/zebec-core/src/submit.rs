//! Signing, submission and outcome mapping.

use std::sync::Arc;

use chain_sol::{assemble_signed_transaction, serialize_message, Pubkey, Signer};
use program_idl::ProgramKind;
use tracing::{debug, info, instrument, warn};

use crate::builder::InstructionSpec;
use crate::context::SdkContext;
use crate::error::SdkError;
use crate::ledger::LedgerError;
use crate::response::{ErrorNormalizer, OperationData, OperationResult};
use crate::wallet::WalletSigner;

/// Largest wire transaction the cluster accepts.
pub const PACKET_DATA_SIZE: usize = 1232;

/// A fully built operation waiting to be signed and sent.
#[derive(Debug)]
pub struct Prepared {
    pub spec: InstructionSpec,
    /// The program the operation targets; used to resolve bare error codes.
    pub primary: ProgramKind,
    /// Success message, e.g. "Stream initialized".
    pub label: String,
    pub derived_address: Option<Pubkey>,
    pub stream_address: Option<Pubkey>,
}

impl Prepared {
    pub fn new(spec: InstructionSpec, primary: ProgramKind, label: impl Into<String>) -> Self {
        Self {
            spec,
            primary,
            label: label.into(),
            derived_address: None,
            stream_address: None,
        }
    }

    pub fn with_derived_address(mut self, address: Pubkey) -> Self {
        self.derived_address = Some(address);
        self
    }

    pub fn with_stream_address(mut self, address: Pubkey) -> Self {
        self.stream_address = Some(address);
        self
    }
}

#[derive(Clone)]
pub struct Submitter {
    ctx: Arc<SdkContext>,
}

impl Submitter {
    pub fn new(ctx: Arc<SdkContext>) -> Self {
        Self { ctx }
    }

    /// Sign with the wallet and any keys generated for the operation, send,
    /// and fold the outcome into an [`OperationResult`].
    #[instrument(skip_all, fields(operation = %prepared.label, program = ?prepared.primary))]
    pub async fn submit(&self, wallet: &dyn WalletSigner, prepared: Prepared) -> OperationResult {
        match self.try_submit(wallet, &prepared).await {
            Ok(signature) => {
                info!(%signature, "transaction confirmed");
                OperationResult::success(
                    prepared.label,
                    OperationData {
                        transaction_hash: signature,
                        derived_address: prepared.derived_address,
                        stream_address: prepared.stream_address,
                    },
                )
            }
            Err(err) => {
                warn!(error = %err, "operation failed");
                OperationResult::failure(&err)
            }
        }
    }

    /// Submit `prepared`, or report why it could not be prepared without
    /// touching the ledger.
    pub async fn run(
        &self,
        wallet: &dyn WalletSigner,
        prepared: Result<Prepared, SdkError>,
    ) -> OperationResult {
        match prepared {
            Ok(prepared) => self.submit(wallet, prepared).await,
            Err(err) => {
                debug!(error = %err, "operation not submitted");
                OperationResult::failure(&err)
            }
        }
    }

    async fn try_submit(
        &self,
        wallet: &dyn WalletSigner,
        prepared: &Prepared,
    ) -> Result<String, SdkError> {
        let wire = self.sign(wallet, &prepared.spec).await?;

        self.ctx
            .ledger
            .send_and_confirm(&wire)
            .await
            .map_err(|err| self.map_ledger_error(err, prepared))
    }

    /// Compile against a fresh blockhash and collect every signature.
    pub async fn sign(
        &self,
        wallet: &dyn WalletSigner,
        spec: &InstructionSpec,
    ) -> Result<Vec<u8>, SdkError> {
        let fee_payer = wallet.pubkey();
        let blockhash = self.ctx.ledger.get_latest_blockhash().await?;
        let tx = spec.to_transaction(&fee_payer, &blockhash)?;
        let message = serialize_message(&tx)?;

        let mut signatures = vec![(fee_payer, wallet.sign_message(&message).await?)];
        for signer in &spec.extra_signers {
            signatures.push((Signer::pubkey(signer), Signer::sign_message(signer, &message)));
        }

        let wire = assemble_signed_transaction(&tx, &message, &signatures)?;
        if wire.len() > PACKET_DATA_SIZE {
            return Err(SdkError::Precondition(format!(
                "transaction is {} bytes, the limit is {PACKET_DATA_SIZE}",
                wire.len()
            )));
        }
        debug!(bytes = wire.len(), signers = signatures.len(), "transaction signed");
        Ok(wire)
    }

    fn map_ledger_error(&self, err: LedgerError, prepared: &Prepared) -> SdkError {
        match err {
            LedgerError::Rejected { message, logs } => {
                let programs: Vec<Pubkey> = prepared
                    .spec
                    .instructions()
                    .iter()
                    .map(|ix| ix.program_id)
                    .collect();
                ErrorNormalizer::new(&self.ctx.registry, &self.ctx.ids).normalize(
                    &message,
                    &logs,
                    &programs,
                    prepared.primary,
                )
            }
            other => other.into(),
        }
    }
}
