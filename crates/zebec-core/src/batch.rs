//! Batch transfers: one vault, many receivers per transaction.

use std::sync::Arc;

use chain_sol::{
    spl_token, AccountMeta, Pubkey, ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID,
    SYSVAR_RENT_ID, TOKEN_PROGRAM_ID,
};
use program_idl::{ArgValue, ProgramKind};
use tracing::{instrument, warn};

use crate::accounts::{batch as accounts, WithRemaining};
use crate::builder::{InstructionBuilder, InstructionSpec};
use crate::context::SdkContext;
use crate::derive;
use crate::error::SdkError;
use crate::response::OperationResult;
use crate::submit::{Prepared, Submitter};
use crate::token::{decimals_of, resolve_amount, Amount, TokenKind};
use crate::wallet::WalletSigner;

/// Receivers the program pays in one instruction.
pub const MAX_BATCH_RECEIVERS: usize = 20;

/// Receivers of a token batch that fit one packet. Each receiver adds its
/// wallet and token account keys plus an idempotent token account create.
pub const MAX_TOKEN_BATCH_RECEIVERS: usize = 9;

/// One leg of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub receiver: Pubkey,
    pub amount: Amount,
}

impl Transfer {
    pub fn new(receiver: Pubkey, amount: impl Into<Amount>) -> Self {
        Self {
            receiver,
            amount: amount.into(),
        }
    }
}

#[derive(Clone)]
pub struct BatchTransferService {
    ctx: Arc<SdkContext>,
    wallet: Arc<dyn WalletSigner>,
    submitter: Submitter,
}

impl BatchTransferService {
    pub fn new(ctx: Arc<SdkContext>, wallet: Arc<dyn WalletSigner>) -> Self {
        Self {
            submitter: Submitter::new(ctx.clone()),
            ctx,
            wallet,
        }
    }

    fn owner(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    fn builder(&self) -> InstructionBuilder<'_> {
        self.ctx.builder(ProgramKind::BatchTransfer)
    }

    /// The wallet's batch vault.
    pub fn vault(&self) -> Result<Pubkey, SdkError> {
        Ok(derive::batch_vault(&self.ctx.ids.batch_transfer, &self.owner())?.address)
    }

    async fn run(&self, prepared: Result<Prepared, SdkError>) -> OperationResult {
        self.submitter.run(self.wallet.as_ref(), prepared).await
    }

    #[instrument(skip(self))]
    pub async fn deposit(&self, amount: Amount, token: TokenKind) -> OperationResult {
        self.run(self.prepare_deposit(&amount, &token).await).await
    }

    pub async fn prepare_deposit(
        &self,
        amount: &Amount,
        token: &TokenKind,
    ) -> Result<Prepared, SdkError> {
        let amount = resolve_amount(self.ctx.ledger.as_ref(), amount, token).await?;
        let sender = self.owner();
        let vault = self.vault()?;
        let args = [ArgValue::U64(amount)];

        let spec = match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &accounts::DepositSol {
                    sender,
                    batch_vault: vault,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            )?,
            TokenKind::Token { mint } => self.builder().build_for(
                &args,
                &accounts::DepositToken {
                    sender,
                    batch_vault: vault,
                    mint: *mint,
                    sender_token_account: derive::associated_token_account(&sender, mint)?,
                    vault_token_account: derive::associated_token_account(&vault, mint)?,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    system_program: SYSTEM_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                },
            )?,
        };
        Ok(Prepared::new(spec, ProgramKind::BatchTransfer, "Deposit successful")
            .with_derived_address(vault))
    }

    /// Return vault funds to the owner.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, amount: Amount, token: TokenKind) -> OperationResult {
        self.run(self.prepare_withdraw(&amount, &token).await).await
    }

    pub async fn prepare_withdraw(
        &self,
        amount: &Amount,
        token: &TokenKind,
    ) -> Result<Prepared, SdkError> {
        let amount = resolve_amount(self.ctx.ledger.as_ref(), amount, token).await?;
        let sender = self.owner();
        let vault = self.vault()?;
        let args = [ArgValue::U64(amount)];

        let spec = match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &accounts::WithdrawSol {
                    sender,
                    batch_vault: vault,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            )?,
            TokenKind::Token { mint } => self.builder().build_for(
                &args,
                &accounts::WithdrawToken {
                    sender,
                    batch_vault: vault,
                    mint: *mint,
                    sender_token_account: derive::associated_token_account(&sender, mint)?,
                    vault_token_account: derive::associated_token_account(&vault, mint)?,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    system_program: SYSTEM_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                },
            )?,
        };
        Ok(Prepared::new(spec, ProgramKind::BatchTransfer, "Withdrawal successful")
            .with_derived_address(vault))
    }

    /// Pay every receiver from the vault in one instruction.
    #[instrument(skip(self, transfers), fields(receivers = transfers.len()))]
    pub async fn instant_transfer(
        &self,
        transfers: Vec<Transfer>,
        token: TokenKind,
    ) -> OperationResult {
        self.run(self.prepare_instant_transfer(&transfers, &token).await).await
    }

    pub async fn prepare_instant_transfer(
        &self,
        transfers: &[Transfer],
        token: &TokenKind,
    ) -> Result<Prepared, SdkError> {
        if transfers.is_empty() {
            return Err(SdkError::Precondition("a batch needs at least one receiver".into()));
        }
        let (limit, kind) = match token {
            TokenKind::Native => (MAX_BATCH_RECEIVERS, "native"),
            TokenKind::Token { .. } => (MAX_TOKEN_BATCH_RECEIVERS, "token"),
        };
        if transfers.len() > limit {
            warn!(receivers = transfers.len(), limit, "batch too large");
            return Err(SdkError::Precondition(format!(
                "a {kind} batch pays at most {limit} receivers, got {}",
                transfers.len()
            )));
        }

        let decimals = decimals_of(self.ctx.ledger.as_ref(), token).await?;
        let amounts = transfers
            .iter()
            .map(|t| match t.amount.to_base_units(decimals)? {
                0 => Err(SdkError::Precondition(format!(
                    "amount for {} must be greater than zero",
                    t.receiver
                ))),
                units => Ok(ArgValue::U64(units)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let args = [ArgValue::Vec(amounts)];

        let sender = self.owner();
        let vault = self.vault()?;
        let fee_vault = derive::batch_fee_vault(&self.ctx.ids.batch_transfer)?.address;

        let spec = match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &WithRemaining {
                    accounts: accounts::TransferSol {
                        sender,
                        batch_vault: vault,
                        fee_vault,
                        system_program: SYSTEM_PROGRAM_ID,
                    },
                    remaining: transfers
                        .iter()
                        .map(|t| AccountMeta::new(t.receiver, false))
                        .collect(),
                },
            )?,
            TokenKind::Token { mint } => {
                let mut remaining = Vec::with_capacity(transfers.len());
                let mut setup = Vec::with_capacity(transfers.len());
                for t in transfers {
                    remaining.push(AccountMeta::new(
                        derive::associated_token_account(&t.receiver, mint)?,
                        false,
                    ));
                    setup.push(spl_token::create_associated_token_account_idempotent(
                        &sender, &t.receiver, mint,
                    )?);
                }

                let spec = self.builder().build_for(
                    &args,
                    &WithRemaining {
                        accounts: accounts::TransferToken {
                            sender,
                            batch_vault: vault,
                            mint: *mint,
                            vault_token_account: derive::associated_token_account(&vault, mint)?,
                            fee_vault,
                            fee_vault_token_account: derive::associated_token_account(
                                &fee_vault, mint,
                            )?,
                            token_program: TOKEN_PROGRAM_ID,
                            associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                            system_program: SYSTEM_PROGRAM_ID,
                        },
                        remaining,
                    },
                )?;
                setup.into_iter().fold(spec, InstructionSpec::with_pre_instruction)
            }
        };

        Ok(Prepared::new(spec, ProgramKind::BatchTransfer, "Transfer successful")
            .with_derived_address(vault))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedgerClient;
    use crate::response::FailureKind;
    use crate::submit::PACKET_DATA_SIZE;
    use crate::testing::{context, ledger_with_accounts, mint_account, wallet};
    use chain_sol::Signer;
    use std::sync::Mutex;

    const MINT: Pubkey = Pubkey::new_from_array([7; 32]);

    fn service() -> (BatchTransferService, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ledger = ledger_with_accounts(vec![(MINT, mint_account(6))], sent.clone());
        (BatchTransferService::new(context(ledger), Arc::new(wallet())), sent)
    }

    fn receivers(n: u8) -> Vec<Transfer> {
        (1..=n)
            .map(|i| Transfer::new(Pubkey::new_from_array([i; 32]), 1_000u64))
            .collect()
    }

    #[tokio::test]
    async fn deposit_sol_targets_the_owner_vault() {
        let (svc, _) = service();
        let prepared = svc
            .prepare_deposit(&Amount::Base(1_000_000), &TokenKind::Native)
            .await
            .unwrap();

        let vault = svc.vault().unwrap();
        assert_eq!(prepared.derived_address, Some(vault));
        assert_eq!(prepared.spec.accounts[1], AccountMeta::new(vault, false));
        let args = svc
            .ctx
            .registry
            .batch_transfer()
            .decode_instruction("depositSol", &prepared.spec.data)
            .unwrap();
        assert_eq!(args, vec![ArgValue::U64(1_000_000)]);
    }

    #[tokio::test]
    async fn withdraw_token_scales_by_mint_decimals() {
        let (svc, _) = service();
        let prepared = svc
            .prepare_withdraw(&Amount::Ui("0.5".into()), &TokenKind::Token { mint: MINT })
            .await
            .unwrap();
        let args = svc
            .ctx
            .registry
            .batch_transfer()
            .decode_instruction("withdrawToken", &prepared.spec.data)
            .unwrap();
        assert_eq!(args, vec![ArgValue::U64(500_000)]);
    }

    #[tokio::test]
    async fn native_batch_lists_receivers_as_remaining_accounts() {
        let (svc, sent) = service();
        let transfers = receivers(3);

        let prepared = svc
            .prepare_instant_transfer(&transfers, &TokenKind::Native)
            .await
            .unwrap();
        let tail: Vec<_> = prepared.spec.accounts[4..].to_vec();
        assert_eq!(
            tail,
            transfers.iter().map(|t| AccountMeta::new(t.receiver, false)).collect::<Vec<_>>()
        );
        let fee_vault = derive::batch_fee_vault(&svc.ctx.ids.batch_transfer).unwrap().address;
        assert_eq!(prepared.spec.accounts[2].pubkey, fee_vault);

        let result = svc.instant_transfer(transfers, TokenKind::Native).await;
        assert!(result.is_success(), "{}", result.message);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn token_batch_pays_receiver_token_accounts() {
        let (svc, _) = service();
        let transfers = receivers(2);

        let prepared = svc
            .prepare_instant_transfer(&transfers, &TokenKind::Token { mint: MINT })
            .await
            .unwrap();
        assert_eq!(prepared.spec.pre_instructions.len(), 2);
        for (meta, t) in prepared.spec.accounts[9..].iter().zip(&transfers) {
            assert_eq!(meta.pubkey, derive::associated_token_account(&t.receiver, &MINT).unwrap());
        }
        assert_eq!(prepared.spec.accounts.len(), 9 + 2);
    }

    #[tokio::test]
    async fn batch_size_limits() {
        let (svc, sent) = service();

        let empty = svc.instant_transfer(vec![], TokenKind::Native).await;
        assert_eq!(empty.kind, Some(FailureKind::Precondition));

        let too_many = svc.instant_transfer(receivers(21), TokenKind::Native).await;
        assert_eq!(too_many.kind, Some(FailureKind::Precondition));

        assert!(svc
            .prepare_instant_transfer(&receivers(20), &TokenKind::Native)
            .await
            .is_ok());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn largest_batches_fit_one_packet() {
        let (svc, _) = service();
        let token = TokenKind::Token { mint: MINT };

        for (count, kind) in [
            (MAX_BATCH_RECEIVERS, &TokenKind::Native),
            (MAX_TOKEN_BATCH_RECEIVERS, &token),
        ] {
            let prepared = svc
                .prepare_instant_transfer(&receivers(count as u8), kind)
                .await
                .unwrap();
            let wire = svc.submitter.sign(&wallet(), &prepared.spec).await.unwrap();
            assert!(wire.len() <= PACKET_DATA_SIZE, "{count} receivers: {} bytes", wire.len());
        }
    }

    #[tokio::test]
    async fn token_batch_over_the_cap_is_refused_before_sending() {
        let (svc, sent) = service();
        let token = TokenKind::Token { mint: MINT };

        let result = svc
            .instant_transfer(receivers(MAX_TOKEN_BATCH_RECEIVERS as u8 + 1), token)
            .await;
        assert_eq!(result.kind, Some(FailureKind::Precondition));
        assert!(result.message.contains("at most 9 receivers"));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_amount_leg_is_refused() {
        let (svc, _) = service();
        let mut transfers = receivers(2);
        transfers[1].amount = Amount::Base(0);

        let err = svc
            .prepare_instant_transfer(&transfers, &TokenKind::Native)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Precondition(_)));
    }

    #[tokio::test]
    async fn unknown_mint_fails_before_building() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let svc = BatchTransferService::new(
            context(ledger_with_accounts(vec![], sent.clone())),
            Arc::new(wallet()),
        );
        let result = svc
            .deposit(Amount::Base(1), TokenKind::Token { mint: MINT })
            .await;
        assert_eq!(result.kind, Some(FailureKind::Precondition));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn vault_is_per_owner() {
        let svc = BatchTransferService::new(context(MockLedgerClient::new()), Arc::new(wallet()));
        let expected =
            derive::batch_vault(&svc.ctx.ids.batch_transfer, &Signer::pubkey(&wallet())).unwrap();
        assert_eq!(svc.vault().unwrap(), expected.address);
    }
}
