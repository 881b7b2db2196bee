//! Multisig safes: creation, proposals, approvals and execution.
//!
//! A proposal records one instruction (program id, accounts, data) on chain.
//! Once enough owners approve, `executeTransaction` replays exactly that
//! instruction with the safe signer signing by program derivation.

use std::collections::HashSet;
use std::sync::Arc;

use chain_sol::{
    spl_token, system, AccountMeta, Instruction, Keypair, Pubkey, Signer, SYSVAR_RENT_ID,
};
use program_idl::{ArgValue, DecodedAccount, ProgramKind};
use tracing::instrument;

use crate::accounts::{multisig as accounts, WithRemaining};
use crate::builder::InstructionSpec;
use crate::context::SdkContext;
use crate::derive;
use crate::error::SdkError;
use crate::response::OperationResult;
use crate::stream::{
    check_schedule, guard_token_toggle, StreamInstructions, StreamParams, StreamRef, StreamTerms,
};
use crate::submit::{Prepared, Submitter};
use crate::token::{load_mint, resolve_amount, Amount, TokenKind};
use crate::wallet::WalletSigner;

const SAFE_LAYOUT: &str = "Multisig";
const PROPOSAL_LAYOUT: &str = "Transaction";

/// Safes are allocated for at least this many owners so owner sets can grow.
pub const MIN_OWNER_CAPACITY: usize = 10;

/// A decoded multisig account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeState {
    pub owners: Vec<Pubkey>,
    pub threshold: u64,
    pub nonce: u8,
    pub owner_set_seqno: u32,
}

impl SafeState {
    fn from_decoded(account: &DecodedAccount) -> Result<Self, SdkError> {
        let owners = account
            .get("owners")?
            .as_vec()
            .ok_or_else(|| SdkError::SchemaMismatch("owners is not a list".into()))?
            .iter()
            .map(|v| {
                v.as_pubkey()
                    .ok_or_else(|| SdkError::SchemaMismatch("owner is not a key".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            owners,
            threshold: account.u64("threshold")?,
            nonce: u8_field(account, "nonce")?,
            owner_set_seqno: u32_field(account, "ownerSetSeqno")?,
        })
    }

    pub fn is_owner(&self, key: &Pubkey) -> bool {
        self.owners.contains(key)
    }
}

/// A decoded proposal account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalState {
    pub multisig: Pubkey,
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
    /// One flag per owner, in owner order.
    pub signers: Vec<bool>,
    pub did_execute: bool,
    pub owner_set_seqno: u32,
}

impl ProposalState {
    fn from_decoded(account: &DecodedAccount) -> Result<Self, SdkError> {
        let mismatch = |what: &str| SdkError::SchemaMismatch(format!("proposal {what}"));

        let accounts = account
            .get("accounts")?
            .as_vec()
            .ok_or_else(|| mismatch("accounts is not a list"))?
            .iter()
            .map(|entry| {
                let fields = entry.as_struct().ok_or_else(|| mismatch("account is not a struct"))?;
                match fields {
                    [
                        ArgValue::PublicKey(pubkey),
                        ArgValue::Bool(is_signer),
                        ArgValue::Bool(is_writable),
                    ] => Ok(AccountMeta {
                        pubkey: *pubkey,
                        is_signer: *is_signer,
                        is_writable: *is_writable,
                    }),
                    _ => Err(mismatch("account has unexpected fields")),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let signers = account
            .get("signers")?
            .as_vec()
            .ok_or_else(|| mismatch("signers is not a list"))?
            .iter()
            .map(|v| v.as_bool().ok_or_else(|| mismatch("signer flag is not a bool")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            multisig: account.pubkey("multisig")?,
            program_id: account.pubkey("programId")?,
            accounts,
            data: account
                .get("data")?
                .as_bytes()
                .ok_or_else(|| mismatch("data is not bytes"))?
                .to_vec(),
            signers,
            did_execute: account.bool("didExecute")?,
            owner_set_seqno: u32_field(account, "ownerSetSeqno")?,
        })
    }

    /// The proposed instruction as stored.
    pub fn instruction(&self) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: self.accounts.clone(),
            data: self.data.clone(),
        }
    }

    pub fn approvals(&self) -> usize {
        self.signers.iter().filter(|s| **s).count()
    }
}

fn u8_field(account: &DecodedAccount, name: &str) -> Result<u8, SdkError> {
    account
        .get(name)?
        .as_u64()
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| SdkError::SchemaMismatch(format!("{name} is not a u8")))
}

fn u32_field(account: &DecodedAccount, name: &str) -> Result<u32, SdkError> {
    account
        .get(name)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| SdkError::SchemaMismatch(format!("{name} is not a u32")))
}

fn transaction_accounts(metas: &[AccountMeta]) -> ArgValue {
    ArgValue::Vec(
        metas
            .iter()
            .map(|m| {
                ArgValue::Struct(vec![
                    ArgValue::PublicKey(m.pubkey),
                    ArgValue::Bool(m.is_signer),
                    ArgValue::Bool(m.is_writable),
                ])
            })
            .collect(),
    )
}

fn owner_list(owners: &[Pubkey]) -> ArgValue {
    ArgValue::Vec(owners.iter().copied().map(ArgValue::PublicKey).collect())
}

fn check_owners(owners: &[Pubkey]) -> Result<(), SdkError> {
    if owners.is_empty() {
        return Err(SdkError::Precondition("a safe needs at least one owner".into()));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = owners.iter().find(|o| !seen.insert(**o)) {
        return Err(SdkError::Precondition(format!("owner {dup} is listed twice")));
    }
    Ok(())
}

fn check_threshold(threshold: u64, owners: usize) -> Result<(), SdkError> {
    if threshold == 0 || threshold > owners as u64 {
        return Err(SdkError::Precondition(format!(
            "threshold must be between 1 and {owners}, got {threshold}"
        )));
    }
    Ok(())
}

/// Multisig-program operations signed by one owner's wallet.
#[derive(Clone)]
pub struct MultisigService {
    ctx: Arc<SdkContext>,
    wallet: Arc<dyn WalletSigner>,
    submitter: Submitter,
}

impl MultisigService {
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

    fn program(&self) -> Pubkey {
        self.ctx.ids.multisig
    }

    /// The key a safe signs with; funds held by the safe live here.
    pub fn safe_signer(&self, multisig: &Pubkey) -> Result<Pubkey, SdkError> {
        Ok(derive::multisig_signer(&self.program(), multisig)?.address)
    }

    async fn run(&self, prepared: Result<Prepared, SdkError>) -> OperationResult {
        self.submitter.run(self.wallet.as_ref(), prepared).await
    }

    // -- safes ----------------------------------------------------------------

    /// Create a safe. The derived address of the result is the new multisig
    /// account; use [`safe_signer`](Self::safe_signer) for its funding address.
    #[instrument(skip(self, owners), fields(owners = owners.len()))]
    pub async fn create_safe(&self, owners: Vec<Pubkey>, threshold: u64) -> OperationResult {
        self.run(self.prepare_create_safe(&owners, threshold)).await
    }

    pub fn prepare_create_safe(
        &self,
        owners: &[Pubkey],
        threshold: u64,
    ) -> Result<Prepared, SdkError> {
        check_owners(owners)?;
        check_threshold(threshold, owners.len())?;

        let safe = Keypair::generate();
        let safe_key = Signer::pubkey(&safe);
        let nonce = derive::multisig_signer(&self.program(), &safe_key)?.bump;

        let interface = self.ctx.interface(ProgramKind::Multisig);
        let capacity = owners.len().max(MIN_OWNER_CAPACITY);
        let space = interface
            .encode_account(
                SAFE_LAYOUT,
                &[
                    owner_list(&vec![Pubkey::default(); capacity]),
                    ArgValue::U64(threshold),
                    ArgValue::U8(nonce),
                    ArgValue::U32(0),
                ],
            )?
            .len();

        let spec = self
            .ctx
            .builder(ProgramKind::Multisig)
            .build_for(
                &[owner_list(owners), ArgValue::U64(threshold), ArgValue::U8(nonce)],
                &accounts::CreateMultisig {
                    multisig: safe_key,
                    rent: SYSVAR_RENT_ID,
                },
            )?
            .with_pre_instruction(system::create_account(
                &self.owner(),
                &safe_key,
                system::rent_exempt_minimum(space),
                space as u64,
                &self.program(),
            ))
            .with_signer(safe);

        Ok(Prepared::new(spec, ProgramKind::Multisig, "Safe created")
            .with_derived_address(safe_key))
    }

    /// Move funds from the wallet into the safe signer's account.
    #[instrument(skip(self))]
    pub async fn fund_safe(
        &self,
        multisig: Pubkey,
        amount: Amount,
        token: TokenKind,
    ) -> OperationResult {
        self.run(self.prepare_fund_safe(&multisig, &amount, &token).await).await
    }

    pub async fn prepare_fund_safe(
        &self,
        multisig: &Pubkey,
        amount: &Amount,
        token: &TokenKind,
    ) -> Result<Prepared, SdkError> {
        let signer = self.safe_signer(multisig)?;
        let from = self.owner();

        let spec = match token {
            TokenKind::Native => {
                let lamports = resolve_amount(self.ctx.ledger.as_ref(), amount, token).await?;
                InstructionSpec::from_instruction(system::transfer(&from, &signer, lamports))
            }
            TokenKind::Token { mint } => {
                let decimals = load_mint(self.ctx.ledger.as_ref(), mint).await?.decimals;
                let units = amount.to_base_units(decimals)?;
                if units == 0 {
                    return Err(SdkError::Precondition("amount must be greater than zero".into()));
                }
                let source = derive::associated_token_account(&from, mint)?;
                let destination = derive::associated_token_account(&signer, mint)?;
                InstructionSpec::from_instruction(spl_token::transfer_checked(
                    &source,
                    mint,
                    &destination,
                    &from,
                    units,
                    decimals,
                )?)
                .with_pre_instruction(spl_token::create_associated_token_account_idempotent(
                    &from, &signer, mint,
                )?)
            }
        };

        Ok(Prepared::new(spec, ProgramKind::Multisig, "Safe funded").with_derived_address(signer))
    }

    // -- proposals --------------------------------------------------------------

    /// Record `inner` as a proposal. Pre-instructions and extra signers of
    /// `inner` run in the proposing transaction; only its main instruction is
    /// stored. The derived address of the result is the proposal account.
    #[instrument(skip(self, inner), fields(program = %inner.program_id))]
    pub async fn propose(&self, multisig: Pubkey, inner: InstructionSpec) -> OperationResult {
        self.run(self.prepare_propose(&multisig, inner).await).await
    }

    pub async fn prepare_propose(
        &self,
        multisig: &Pubkey,
        inner: InstructionSpec,
    ) -> Result<Prepared, SdkError> {
        let safe = self.fetch_safe(multisig).await?;
        let proposer = self.owner();
        if !safe.is_owner(&proposer) {
            return Err(SdkError::Precondition(format!(
                "{proposer} is not an owner of safe {multisig}"
            )));
        }

        let proposal = Keypair::generate();
        let proposal_key = Signer::pubkey(&proposal);
        let stored = inner.instruction();

        let interface = self.ctx.interface(ProgramKind::Multisig);
        let space = interface
            .encode_account(
                PROPOSAL_LAYOUT,
                &[
                    ArgValue::PublicKey(*multisig),
                    ArgValue::PublicKey(stored.program_id),
                    transaction_accounts(&stored.accounts),
                    ArgValue::Bytes(stored.data.clone()),
                    ArgValue::Vec(vec![ArgValue::Bool(false); safe.owners.len()]),
                    ArgValue::Bool(false),
                    ArgValue::U32(safe.owner_set_seqno),
                ],
            )?
            .len();

        let mut spec = self.ctx.builder(ProgramKind::Multisig).build_for(
            &[
                ArgValue::PublicKey(stored.program_id),
                transaction_accounts(&stored.accounts),
                ArgValue::Bytes(stored.data),
            ],
            &accounts::CreateTransaction {
                multisig: *multisig,
                transaction: proposal_key,
                proposer,
                rent: SYSVAR_RENT_ID,
            },
        )?;

        spec.pre_instructions = inner.pre_instructions;
        spec.extra_signers = inner.extra_signers;
        let spec = spec
            .with_pre_instruction(system::create_account(
                &proposer,
                &proposal_key,
                system::rent_exempt_minimum(space),
                space as u64,
                &self.program(),
            ))
            .with_signer(proposal);

        Ok(Prepared::new(spec, ProgramKind::Multisig, "Transaction proposed")
            .with_derived_address(proposal_key))
    }

    fn stream_ixs(&self) -> StreamInstructions<'_> {
        StreamInstructions::new(&self.ctx)
    }

    pub async fn propose_deposit(
        &self,
        multisig: Pubkey,
        amount: Amount,
        token: TokenKind,
    ) -> OperationResult {
        let prepared = async {
            let signer = self.safe_signer(&multisig)?;
            let units = resolve_amount(self.ctx.ledger.as_ref(), &amount, &token).await?;
            let inner = self.stream_ixs().deposit(&signer, units, &token)?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    pub async fn propose_withdraw_deposit(
        &self,
        multisig: Pubkey,
        amount: Amount,
        token: TokenKind,
    ) -> OperationResult {
        let prepared = async {
            let signer = self.safe_signer(&multisig)?;
            let units = resolve_amount(self.ctx.ledger.as_ref(), &amount, &token).await?;
            let inner = self.stream_ixs().withdraw_deposit(&signer, units, &token)?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    /// Propose a stream from the safe. The stream account is created by the
    /// proposing transaction and reported as the stream address.
    pub async fn propose_stream(&self, multisig: Pubkey, params: StreamParams) -> OperationResult {
        self.run(self.prepare_propose_stream(&multisig, &params).await).await
    }

    pub async fn prepare_propose_stream(
        &self,
        multisig: &Pubkey,
        params: &StreamParams,
    ) -> Result<Prepared, SdkError> {
        check_schedule(params.start_time, params.end_time)?;
        let signer = self.safe_signer(multisig)?;
        if params.receiver == signer {
            return Err(SdkError::Precondition("receiver must differ from the safe".into()));
        }
        let amount = resolve_amount(self.ctx.ledger.as_ref(), &params.amount, &params.token).await?;

        let stream = Keypair::generate();
        let stream_key = Signer::pubkey(&stream);
        let terms = StreamTerms {
            start_time: params.start_time,
            end_time: params.end_time,
            amount,
            can_cancel: params.can_cancel,
            can_update: params.can_update,
        };
        let ixs = self.stream_ixs();
        let inner = ixs
            .start(&signer, &params.receiver, &stream_key, &terms, &params.token)?
            .with_pre_instruction(ixs.create_stream_account(
                &self.owner(),
                &stream_key,
                &params.token,
            )?)
            .with_signer(stream);

        Ok(self
            .prepare_propose(multisig, inner)
            .await?
            .with_stream_address(stream_key))
    }

    pub async fn propose_pause(&self, multisig: Pubkey, target: StreamRef) -> OperationResult {
        let prepared = async {
            let signer = self.safe_signer(&multisig)?;
            if matches!(target.token, TokenKind::Token { .. }) {
                guard_token_toggle(&self.ctx, &target.stream, &signer, true).await?;
            }
            let inner = self
                .stream_ixs()
                .pause(&signer, &target.receiver, &target.stream, &target.token)?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    pub async fn propose_resume(&self, multisig: Pubkey, target: StreamRef) -> OperationResult {
        let prepared = async {
            let signer = self.safe_signer(&multisig)?;
            if matches!(target.token, TokenKind::Token { .. }) {
                guard_token_toggle(&self.ctx, &target.stream, &signer, false).await?;
            }
            let inner = self
                .stream_ixs()
                .resume(&signer, &target.receiver, &target.stream, &target.token)?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    pub async fn propose_cancel(&self, multisig: Pubkey, target: StreamRef) -> OperationResult {
        let prepared = async {
            let signer = self.safe_signer(&multisig)?;
            let inner = self
                .stream_ixs()
                .cancel(&signer, &target.receiver, &target.stream, &target.token)?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    pub async fn propose_instant_transfer(
        &self,
        multisig: Pubkey,
        receiver: Pubkey,
        amount: Amount,
        token: TokenKind,
    ) -> OperationResult {
        let prepared = async {
            let signer = self.safe_signer(&multisig)?;
            let units = resolve_amount(self.ctx.ledger.as_ref(), &amount, &token).await?;
            let inner = self
                .stream_ixs()
                .instant_transfer(&signer, &receiver, units, &token)?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    /// Propose replacing the owner set.
    pub async fn propose_set_owners(
        &self,
        multisig: Pubkey,
        owners: Vec<Pubkey>,
    ) -> OperationResult {
        let prepared = async {
            check_owners(&owners)?;
            let inner = self.ctx.builder(ProgramKind::Multisig).build_for(
                &[owner_list(&owners)],
                &accounts::SetOwners {
                    multisig,
                    multisig_signer: self.safe_signer(&multisig)?,
                },
            )?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    pub async fn propose_change_threshold(
        &self,
        multisig: Pubkey,
        threshold: u64,
    ) -> OperationResult {
        let prepared = async {
            let safe = self.fetch_safe(&multisig).await?;
            check_threshold(threshold, safe.owners.len())?;
            let inner = self.ctx.builder(ProgramKind::Multisig).build_for(
                &[ArgValue::U64(threshold)],
                &accounts::ChangeThreshold {
                    multisig,
                    multisig_signer: self.safe_signer(&multisig)?,
                },
            )?;
            self.prepare_propose(&multisig, inner).await
        };
        self.run(prepared.await).await
    }

    // -- approval and execution -------------------------------------------------

    #[instrument(skip(self))]
    pub async fn approve(&self, multisig: Pubkey, transaction: Pubkey) -> OperationResult {
        self.run(self.prepare_approve(&multisig, &transaction).await).await
    }

    pub async fn prepare_approve(
        &self,
        multisig: &Pubkey,
        transaction: &Pubkey,
    ) -> Result<Prepared, SdkError> {
        let owner = self.owner();
        if !self.fetch_safe(multisig).await?.is_owner(&owner) {
            return Err(SdkError::Precondition(format!(
                "{owner} is not an owner of safe {multisig}"
            )));
        }
        let spec = self.ctx.builder(ProgramKind::Multisig).build_for(
            &[],
            &accounts::Approve {
                multisig: *multisig,
                transaction: *transaction,
                owner,
            },
        )?;
        Ok(Prepared::new(spec, ProgramKind::Multisig, "Transaction approved")
            .with_derived_address(*transaction))
    }

    /// Execute a proposal, trusting the caller's copy of its instruction.
    /// The program refuses anything that was not proposed.
    #[instrument(skip(self, inner))]
    pub async fn execute_transaction(
        &self,
        multisig: Pubkey,
        transaction: Pubkey,
        inner: Instruction,
    ) -> OperationResult {
        self.run(self.prepare_execute(&multisig, &transaction, &inner)).await
    }

    /// Build the `executeTransaction` envelope for `inner`.
    pub fn prepare_execute(
        &self,
        multisig: &Pubkey,
        transaction: &Pubkey,
        inner: &Instruction,
    ) -> Result<Prepared, SdkError> {
        let signer = self.safe_signer(multisig)?;

        // The safe signer signs by derivation, never in the wire transaction.
        let mut remaining: Vec<AccountMeta> = inner
            .accounts
            .iter()
            .map(|meta| AccountMeta {
                is_signer: meta.is_signer && meta.pubkey != signer,
                ..*meta
            })
            .collect();
        remaining.push(AccountMeta::new_readonly(inner.program_id, false));

        let spec = self.ctx.builder(ProgramKind::Multisig).build_for(
            &[],
            &WithRemaining {
                accounts: accounts::ExecuteTransaction {
                    multisig: *multisig,
                    multisig_signer: signer,
                    transaction: *transaction,
                },
                remaining,
            },
        )?;
        Ok(Prepared::new(spec, ProgramKind::Multisig, "Transaction executed")
            .with_derived_address(*transaction))
    }

    /// Execute what the proposal account actually stores.
    #[instrument(skip(self))]
    pub async fn execute_proposal(&self, multisig: Pubkey, transaction: Pubkey) -> OperationResult {
        let prepared = async {
            let proposal = self.executable_proposal(&multisig, &transaction).await?;
            self.prepare_execute(&multisig, &transaction, &proposal.instruction())
        };
        self.run(prepared.await).await
    }

    /// Execute only if the stored proposal is exactly `expected`.
    #[instrument(skip(self, expected))]
    pub async fn execute_checked(
        &self,
        multisig: Pubkey,
        transaction: Pubkey,
        expected: Instruction,
    ) -> OperationResult {
        let prepared = async {
            let proposal = self.executable_proposal(&multisig, &transaction).await?;
            if proposal.instruction() != expected {
                return Err(SdkError::Precondition(format!(
                    "proposal {transaction} does not match the expected instruction"
                )));
            }
            self.prepare_execute(&multisig, &transaction, &expected)
        };
        self.run(prepared.await).await
    }

    async fn executable_proposal(
        &self,
        multisig: &Pubkey,
        transaction: &Pubkey,
    ) -> Result<ProposalState, SdkError> {
        let proposal = self.fetch_proposal(transaction).await?;
        if proposal.multisig != *multisig {
            return Err(SdkError::Precondition(format!(
                "proposal {transaction} belongs to safe {}",
                proposal.multisig
            )));
        }
        if proposal.did_execute {
            return Err(SdkError::Precondition(format!(
                "proposal {transaction} was already executed"
            )));
        }
        Ok(proposal)
    }

    // -- reads --------------------------------------------------------------------

    pub async fn fetch_safe(&self, multisig: &Pubkey) -> Result<SafeState, SdkError> {
        let account = self.ctx.fetch_owned(multisig, &self.program(), "safe").await?;
        let decoded = self
            .ctx
            .interface(ProgramKind::Multisig)
            .decode_account(SAFE_LAYOUT, &account.data)?;
        SafeState::from_decoded(&decoded)
    }

    pub async fn fetch_proposal(&self, transaction: &Pubkey) -> Result<ProposalState, SdkError> {
        let account = self
            .ctx
            .fetch_owned(transaction, &self.program(), "proposal")
            .await?;
        let decoded = self
            .ctx
            .interface(ProgramKind::Multisig)
            .decode_account(PROPOSAL_LAYOUT, &account.data)?;
        ProposalState::from_decoded(&decoded)
    }
}
