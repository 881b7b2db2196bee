//! Payment streams: deposits, stream lifecycle and transfers.

mod instructions;
mod state;

pub use instructions::{StreamInstructions, StreamTerms, STREAM_ACCOUNT_RESERVE};
pub use state::{StreamState, StreamStatus, NATIVE_LAYOUT, TOKEN_LAYOUT};

use std::sync::Arc;

use chain_sol::{Keypair, Pubkey, Signer};
use program_idl::ProgramKind;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::context::SdkContext;
use crate::derive;
use crate::error::SdkError;
use crate::response::OperationResult;
use crate::submit::{Prepared, Submitter};
use crate::token::{resolve_amount, Amount, TokenKind};
use crate::wallet::WalletSigner;

/// Inputs of a new stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub receiver: Pubkey,
    /// Unix seconds.
    pub start_time: u64,
    pub end_time: u64,
    pub amount: Amount,
    pub token: TokenKind,
    pub can_cancel: bool,
    pub can_update: bool,
}

/// An existing stream, seen from its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRef {
    pub stream: Pubkey,
    pub receiver: Pubkey,
    pub token: TokenKind,
}

/// An existing stream, seen from its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawParams {
    pub stream: Pubkey,
    pub sender: Pubkey,
    pub token: TokenKind,
}

/// Stream-program operations signed by one wallet.
#[derive(Clone)]
pub struct StreamService {
    ctx: Arc<SdkContext>,
    wallet: Arc<dyn WalletSigner>,
    submitter: Submitter,
}

impl StreamService {
    pub fn new(ctx: Arc<SdkContext>, wallet: Arc<dyn WalletSigner>) -> Self {
        Self {
            submitter: Submitter::new(ctx.clone()),
            ctx,
            wallet,
        }
    }

    fn authority(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    fn instructions(&self) -> StreamInstructions<'_> {
        StreamInstructions::new(&self.ctx)
    }

    fn vault(&self) -> Result<Pubkey, SdkError> {
        Ok(derive::zebec_vault(&self.ctx.ids.stream, &self.authority())?.address)
    }

    async fn run(&self, prepared: Result<Prepared, SdkError>) -> OperationResult {
        self.submitter.run(self.wallet.as_ref(), prepared).await
    }

    fn prepared(spec: crate::builder::InstructionSpec, label: &str) -> Prepared {
        Prepared::new(spec, ProgramKind::Stream, label)
    }

    // -- fee vault --------------------------------------------------------

    pub async fn create_fee_vault(&self, fee_percentage: u64) -> OperationResult {
        self.run(self.prepare_create_fee_vault(fee_percentage)).await
    }

    pub fn prepare_create_fee_vault(&self, fee_percentage: u64) -> Result<Prepared, SdkError> {
        if self.authority() != self.ctx.ids.fee_owner {
            return Err(SdkError::Precondition(format!(
                "only the fee owner {} can create the fee vault",
                self.ctx.ids.fee_owner
            )));
        }
        let spec = self.instructions().create_fee_vault(fee_percentage)?;
        let vault = derive::fee_vault(&self.ctx.ids.stream, &self.ctx.ids.fee_owner)?.address;
        Ok(Self::prepared(spec, "Fee vault created").with_derived_address(vault))
    }

    // -- deposits -----------------------------------------------------------

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
        let spec = self.instructions().deposit(&self.authority(), amount, token)?;
        Ok(Self::prepared(spec, "Deposit successful").with_derived_address(self.vault()?))
    }

    #[instrument(skip(self))]
    pub async fn withdraw_deposit(&self, amount: Amount, token: TokenKind) -> OperationResult {
        self.run(self.prepare_withdraw_deposit(&amount, &token).await).await
    }

    pub async fn prepare_withdraw_deposit(
        &self,
        amount: &Amount,
        token: &TokenKind,
    ) -> Result<Prepared, SdkError> {
        let amount = resolve_amount(self.ctx.ledger.as_ref(), amount, token).await?;
        let spec = self
            .instructions()
            .withdraw_deposit(&self.authority(), amount, token)?;
        Ok(Self::prepared(spec, "Deposit withdrawn").with_derived_address(self.vault()?))
    }

    // -- stream lifecycle -----------------------------------------------------

    /// Start a stream. The stream account is created in the same transaction;
    /// its address is returned as the derived address.
    #[instrument(skip(self), fields(receiver = %params.receiver))]
    pub async fn init(&self, params: StreamParams) -> OperationResult {
        self.run(self.prepare_init(&params).await).await
    }

    pub async fn prepare_init(&self, params: &StreamParams) -> Result<Prepared, SdkError> {
        let sender = self.authority();
        check_schedule(params.start_time, params.end_time)?;
        if params.receiver == sender {
            return Err(SdkError::Precondition(
                "receiver must differ from the sender".into(),
            ));
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

        let ixs = self.instructions();
        let spec = ixs
            .start(&sender, &params.receiver, &stream_key, &terms, &params.token)?
            .with_pre_instruction(ixs.create_stream_account(&sender, &stream_key, &params.token)?)
            .with_signer(stream);

        Ok(Self::prepared(spec, "Stream started")
            .with_derived_address(stream_key)
            .with_stream_address(stream_key))
    }

    #[instrument(skip(self), fields(stream = %target.stream))]
    pub async fn pause(&self, target: StreamRef) -> OperationResult {
        self.run(self.prepare_pause(&target).await).await
    }

    pub async fn prepare_pause(&self, target: &StreamRef) -> Result<Prepared, SdkError> {
        if matches!(target.token, TokenKind::Token { .. }) {
            guard_token_toggle(&self.ctx, &target.stream, &self.authority(), true).await?;
        }
        let spec = self.instructions().pause(
            &self.authority(),
            &target.receiver,
            &target.stream,
            &target.token,
        )?;
        Ok(Self::prepared(spec, "Stream paused").with_stream_address(target.stream))
    }

    #[instrument(skip(self), fields(stream = %target.stream))]
    pub async fn resume(&self, target: StreamRef) -> OperationResult {
        self.run(self.prepare_resume(&target).await).await
    }

    pub async fn prepare_resume(&self, target: &StreamRef) -> Result<Prepared, SdkError> {
        if matches!(target.token, TokenKind::Token { .. }) {
            guard_token_toggle(&self.ctx, &target.stream, &self.authority(), false).await?;
        }
        let spec = self.instructions().resume(
            &self.authority(),
            &target.receiver,
            &target.stream,
            &target.token,
        )?;
        Ok(Self::prepared(spec, "Stream resumed").with_stream_address(target.stream))
    }

    #[instrument(skip(self), fields(stream = %target.stream))]
    pub async fn cancel(&self, target: StreamRef) -> OperationResult {
        self.run(self.prepare_cancel(&target)).await
    }

    pub fn prepare_cancel(&self, target: &StreamRef) -> Result<Prepared, SdkError> {
        let spec = self.instructions().cancel(
            &self.authority(),
            &target.receiver,
            &target.stream,
            &target.token,
        )?;
        Ok(Self::prepared(spec, "Stream cancelled").with_stream_address(target.stream))
    }

    /// Receiver-side withdrawal of everything streamed so far.
    #[instrument(skip(self), fields(stream = %params.stream))]
    pub async fn withdraw(&self, params: WithdrawParams) -> OperationResult {
        self.run(self.prepare_withdraw(&params)).await
    }

    pub fn prepare_withdraw(&self, params: &WithdrawParams) -> Result<Prepared, SdkError> {
        let receiver = self.authority();
        if params.sender == receiver {
            return Err(SdkError::Precondition(
                "withdrawals are signed by the receiver, not the sender".into(),
            ));
        }
        let spec = self
            .instructions()
            .withdraw(&params.sender, &receiver, &params.stream, &params.token)?;
        Ok(Self::prepared(spec, "Withdrawal successful").with_stream_address(params.stream))
    }

    /// Pay `receiver` straight from the sender's vault.
    #[instrument(skip(self))]
    pub async fn instant_transfer(
        &self,
        receiver: Pubkey,
        amount: Amount,
        token: TokenKind,
    ) -> OperationResult {
        self.run(self.prepare_instant_transfer(&receiver, &amount, &token).await)
            .await
    }

    pub async fn prepare_instant_transfer(
        &self,
        receiver: &Pubkey,
        amount: &Amount,
        token: &TokenKind,
    ) -> Result<Prepared, SdkError> {
        let sender = self.authority();
        if *receiver == sender {
            return Err(SdkError::Precondition(
                "receiver must differ from the sender".into(),
            ));
        }
        let amount = resolve_amount(self.ctx.ledger.as_ref(), amount, token).await?;
        let spec = self
            .instructions()
            .instant_transfer(&sender, receiver, amount, token)?;
        Ok(Self::prepared(spec, "Transfer successful").with_derived_address(self.vault()?))
    }

    // -- reads ----------------------------------------------------------------

    pub async fn fetch_stream(&self, stream: &Pubkey) -> Result<StreamState, SdkError> {
        load_stream(&self.ctx, stream).await
    }

    /// Block time of a confirmed transaction. Waits the configured delay
    /// first; a transaction still missing afterwards is
    /// [`SdkError::NotYetVisible`].
    pub async fn transaction_time(&self, signature: &str) -> Result<i64, SdkError> {
        let timing = self.ctx.timing;
        sleep(timing.transaction_time_delay).await;

        for attempt in 0..timing.transaction_time_attempts.max(1) {
            if let Some(time) = self.ctx.ledger.get_transaction_time(signature).await? {
                return Ok(time);
            }
            debug!(%signature, attempt, "transaction not visible yet");
            sleep(timing.poll_interval).await;
        }
        Err(SdkError::NotYetVisible(format!(
            "transaction {signature} is not visible yet"
        )))
    }

    pub async fn cluster_time(&self) -> Result<i64, SdkError> {
        Ok(self.ctx.ledger.get_cluster_time().await?)
    }
}

/// Read and decode a stream account owned by the stream program.
pub(crate) async fn load_stream(
    ctx: &SdkContext,
    stream: &Pubkey,
) -> Result<StreamState, SdkError> {
    let account = ctx.fetch_owned(stream, &ctx.ids.stream, "stream").await?;
    StreamState::decode(ctx.interface(ProgramKind::Stream), &account.data)
}

/// The token toggle flips whatever state the stream is in, so the intended
/// direction is checked against the stored state first.
pub(crate) async fn guard_token_toggle(
    ctx: &SdkContext,
    stream: &Pubkey,
    sender: &Pubkey,
    pausing: bool,
) -> Result<(), SdkError> {
    let state = load_stream(ctx, stream).await?;
    if state.sender != *sender {
        return Err(SdkError::Precondition(format!(
            "stream {stream} was not created by {sender}"
        )));
    }
    match (pausing, state.paused) {
        (true, true) => Err(SdkError::Precondition("stream is already paused".into())),
        (false, false) => Err(SdkError::Precondition("stream is not paused".into())),
        _ => Ok(()),
    }
}

pub(crate) fn check_schedule(start_time: u64, end_time: u64) -> Result<(), SdkError> {
    if end_time <= start_time {
        return Err(SdkError::Precondition(format!(
            "end time {end_time} must be after start time {start_time}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountInfo, MockLedgerClient};
    use crate::response::FailureKind;
    use crate::testing::{
        context, context_with, fast_config, ledger_with_accounts, mint_account, wallet,
    };
    use std::sync::Mutex;

    const MINT: Pubkey = Pubkey::new_from_array([7; 32]);

    fn service(ledger: MockLedgerClient) -> StreamService {
        StreamService::new(context(ledger), Arc::new(wallet()))
    }

    fn params(token: TokenKind) -> StreamParams {
        StreamParams {
            receiver: Pubkey::new_from_array([2; 32]),
            start_time: 1_700_000_000,
            end_time: 1_700_003_600,
            amount: Amount::Ui("1.5".into()),
            token,
            can_cancel: true,
            can_update: true,
        }
    }

    fn stream_account(ctx: &SdkContext, paused: bool) -> AccountInfo {
        let mut state = state::tests::sample(TokenKind::Token { mint: MINT });
        state.sender = Signer::pubkey(&wallet());
        state.paused = paused;
        AccountInfo {
            owner: ctx.ids.stream,
            lamports: 1,
            data: state::tests::encode_stream(ctx.interface(ProgramKind::Stream), &state),
        }
    }

    #[tokio::test]
    async fn init_rejects_reversed_schedule_without_network() {
        let svc = service(MockLedgerClient::new());
        let mut p = params(TokenKind::Native);
        p.end_time = p.start_time;

        let result = svc.init(p).await;
        assert_eq!(result.kind, Some(FailureKind::Precondition));
        assert!(result.message.contains("end time"));
    }

    #[tokio::test]
    async fn init_rejects_self_stream() {
        let svc = service(MockLedgerClient::new());
        let mut p = params(TokenKind::Native);
        p.receiver = Signer::pubkey(&wallet());

        let err = svc.prepare_init(&p).await.unwrap_err();
        assert!(matches!(err, SdkError::Precondition(_)));
    }

    #[tokio::test]
    async fn init_with_bad_mint_fails_before_building() {
        let mut bad = mint_account(6);
        bad.data.truncate(80);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let svc = service(ledger_with_accounts(vec![(MINT, bad)], sent.clone()));

        let result = svc.init(params(TokenKind::Token { mint: MINT })).await;
        assert_eq!(result.kind, Some(FailureKind::Precondition));
        assert!(result.message.contains("invalid mint account size"));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn native_init_creates_the_stream_account() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let svc = service(ledger_with_accounts(vec![], sent.clone()));

        let prepared = svc.prepare_init(&params(TokenKind::Native)).await.unwrap();
        let stream = prepared.derived_address.unwrap();
        assert_eq!(prepared.stream_address, Some(stream));
        assert_eq!(prepared.spec.pre_instructions.len(), 1);
        assert_eq!(prepared.spec.extra_signer_keys(), vec![stream]);
        let args = svc
            .ctx
            .registry
            .stream()
            .decode_instruction("nativeStream", &prepared.spec.data)
            .unwrap();
        assert_eq!(args[2].as_u64(), Some(1_500_000_000));

        let result = svc.init(params(TokenKind::Native)).await;
        assert!(result.is_success(), "{}", result.message);
        let wire = sent.lock().unwrap()[0].clone();
        assert_eq!(wire[0], 2, "sender and stream account sign");
    }

    #[tokio::test]
    async fn token_pause_requires_a_running_stream() {
        let ctx = context(MockLedgerClient::new());
        let stream = Pubkey::new_from_array([8; 32]);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let svc = service(ledger_with_accounts(
            vec![(stream, stream_account(&ctx, true))],
            sent,
        ));
        let target = StreamRef {
            stream,
            receiver: Pubkey::new_from_array([2; 32]),
            token: TokenKind::Token { mint: MINT },
        };

        let err = svc.prepare_pause(&target).await.unwrap_err();
        assert_eq!(err, SdkError::Precondition("stream is already paused".into()));

        let resumed = svc.prepare_resume(&target).await.unwrap();
        assert_eq!(
            resumed.spec.data,
            program_idl::instruction_discriminator("pauseResumeTokenStream").to_vec()
        );
    }

    #[tokio::test]
    async fn token_resume_requires_a_paused_stream() {
        let ctx = context(MockLedgerClient::new());
        let stream = Pubkey::new_from_array([8; 32]);
        let svc = service(ledger_with_accounts(
            vec![(stream, stream_account(&ctx, false))],
            Arc::new(Mutex::new(Vec::new())),
        ));
        let target = StreamRef {
            stream,
            receiver: Pubkey::new_from_array([2; 32]),
            token: TokenKind::Token { mint: MINT },
        };

        assert!(svc.prepare_resume(&target).await.is_err());
        assert!(svc.prepare_pause(&target).await.is_ok());
    }

    #[test]
    fn fee_vault_needs_the_fee_owner() {
        let svc = service(MockLedgerClient::new());
        let err = svc.prepare_create_fee_vault(25).unwrap_err();
        assert!(matches!(err, SdkError::Precondition(_)));
    }

    #[test]
    fn withdraw_is_signed_by_the_receiver() {
        let svc = service(MockLedgerClient::new());
        let prepared = svc
            .prepare_withdraw(&WithdrawParams {
                stream: Pubkey::new_from_array([8; 32]),
                sender: Pubkey::new_from_array([1; 32]),
                token: TokenKind::Native,
            })
            .unwrap();
        let receiver_slot = prepared.spec.accounts[2];
        assert_eq!(receiver_slot.pubkey, Signer::pubkey(&wallet()));
        assert!(receiver_slot.is_signer);
    }

    #[tokio::test]
    async fn transaction_time_polls_until_visible() {
        let mut ledger = MockLedgerClient::new();
        let mut seq = mockall::Sequence::new();
        ledger
            .expect_get_transaction_time()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Box::pin(async { Ok(None) }));
        ledger
            .expect_get_transaction_time()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Box::pin(async { Ok(Some(1_700_000_123)) }));
        let svc = StreamService::new(context_with(ledger, fast_config()), Arc::new(wallet()));

        assert_eq!(svc.transaction_time("5sig").await.unwrap(), 1_700_000_123);
    }

    #[tokio::test]
    async fn missing_transaction_time_is_transient() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_transaction_time()
            .times(3)
            .returning(|_| Box::pin(async { Ok(None) }));
        let svc = StreamService::new(context_with(ledger, fast_config()), Arc::new(wallet()));

        let err = svc.transaction_time("5sig").await.unwrap_err();
        assert!(matches!(err, SdkError::NotYetVisible(_)));
        assert!(err.is_transient());
    }
}
