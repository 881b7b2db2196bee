//! Stream-program instructions for a given authority.
//!
//! Nothing here touches the ledger. The authority is the wallet for direct
//! calls and the safe signer when the instruction is proposed to a multisig.

use chain_sol::{
    system, Instruction, Pubkey, ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, SYSVAR_RENT_ID,
    TOKEN_PROGRAM_ID,
};
use program_idl::{ArgValue, ProgramKind};

use crate::accounts::stream as accounts;
use crate::builder::{InstructionBuilder, InstructionSpec};
use crate::context::SdkContext;
use crate::derive;
use crate::error::SdkError;
use crate::token::TokenKind;

use super::state::{NATIVE_LAYOUT, TOKEN_LAYOUT};

/// Bytes allocated past the declared stream layout. Deployed clients size
/// stream accounts 8 bytes larger than the program's struct.
pub const STREAM_ACCOUNT_RESERVE: usize = 8;

/// Schedule and flags of a new stream, amounts already in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTerms {
    pub start_time: u64,
    pub end_time: u64,
    pub amount: u64,
    pub can_cancel: bool,
    pub can_update: bool,
}

impl StreamTerms {
    fn args(&self) -> [ArgValue; 5] {
        [
            ArgValue::U64(self.start_time),
            ArgValue::U64(self.end_time),
            ArgValue::U64(self.amount),
            ArgValue::Bool(self.can_cancel),
            ArgValue::Bool(self.can_update),
        ]
    }
}

/// The fee accounts every stream instruction carries.
#[derive(Debug, Clone, Copy)]
struct FeeAccounts {
    owner: Pubkey,
    vault: Pubkey,
    vault_data: Pubkey,
}

pub struct StreamInstructions<'a> {
    ctx: &'a SdkContext,
}

impl<'a> StreamInstructions<'a> {
    pub fn new(ctx: &'a SdkContext) -> Self {
        Self { ctx }
    }

    fn builder(&self) -> InstructionBuilder<'a> {
        self.ctx.builder(ProgramKind::Stream)
    }

    fn program(&self) -> Pubkey {
        self.ctx.ids.stream
    }

    fn fees(&self) -> Result<FeeAccounts, SdkError> {
        let owner = self.ctx.ids.fee_owner;
        let vault = derive::fee_vault(&self.program(), &owner)?.address;
        let vault_data = derive::fee_vault_data(&self.program(), &owner, &vault)?.address;
        Ok(FeeAccounts {
            owner,
            vault,
            vault_data,
        })
    }

    fn vault(&self, owner: &Pubkey) -> Result<Pubkey, SdkError> {
        Ok(derive::zebec_vault(&self.program(), owner)?.address)
    }

    fn escrow(&self, owner: &Pubkey, token: &TokenKind) -> Result<Pubkey, SdkError> {
        let found = match token {
            TokenKind::Native => derive::withdraw_escrow_native(&self.program(), owner)?,
            TokenKind::Token { mint } => {
                derive::withdraw_escrow_token(&self.program(), owner, mint)?
            }
        };
        Ok(found.address)
    }

    /// Register the configured fee owner's vault. Signed by the fee owner.
    pub fn create_fee_vault(&self, fee_percentage: u64) -> Result<InstructionSpec, SdkError> {
        let fees = self.fees()?;
        self.builder().build_for(
            &[ArgValue::U64(fee_percentage)],
            &accounts::CreateFeeAccount {
                fee_owner: fees.owner,
                fee_vault_data: fees.vault_data,
                fee_vault: fees.vault,
                system_program: SYSTEM_PROGRAM_ID,
                rent: SYSVAR_RENT_ID,
            },
        )
    }

    pub fn deposit(
        &self,
        sender: &Pubkey,
        amount: u64,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        let vault = self.vault(sender)?;
        let args = [ArgValue::U64(amount)];
        match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &accounts::DepositSol {
                    zebec_vault: vault,
                    sender: *sender,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            ),
            TokenKind::Token { mint } => self.builder().build_for(
                &args,
                &accounts::DepositToken {
                    zebec_vault: vault,
                    source_account: *sender,
                    system_program: SYSTEM_PROGRAM_ID,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                    mint: *mint,
                    source_account_token_account: derive::associated_token_account(sender, mint)?,
                    pda_account_token_account: derive::associated_token_account(&vault, mint)?,
                },
            ),
        }
    }

    /// Move unstreamed funds from the vault back to the sender.
    pub fn withdraw_deposit(
        &self,
        sender: &Pubkey,
        amount: u64,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        let vault = self.vault(sender)?;
        let withdraw_data = self.escrow(sender, token)?;
        let args = [ArgValue::U64(amount)];
        match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &accounts::NativeWithdrawal {
                    zebec_vault: vault,
                    withdraw_data,
                    sender: *sender,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            ),
            TokenKind::Token { mint } => self.builder().build_for(
                &args,
                &accounts::TokenWithdrawal {
                    zebec_vault: vault,
                    withdraw_data,
                    source_account: *sender,
                    system_program: SYSTEM_PROGRAM_ID,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                    mint: *mint,
                    source_account_token_account: derive::associated_token_account(sender, mint)?,
                    pda_account_token_account: derive::associated_token_account(&vault, mint)?,
                },
            ),
        }
    }

    /// `CreateAccount` for a stream data account, sized from its layout plus
    /// [`STREAM_ACCOUNT_RESERVE`] and owned by the stream program.
    pub fn create_stream_account(
        &self,
        payer: &Pubkey,
        stream: &Pubkey,
        token: &TokenKind,
    ) -> Result<Instruction, SdkError> {
        let layout = match token {
            TokenKind::Native => NATIVE_LAYOUT,
            TokenKind::Token { .. } => TOKEN_LAYOUT,
        };
        let space = self.builder().interface().account_size(layout)? + STREAM_ACCOUNT_RESERVE;
        Ok(system::create_account(
            payer,
            stream,
            system::rent_exempt_minimum(space),
            space as u64,
            &self.program(),
        ))
    }

    /// Start a stream into an already allocated `stream` account.
    pub fn start(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        stream: &Pubkey,
        terms: &StreamTerms,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        let fees = self.fees()?;
        let withdraw_data = self.escrow(sender, token)?;
        let args = terms.args();
        match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &accounts::NativeStream {
                    data_account: *stream,
                    withdraw_data,
                    fee_owner: fees.owner,
                    fee_vault_data: fees.vault_data,
                    fee_vault: fees.vault,
                    sender: *sender,
                    receiver: *receiver,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            ),
            TokenKind::Token { mint } => self.builder().build_for(
                &args,
                &accounts::TokenStream {
                    data_account: *stream,
                    withdraw_data,
                    fee_owner: fees.owner,
                    fee_vault_data: fees.vault_data,
                    fee_vault: fees.vault,
                    source_account: *sender,
                    dest_account: *receiver,
                    system_program: SYSTEM_PROGRAM_ID,
                    token_program: TOKEN_PROGRAM_ID,
                    mint: *mint,
                    rent: SYSVAR_RENT_ID,
                },
            ),
        }
    }

    pub fn pause(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        stream: &Pubkey,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        match token {
            TokenKind::Native => self.builder().build_for(
                &[],
                &accounts::PauseStream {
                    sender: *sender,
                    receiver: *receiver,
                    data_account: *stream,
                },
            ),
            TokenKind::Token { .. } => self.toggle_token_stream(sender, receiver, stream),
        }
    }

    pub fn resume(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        stream: &Pubkey,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        match token {
            TokenKind::Native => self.builder().build_for(
                &[],
                &accounts::ResumeStream {
                    sender: *sender,
                    receiver: *receiver,
                    data_account: *stream,
                },
            ),
            TokenKind::Token { .. } => self.toggle_token_stream(sender, receiver, stream),
        }
    }

    /// Token streams pause and resume through one toggle instruction.
    fn toggle_token_stream(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        stream: &Pubkey,
    ) -> Result<InstructionSpec, SdkError> {
        self.builder().build_for(
            &[],
            &accounts::PauseResumeTokenStream {
                sender: *sender,
                receiver: *receiver,
                data_account: *stream,
            },
        )
    }

    pub fn cancel(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        stream: &Pubkey,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        let fees = self.fees()?;
        let vault = self.vault(sender)?;
        let withdraw_data = self.escrow(sender, token)?;
        match token {
            TokenKind::Native => self.builder().build_for(
                &[],
                &accounts::CancelStream {
                    zebec_vault: vault,
                    sender: *sender,
                    receiver: *receiver,
                    data_account: *stream,
                    withdraw_data,
                    fee_owner: fees.owner,
                    fee_vault_data: fees.vault_data,
                    fee_vault: fees.vault,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            ),
            TokenKind::Token { mint } => self.builder().build_for(
                &[],
                &accounts::CancelTokenStream {
                    dest_account: *receiver,
                    source_account: *sender,
                    fee_owner: fees.owner,
                    fee_vault_data: fees.vault_data,
                    fee_vault: fees.vault,
                    zebec_vault: vault,
                    data_account: *stream,
                    withdraw_data,
                    system_program: SYSTEM_PROGRAM_ID,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                    mint: *mint,
                    pda_account_token_account: derive::associated_token_account(&vault, mint)?,
                    dest_token_account: derive::associated_token_account(receiver, mint)?,
                    fee_receiver_token_account: derive::associated_token_account(
                        &fees.vault,
                        mint,
                    )?,
                },
            ),
        }
    }

    /// Receiver-side withdrawal of the streamed amount.
    pub fn withdraw(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        stream: &Pubkey,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        let fees = self.fees()?;
        let vault = self.vault(sender)?;
        let withdraw_data = self.escrow(sender, token)?;
        match token {
            TokenKind::Native => self.builder().build_for(
                &[],
                &accounts::WithdrawStream {
                    zebec_vault: vault,
                    sender: *sender,
                    receiver: *receiver,
                    data_account: *stream,
                    withdraw_data,
                    fee_owner: fees.owner,
                    fee_vault_data: fees.vault_data,
                    fee_vault: fees.vault,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            ),
            TokenKind::Token { mint } => self.builder().build_for(
                &[],
                &accounts::WithdrawTokenStream {
                    dest_account: *receiver,
                    source_account: *sender,
                    fee_owner: fees.owner,
                    fee_vault_data: fees.vault_data,
                    fee_vault: fees.vault,
                    zebec_vault: vault,
                    data_account: *stream,
                    withdraw_data,
                    system_program: SYSTEM_PROGRAM_ID,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                    mint: *mint,
                    pda_account_token_account: derive::associated_token_account(&vault, mint)?,
                    dest_token_account: derive::associated_token_account(receiver, mint)?,
                    fee_receiver_token_account: derive::associated_token_account(
                        &fees.vault,
                        mint,
                    )?,
                },
            ),
        }
    }

    pub fn instant_transfer(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        amount: u64,
        token: &TokenKind,
    ) -> Result<InstructionSpec, SdkError> {
        let vault = self.vault(sender)?;
        let withdraw_data = self.escrow(sender, token)?;
        let args = [ArgValue::U64(amount)];
        match token {
            TokenKind::Native => self.builder().build_for(
                &args,
                &accounts::InstantNativeTransfer {
                    zebec_vault: vault,
                    sender: *sender,
                    receiver: *receiver,
                    withdraw_data,
                    system_program: SYSTEM_PROGRAM_ID,
                },
            ),
            TokenKind::Token { mint } => self.builder().build_for(
                &args,
                &accounts::InstantTokenTransfer {
                    zebec_vault: vault,
                    dest_account: *receiver,
                    source_account: *sender,
                    withdraw_data,
                    system_program: SYSTEM_PROGRAM_ID,
                    token_program: TOKEN_PROGRAM_ID,
                    associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
                    rent: SYSVAR_RENT_ID,
                    mint: *mint,
                    pda_account_token_account: derive::associated_token_account(&vault, mint)?,
                    dest_token_account: derive::associated_token_account(receiver, mint)?,
                },
            ),
        }
    }
}
