//! Decoded stream accounts and the accrual schedule.

use chain_sol::Pubkey;
use program_idl::{account_discriminator, DecodedAccount, ProgramInterface, DISCRIMINATOR_LEN};

use crate::error::SdkError;
use crate::token::TokenKind;

pub const NATIVE_LAYOUT: &str = "Stream";
pub const TOKEN_LAYOUT: &str = "StreamToken";

/// Where a stream is in its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Scheduled,
    Streaming,
    Paused,
    Completed,
}

/// A stream account as stored by the streaming program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    pub token: TokenKind,
    pub start_time: u64,
    pub end_time: u64,
    pub paused: bool,
    pub withdraw_limit: u64,
    pub amount: u64,
    pub sender: Pubkey,
    pub receiver: Pubkey,
    pub withdrawn: u64,
    pub paused_at: u64,
    pub fee_owner: Pubkey,
    /// Amount that accrued while the stream was paused and is not owed.
    pub paused_amt: u64,
    pub can_cancel: bool,
    pub can_update: bool,
}

impl StreamState {
    /// Decode native or token stream data, picking the layout by its
    /// discriminator.
    pub fn decode(interface: &ProgramInterface, data: &[u8]) -> Result<Self, SdkError> {
        let tag = data.get(..DISCRIMINATOR_LEN).ok_or_else(|| {
            SdkError::Precondition(format!("stream account holds only {} bytes", data.len()))
        })?;

        let layout = if tag == account_discriminator(NATIVE_LAYOUT) {
            NATIVE_LAYOUT
        } else if tag == account_discriminator(TOKEN_LAYOUT) {
            TOKEN_LAYOUT
        } else {
            return Err(SdkError::Precondition("account is not a stream".into()));
        };

        let account = interface.decode_account(layout, data)?;
        Self::from_decoded(&account)
    }

    fn from_decoded(account: &DecodedAccount) -> Result<Self, SdkError> {
        let token = if account.layout == TOKEN_LAYOUT {
            TokenKind::Token {
                mint: account.pubkey("tokenMint")?,
            }
        } else {
            TokenKind::Native
        };

        Ok(Self {
            token,
            start_time: account.u64("startTime")?,
            end_time: account.u64("endTime")?,
            paused: account.u64("paused")? != 0,
            withdraw_limit: account.u64("withdrawLimit")?,
            amount: account.u64("amount")?,
            sender: account.pubkey("sender")?,
            receiver: account.pubkey("receiver")?,
            withdrawn: account.u64("withdrawn")?,
            paused_at: account.u64("pausedAt")?,
            fee_owner: account.pubkey("feeOwner")?,
            paused_amt: account.u64("pausedAmt")?,
            can_cancel: account.bool("canCancel")?,
            can_update: account.bool("canUpdate")?,
        })
    }

    pub fn status_at(&self, now: u64) -> StreamStatus {
        if now >= self.end_time {
            StreamStatus::Completed
        } else if self.paused {
            StreamStatus::Paused
        } else if now < self.start_time {
            StreamStatus::Scheduled
        } else {
            StreamStatus::Streaming
        }
    }

    /// Amount released by the linear schedule at `now`. A paused stream stops
    /// accruing at `paused_at`.
    pub fn streamed_at(&self, now: u64) -> u64 {
        let now = if self.paused { now.min(self.paused_at) } else { now };
        let linear = if now <= self.start_time {
            0
        } else if now >= self.end_time || self.end_time <= self.start_time {
            self.amount
        } else {
            let elapsed = u128::from(now - self.start_time);
            let duration = u128::from(self.end_time - self.start_time);
            // elapsed < duration, so the quotient fits in u64.
            (u128::from(self.amount) * elapsed / duration) as u64
        };
        linear.saturating_sub(self.paused_amt)
    }

    /// What the receiver could withdraw at `now`.
    pub fn withdrawable_at(&self, now: u64) -> u64 {
        self.streamed_at(now).saturating_sub(self.withdrawn)
    }

    /// What cancelling at `now` would return to the sender.
    pub fn refundable_at(&self, now: u64) -> u64 {
        self.amount
            .saturating_sub(self.paused_amt)
            .saturating_sub(self.streamed_at(now))
    }
}
