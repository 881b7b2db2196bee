//! SDK configuration.
//!
//! Values come from (in increasing precedence) built-in defaults, a JSON
//! document and `ZEBEC_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use chain_sol::Pubkey;
use program_idl::ProgramKind;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SdkError;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_STREAM_PROGRAM_ID: &str = "zbcKGdAmXfthXY3rEPBzexVByT2cqRqCZb9NwWdGQ2T";
pub const DEFAULT_MULTISIG_PROGRAM_ID: &str = "b78CvbMk4W7dG5bCq1gTRqaLRk5TtxSKR8gXeAXJeEm";
pub const DEFAULT_BATCH_PROGRAM_ID: &str = "FEXZfg8DZ7ZAbPfJGKCrCRt9GXmuThHtYNns3X6okhbm";

/// Ledger confirmation level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl FromStr for Commitment {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(SdkError::Config(format!("unknown commitment {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub rpc_url: String,
    pub commitment: Commitment,
    pub stream_program_id: String,
    pub multisig_program_id: String,
    pub batch_program_id: String,
    /// Owner of the stream program's fee vault. Deployment specific, no default.
    pub fee_owner: Option<String>,
    pub request_timeout_ms: u64,
    pub confirm_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Wait before the first transaction-time lookup.
    pub transaction_time_delay_ms: u64,
    pub transaction_time_attempts: u32,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            commitment: Commitment::default(),
            stream_program_id: DEFAULT_STREAM_PROGRAM_ID.to_string(),
            multisig_program_id: DEFAULT_MULTISIG_PROGRAM_ID.to_string(),
            batch_program_id: DEFAULT_BATCH_PROGRAM_ID.to_string(),
            fee_owner: None,
            request_timeout_ms: 30_000,
            confirm_timeout_ms: 60_000,
            poll_interval_ms: 500,
            transaction_time_delay_ms: 2_000,
            transaction_time_attempts: 5,
        }
    }
}

impl SdkConfig {
    pub fn from_json(json: &str) -> Result<Self, SdkError> {
        serde_json::from_str(json).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Apply `ZEBEC_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, SdkError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SdkError> {
        if let Some(url) = lookup("ZEBEC_RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(commitment) = lookup("ZEBEC_COMMITMENT") {
            self.commitment = commitment.parse()?;
        }
        if let Some(id) = lookup("ZEBEC_PROGRAM_ID") {
            self.stream_program_id = id;
        }
        if let Some(id) = lookup("ZEBEC_MULTISIG_PROGRAM_ID") {
            self.multisig_program_id = id;
        }
        if let Some(id) = lookup("ZEBEC_BATCH_PROGRAM_ID") {
            self.batch_program_id = id;
        }
        if let Some(owner) = lookup("ZEBEC_FEE_OWNER") {
            self.fee_owner = Some(owner);
        }
        Ok(self)
    }

    pub fn rpc_url(&self) -> Result<Url, SdkError> {
        Url::parse(&self.rpc_url).map_err(|e| SdkError::Config(format!("rpc_url: {e}")))
    }

    pub fn program_ids(&self) -> Result<ProgramIds, SdkError> {
        let fee_owner = self
            .fee_owner
            .as_deref()
            .ok_or_else(|| SdkError::Config("fee_owner is not set".into()))?;

        let ids = ProgramIds {
            stream: parse_key("stream_program_id", &self.stream_program_id)?,
            multisig: parse_key("multisig_program_id", &self.multisig_program_id)?,
            batch_transfer: parse_key("batch_program_id", &self.batch_program_id)?,
            fee_owner: parse_key("fee_owner", fee_owner)?,
        };

        if ids.stream == ids.multisig
            || ids.stream == ids.batch_transfer
            || ids.multisig == ids.batch_transfer
        {
            return Err(SdkError::Config("program ids must be distinct".into()));
        }
        Ok(ids)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            confirm_timeout: Duration::from_millis(self.confirm_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            transaction_time_delay: Duration::from_millis(self.transaction_time_delay_ms),
            transaction_time_attempts: self.transaction_time_attempts.max(1),
        }
    }
}

fn parse_key(field: &str, value: &str) -> Result<Pubkey, SdkError> {
    value
        .parse()
        .map_err(|e| SdkError::Config(format!("{field}: {e}")))
}

/// Validated program addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramIds {
    pub stream: Pubkey,
    pub multisig: Pubkey,
    pub batch_transfer: Pubkey,
    pub fee_owner: Pubkey,
}

impl ProgramIds {
    pub fn program_id(&self, kind: ProgramKind) -> Pubkey {
        match kind {
            ProgramKind::Stream => self.stream,
            ProgramKind::Multisig => self.multisig,
            ProgramKind::BatchTransfer => self.batch_transfer,
        }
    }

    pub fn kind_of(&self, program_id: &Pubkey) -> Option<ProgramKind> {
        ProgramKind::ALL
            .into_iter()
            .find(|kind| self.program_id(*kind) == *program_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub request_timeout: Duration,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    pub transaction_time_delay: Duration,
    pub transaction_time_attempts: u32,
}
