//! The uniform result shape and program error normalization.

use chain_sol::Pubkey;
use once_cell::sync::Lazy;
use program_idl::{framework_error, InterfaceRegistry, ProgramKind};
use regex::Regex;
use serde::Serialize;

use crate::config::ProgramIds;
use crate::error::SdkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Which error class produced an error result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Precondition,
    SchemaMismatch,
    MissingAccount,
    DerivationExhausted,
    Network,
    Ambiguous,
    ProgramRejection,
    Signing,
    NotYetVisible,
}

impl From<&SdkError> for FailureKind {
    fn from(err: &SdkError) -> Self {
        match err {
            SdkError::Precondition(_) | SdkError::Config(_) => FailureKind::Precondition,
            SdkError::SchemaMismatch(_) => FailureKind::SchemaMismatch,
            SdkError::MissingAccount(_) => FailureKind::MissingAccount,
            SdkError::DerivationExhausted(_) => FailureKind::DerivationExhausted,
            SdkError::Network(_) => FailureKind::Network,
            SdkError::Ambiguous { .. } => FailureKind::Ambiguous,
            SdkError::ProgramRejection { .. } => FailureKind::ProgramRejection,
            SdkError::Signing(_) => FailureKind::Signing,
            SdkError::NotYetVisible(_) => FailureKind::NotYetVisible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationData {
    pub transaction_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_address: Option<Pubkey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_address: Option<Pubkey>,
}

/// What every facade operation returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<OperationData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>, data: OperationData) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data: Some(data),
            kind: None,
        }
    }

    /// An ambiguous failure keeps the transaction hash so the caller can
    /// check on it later.
    pub fn failure(err: &SdkError) -> Self {
        let data = match err {
            SdkError::Ambiguous { signature, .. } => Some(OperationData {
                transaction_hash: signature.clone(),
                derived_address: None,
                stream_address: None,
            }),
            _ => None,
        };
        Self {
            status: Status::Error,
            message: err.to_string(),
            data,
            kind: Some(FailureKind::from(err)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.transaction_hash.as_str())
    }

    pub fn derived_address(&self) -> Option<Pubkey> {
        self.data.as_ref().and_then(|d| d.derived_address)
    }
}

impl From<SdkError> for OperationResult {
    fn from(err: SdkError) -> Self {
        OperationResult::failure(&err)
    }
}

// ---------------------------------------------------------------------------
// Error normalization
// ---------------------------------------------------------------------------

static PROGRAM_FAILED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Program ([1-9A-HJ-NP-Za-km-z]{32,44}) failed: custom program error: 0x([0-9a-fA-F]+)",
    )
    .expect("static regex")
});
static CUSTOM_HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"custom program error: 0x([0-9a-fA-F]+)").expect("static regex"));
static INSTRUCTION_CUSTOM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""?InstructionError"?\s*:?\s*\[\s*(\d+)\s*,\s*\{\s*"?Custom"?\s*:\s*(\d+)"#)
        .expect("static regex")
});
static CUSTOM_DEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""?Custom"?\s*:\s*(\d+)"#).expect("static regex"));
static ERROR_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Error Number: (\d+)\.").expect("static regex"));

/// A program error code found in raw failure text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProgramError {
    pub program: Option<Pubkey>,
    pub instruction_index: Option<usize>,
    pub code: u32,
}

impl RawProgramError {
    /// Scan `text` for the forms the ledger and the Anchor runtime emit.
    pub fn extract(text: &str) -> Option<Self> {
        if let Some(c) = PROGRAM_FAILED.captures(text) {
            return Some(Self {
                program: c[1].parse().ok(),
                instruction_index: None,
                code: u32::from_str_radix(&c[2], 16).ok()?,
            });
        }
        if let Some(c) = INSTRUCTION_CUSTOM.captures(text) {
            return Some(Self {
                program: None,
                instruction_index: c[1].parse().ok(),
                code: c[2].parse().ok()?,
            });
        }
        if let Some(c) = CUSTOM_HEX.captures(text) {
            return Some(Self::code_only(u32::from_str_radix(&c[1], 16).ok()?));
        }
        if let Some(c) = CUSTOM_DEC.captures(text) {
            return Some(Self::code_only(c[1].parse().ok()?));
        }
        if let Some(c) = ERROR_NUMBER.captures(text) {
            return Some(Self::code_only(c[1].parse().ok()?));
        }
        None
    }

    fn code_only(code: u32) -> Self {
        Self {
            program: None,
            instruction_index: None,
            code,
        }
    }

    /// Merge what two sources know; `self` wins on conflicts.
    fn or(self, other: Option<Self>) -> Self {
        match other {
            Some(o) if o.code == self.code => Self {
                program: self.program.or(o.program),
                instruction_index: self.instruction_index.or(o.instruction_index),
                code: self.code,
            },
            _ => self,
        }
    }
}

/// Turns raw rejection text into a [`SdkError::ProgramRejection`] carrying
/// the program's own message for the code.
pub struct ErrorNormalizer<'a> {
    registry: &'a InterfaceRegistry,
    ids: &'a ProgramIds,
}

impl<'a> ErrorNormalizer<'a> {
    pub fn new(registry: &'a InterfaceRegistry, ids: &'a ProgramIds) -> Self {
        Self { registry, ids }
    }

    /// `programs` lists the program id of each top-level instruction in the
    /// submitted transaction; `primary` is the program the operation targets.
    pub fn normalize(
        &self,
        message: &str,
        logs: &[String],
        programs: &[Pubkey],
        primary: ProgramKind,
    ) -> SdkError {
        let from_logs = logs.iter().rev().find_map(|line| RawProgramError::extract(line));
        let raw = match RawProgramError::extract(message) {
            Some(found) => Some(found.or(from_logs)),
            None => from_logs,
        };

        let Some(raw) = raw else {
            return SdkError::ProgramRejection {
                program: self.registry.get(primary).name.clone(),
                code: None,
                message: message.to_string(),
            };
        };

        let failing = raw
            .program
            .or_else(|| raw.instruction_index.and_then(|i| programs.get(i).copied()));
        let kind = match failing {
            None => primary,
            Some(program) => match self.ids.kind_of(&program) {
                Some(kind) => kind,
                // System or token account setup; its codes mean nothing here.
                None => {
                    return SdkError::ProgramRejection {
                        program: program.to_string(),
                        code: Some(raw.code),
                        message: message.to_string(),
                    };
                }
            },
        };
        let interface = self.registry.get(kind);

        let described = interface
            .error(raw.code)
            .cloned()
            .or_else(|| framework_error(raw.code));

        match described {
            Some(def) => SdkError::ProgramRejection {
                program: interface.name.clone(),
                code: Some(raw.code),
                message: def.message().to_string(),
            },
            None => SdkError::ProgramRejection {
                program: interface.name.clone(),
                code: Some(raw.code),
                message: message.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdkConfig;

    fn ids() -> ProgramIds {
        SdkConfig {
            fee_owner: Some("4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T".into()),
            ..SdkConfig::default()
        }
        .program_ids()
        .unwrap()
    }

    fn normalize(
        message: &str,
        logs: &[&str],
        programs: &[Pubkey],
        primary: ProgramKind,
    ) -> SdkError {
        let registry = InterfaceRegistry::embedded().unwrap();
        let ids = ids();
        let logs: Vec<String> = logs.iter().map(|s| s.to_string()).collect();
        ErrorNormalizer::new(&registry, &ids).normalize(message, &logs, programs, primary)
    }

    #[test]
    fn extracts_each_raw_form() {
        let id = ids().stream;
        let raw = RawProgramError::extract(&format!(
            "Program {id} failed: custom program error: 0x1770"
        ))
        .unwrap();
        assert_eq!(raw.program, Some(id));
        assert_eq!(raw.code, 6000);

        let raw = RawProgramError::extract(
            r#"Transaction simulation failed: {"InstructionError":[1,{"Custom":6002}]}"#,
        )
        .unwrap();
        assert_eq!(raw.instruction_index, Some(1));
        assert_eq!(raw.code, 6002);

        let raw = RawProgramError::extract("failed to send: custom program error: 0x1771").unwrap();
        assert_eq!((raw.program, raw.code), (None, 6001));

        let raw = RawProgramError::extract(
            "Program log: AnchorError occurred. Error Code: NotEnoughSigners. Error Number: 6002. Error Message: x.",
        )
        .unwrap();
        assert_eq!(raw.code, 6002);

        assert!(RawProgramError::extract("blockhash not found").is_none());
    }

    #[test]
    fn known_code_is_replaced_by_its_message() {
        let err = normalize(
            "Error processing Instruction 0: custom program error: 0x1770",
            &[],
            &[],
            ProgramKind::Stream,
        );
        assert_eq!(err.to_string(), "The stream is already paused");
        assert!(matches!(err, SdkError::ProgramRejection { code: Some(6000), .. }));
    }

    #[test]
    fn program_id_in_logs_selects_the_interface() {
        let ids = ids();
        let log = format!("Program {} failed: custom program error: 0x1772", ids.multisig);
        let err = normalize("Transaction simulation failed", &[&log], &[], ProgramKind::Stream);
        assert_eq!(err.to_string(), "Not enough owners signed this transaction.");
    }

    #[test]
    fn failing_instruction_index_selects_the_interface() {
        let ids = ids();
        let programs = [chain_sol::SYSTEM_PROGRAM_ID, ids.batch_transfer];
        let err = normalize(
            r#"{"InstructionError":[1,{"Custom":6001}]}"#,
            &[],
            &programs,
            ProgramKind::Stream,
        );
        assert_eq!(err.to_string(), "Too many receivers in one batch");
    }

    #[test]
    fn failure_in_a_setup_instruction_keeps_raw_text() {
        let ids = ids();
        let programs = [chain_sol::ASSOCIATED_TOKEN_PROGRAM_ID, ids.stream];
        let raw = r#"{"InstructionError":[0,{"Custom":1}]}"#;
        let err = normalize(raw, &[], &programs, ProgramKind::Stream);
        assert_eq!(err.to_string(), raw);
        assert!(matches!(
            err,
            SdkError::ProgramRejection { ref program, code: Some(1), .. }
                if *program == chain_sol::ASSOCIATED_TOKEN_PROGRAM_ID.to_string()
        ));

        // 6000 is a stream error code, but the system program raised it.
        let log = format!(
            "Program {} failed: custom program error: 0x1770",
            chain_sol::SYSTEM_PROGRAM_ID
        );
        let err = normalize("Transaction simulation failed", &[&log], &[], ProgramKind::Stream);
        assert_eq!(err.to_string(), "Transaction simulation failed");
    }

    #[test]
    fn framework_codes_resolve() {
        let err = normalize(
            "custom program error: 0xbc4",
            &[],
            &[],
            ProgramKind::Multisig,
        );
        assert_eq!(
            err.to_string(),
            "The program expected this account to be already initialized"
        );
    }

    #[test]
    fn unknown_code_keeps_raw_text() {
        let raw = "custom program error: 0x2710";
        let err = normalize(raw, &[], &[], ProgramKind::Stream);
        assert_eq!(err.to_string(), raw);
        assert!(matches!(err, SdkError::ProgramRejection { code: Some(10000), .. }));
    }

    #[test]
    fn no_code_keeps_raw_text() {
        let raw = "Attempt to debit an account but found no record of a prior credit.";
        let err = normalize(raw, &[], &[], ProgramKind::BatchTransfer);
        assert_eq!(err.to_string(), raw);
        assert!(matches!(err, SdkError::ProgramRejection { code: None, .. }));
    }

    #[test]
    fn ambiguous_failure_keeps_hash() {
        let result = OperationResult::failure(&SdkError::Ambiguous {
            signature: "5sig".into(),
            message: "confirmation timed out".into(),
        });
        assert!(!result.is_success());
        assert_eq!(result.transaction_hash(), Some("5sig"));
        assert_eq!(result.kind, Some(FailureKind::Ambiguous));
        assert!(result.message.contains("may still land"));
    }

    #[test]
    fn success_serializes_camel_case() {
        let result = OperationResult::success(
            "stream started",
            OperationData {
                transaction_hash: "abc".into(),
                derived_address: Some(Pubkey::new_from_array([0; 32])),
                stream_address: None,
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["transactionHash"], "abc");
        assert_eq!(json["data"]["derivedAddress"], "11111111111111111111111111111111");
        assert!(json["data"].get("streamAddress").is_none());
        assert!(json.get("kind").is_none());
    }
}
