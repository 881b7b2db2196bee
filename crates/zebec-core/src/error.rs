use chain_sol::SolError;
use program_idl::IdlError;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Every failure a facade operation can end in.
///
/// Facades never return this directly; it is folded into an
/// [`OperationResult`](crate::response::OperationResult).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// Local input check failed before anything was sent.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Arguments or account slots disagree with the program interface.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Missing account: {0}")]
    MissingAccount(String),

    #[error("Address derivation failed: {0}")]
    DerivationExhausted(String),

    /// Transport failure; nothing was submitted.
    #[error("Network error: {0}")]
    Network(String),

    /// Submitted, but confirmation is unknown. The transaction may still land.
    #[error("Transaction {signature} may still land: {message}")]
    Ambiguous { signature: String, message: String },

    #[error("{message}")]
    ProgramRejection {
        program: String,
        code: Option<u32>,
        message: String,
    },

    #[error("Signing failed: {0}")]
    Signing(String),

    /// A confirmed transaction is not yet queryable.
    #[error("Not yet visible: {0}")]
    NotYetVisible(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SdkError {
    /// Whether the same call may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SdkError::Network(_) | SdkError::Ambiguous { .. } | SdkError::NotYetVisible(_)
        )
    }

    /// Internal assembly bugs rather than bad input or a bad network.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SdkError::SchemaMismatch(_)
                | SdkError::MissingAccount(_)
                | SdkError::DerivationExhausted(_)
        )
    }
}

impl From<SolError> for SdkError {
    fn from(e: SolError) -> Self {
        match e {
            SolError::InvalidSeeds(_) | SolError::DerivationExhausted(_) => {
                SdkError::DerivationExhausted(e.to_string())
            }
            SolError::SigningError(_) => SdkError::Signing(e.to_string()),
            SolError::SerializationError(_) => SdkError::SchemaMismatch(e.to_string()),
            SolError::InvalidAddress(_)
            | SolError::InvalidAccountData(_)
            | SolError::TransactionBuildError(_) => SdkError::Precondition(e.to_string()),
        }
    }
}

impl From<IdlError> for SdkError {
    fn from(e: IdlError) -> Self {
        match e {
            // Raised when reading an on-chain account that is not what the
            // caller said it was.
            IdlError::DiscriminatorMismatch(_) | IdlError::Decode(_) => {
                SdkError::Precondition(e.to_string())
            }
            _ => SdkError::SchemaMismatch(e.to_string()),
        }
    }
}

impl From<LedgerError> for SdkError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Transport(_) | LedgerError::Rpc { .. } => SdkError::Network(e.to_string()),
            LedgerError::Rejected { message, .. } => SdkError::ProgramRejection {
                program: String::new(),
                code: None,
                message,
            },
            LedgerError::Unconfirmed { signature, message } => {
                SdkError::Ambiguous { signature, message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SdkError::Network("down".into()).is_transient());
        assert!(SdkError::NotYetVisible("tx".into()).is_transient());
        assert!(!SdkError::Precondition("bad".into()).is_transient());
        assert!(!SdkError::MissingAccount("x".into()).is_transient());
    }

    #[test]
    fn rejection_displays_bare_message() {
        let err = SdkError::ProgramRejection {
            program: "zebec".into(),
            code: Some(6000),
            message: "The stream is already paused".into(),
        };
        assert_eq!(err.to_string(), "The stream is already paused");
    }

    #[test]
    fn sol_errors_map_by_class() {
        assert!(matches!(
            SdkError::from(SolError::DerivationExhausted("p".into())),
            SdkError::DerivationExhausted(_)
        ));
        assert!(matches!(
            SdkError::from(SolError::SigningError("s".into())),
            SdkError::Signing(_)
        ));
        assert!(matches!(
            SdkError::from(SolError::InvalidAccountData("short".into())),
            SdkError::Precondition(_)
        ));
    }

    #[test]
    fn ledger_errors_map_by_class() {
        let unconfirmed = LedgerError::Unconfirmed {
            signature: "sig".into(),
            message: "timed out".into(),
        };
        assert_eq!(
            SdkError::from(unconfirmed),
            SdkError::Ambiguous {
                signature: "sig".into(),
                message: "timed out".into()
            }
        );
        assert!(matches!(
            SdkError::from(LedgerError::Transport("refused".into())),
            SdkError::Network(_)
        ));
    }

    #[test]
    fn idl_errors_map_to_schema_or_precondition() {
        assert!(matches!(
            SdkError::from(IdlError::UnknownInstruction("x".into())),
            SdkError::SchemaMismatch(_)
        ));
        assert!(matches!(
            SdkError::from(IdlError::DiscriminatorMismatch("Stream".into())),
            SdkError::Precondition(_)
        ));
    }
}
