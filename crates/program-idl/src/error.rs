use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdlError {
    #[error("Invalid interface document: {0}")]
    InvalidDocument(String),

    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("Unknown account layout: {0}")]
    UnknownAccount(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Argument count mismatch for {instruction}: expected {expected}, got {actual}")]
    ArgumentCount {
        instruction: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch for {field}: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Layout {0} has no fixed size")]
    VariableSize(String),

    #[error("Discriminator mismatch for {0}")]
    DiscriminatorMismatch(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = IdlError::ArgumentCount {
            instruction: "depositSol".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Argument count mismatch for depositSol: expected 1, got 2"
        );
        assert_eq!(
            IdlError::VariableSize("Multisig".into()).to_string(),
            "Layout Multisig has no fixed size"
        );
    }
}
