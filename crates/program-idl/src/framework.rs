//! Error codes raised by the Anchor framework itself rather than by program
//! logic. Programs never list these in their interface documents.

use crate::schema::ErrorDef;

const FRAMEWORK_ERRORS: &[(u32, &str, &str)] = &[
    (100, "InstructionMissing", "8 byte instruction identifier not provided"),
    (101, "InstructionFallbackNotFound", "Fallback functions are not supported"),
    (
        102,
        "InstructionDidNotDeserialize",
        "The program could not deserialize the given instruction",
    ),
    (2000, "ConstraintMut", "A mut constraint was violated"),
    (2001, "ConstraintHasOne", "A has one constraint was violated"),
    (2002, "ConstraintSigner", "A signer constraint was violated"),
    (2003, "ConstraintRaw", "A raw constraint was violated"),
    (2006, "ConstraintSeeds", "A seeds constraint was violated"),
    (2012, "ConstraintAddress", "An address constraint was violated"),
    (3001, "AccountDiscriminatorNotFound", "No 8 byte discriminator was found on the account"),
    (3002, "AccountDiscriminatorMismatch", "8 byte discriminator did not match what was expected"),
    (3003, "AccountDidNotDeserialize", "Failed to deserialize the account"),
    (
        3007,
        "AccountOwnedByWrongProgram",
        "The given account is owned by a different program than expected",
    ),
    (3012, "AccountNotInitialized", "The program expected this account to be already initialized"),
];

/// Look up a framework-level error code.
pub fn framework_error(code: u32) -> Option<ErrorDef> {
    FRAMEWORK_ERRORS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(code, name, msg)| ErrorDef {
            code: *code,
            name: (*name).to_string(),
            msg: Some((*msg).to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        let err = framework_error(3012).unwrap();
        assert_eq!(err.name, "AccountNotInitialized");
        assert!(err.message().contains("already initialized"));
    }

    #[test]
    fn program_range_is_not_framework() {
        assert!(framework_error(6000).is_none());
    }
}
