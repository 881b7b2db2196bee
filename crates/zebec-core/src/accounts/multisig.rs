//! Account lists for the multisig vault program.

define_accounts! {
    /// `multisig` is created by a preceding `CreateAccount`.
    CreateMultisig => "createMultisig" {
        multisig: writable = "multisig",
        rent: readonly = "rent",
    }

    /// `transaction` is the proposal account, created by a preceding
    /// `CreateAccount`.
    CreateTransaction => "createTransaction" {
        multisig: readonly = "multisig",
        transaction: writable = "transaction",
        proposer: signer = "proposer",
        rent: readonly = "rent",
    }

    Approve => "approve" {
        multisig: readonly = "multisig",
        transaction: writable = "transaction",
        owner: signer = "owner",
    }

    /// Only ever executed through a proposal; the safe signer signs by CPI.
    SetOwners => "setOwners" {
        multisig: writable = "multisig",
        multisig_signer: signer = "multisigSigner",
    }

    ChangeThreshold => "changeThreshold" {
        multisig: writable = "multisig",
        multisig_signer: signer = "multisigSigner",
    }

    /// The proposed instruction's accounts follow as remaining accounts.
    ExecuteTransaction => "executeTransaction" {
        multisig: readonly = "multisig",
        multisig_signer: readonly = "multisigSigner",
        transaction: writable = "transaction",
    }
}
