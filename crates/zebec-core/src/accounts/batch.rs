//! Account lists for the batch-transfer program.

define_accounts! {
    DepositSol => "depositSol" {
        sender: writable_signer = "sender",
        batch_vault: writable = "batchVault",
        system_program: readonly = "systemProgram",
    }

    DepositToken => "depositToken" {
        sender: writable_signer = "sender",
        batch_vault: readonly = "batchVault",
        mint: readonly = "mint",
        sender_token_account: writable = "senderTokenAccount",
        vault_token_account: writable = "vaultTokenAccount",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        system_program: readonly = "systemProgram",
        rent: readonly = "rent",
    }

    WithdrawSol => "withdrawSol" {
        sender: writable_signer = "sender",
        batch_vault: writable = "batchVault",
        system_program: readonly = "systemProgram",
    }

    WithdrawToken => "withdrawToken" {
        sender: writable_signer = "sender",
        batch_vault: readonly = "batchVault",
        mint: readonly = "mint",
        sender_token_account: writable = "senderTokenAccount",
        vault_token_account: writable = "vaultTokenAccount",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        system_program: readonly = "systemProgram",
        rent: readonly = "rent",
    }

    /// Receivers follow as writable remaining accounts, one per amount.
    TransferSol => "transferSol" {
        sender: signer = "sender",
        batch_vault: writable = "batchVault",
        fee_vault: writable = "feeVault",
        system_program: readonly = "systemProgram",
    }

    /// Receiver token accounts follow as writable remaining accounts.
    TransferToken => "transferToken" {
        sender: signer = "sender",
        batch_vault: readonly = "batchVault",
        mint: readonly = "mint",
        vault_token_account: writable = "vaultTokenAccount",
        fee_vault: readonly = "feeVault",
        fee_vault_token_account: writable = "feeVaultTokenAccount",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        system_program: readonly = "systemProgram",
    }
}
