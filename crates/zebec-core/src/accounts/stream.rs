//! Account lists for the payment-streaming program.

define_accounts! {
    CreateFeeAccount => "createFeeAccount" {
        fee_owner: writable_signer = "feeOwner",
        fee_vault_data: writable = "feeVaultData",
        fee_vault: writable = "feeVault",
        system_program: readonly = "systemProgram",
        rent: readonly = "rent",
    }

    DepositSol => "depositSol" {
        zebec_vault: writable = "zebecVault",
        sender: writable_signer = "sender",
        system_program: readonly = "systemProgram",
    }

    DepositToken => "depositToken" {
        zebec_vault: readonly = "zebecVault",
        source_account: writable_signer = "sourceAccount",
        system_program: readonly = "systemProgram",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        rent: readonly = "rent",
        mint: readonly = "mint",
        source_account_token_account: writable = "sourceAccountTokenAccount",
        pda_account_token_account: writable = "pdaAccountTokenAccount",
    }

    /// `data_account` is created by a preceding `CreateAccount` in the same
    /// transaction.
    NativeStream => "nativeStream" {
        data_account: writable = "dataAccount",
        withdraw_data: writable = "withdrawData",
        fee_owner: readonly = "feeOwner",
        fee_vault_data: readonly = "feeVaultData",
        fee_vault: readonly = "feeVault",
        sender: writable_signer = "sender",
        receiver: readonly = "receiver",
        system_program: readonly = "systemProgram",
    }

    /// Signed by the receiver.
    WithdrawStream => "withdrawStream" {
        zebec_vault: writable = "zebecVault",
        sender: writable = "sender",
        receiver: writable_signer = "receiver",
        data_account: writable = "dataAccount",
        withdraw_data: writable = "withdrawData",
        fee_owner: readonly = "feeOwner",
        fee_vault_data: readonly = "feeVaultData",
        fee_vault: writable = "feeVault",
        system_program: readonly = "systemProgram",
    }

    PauseStream => "pauseStream" {
        sender: signer = "sender",
        receiver: readonly = "receiver",
        data_account: writable = "dataAccount",
    }

    ResumeStream => "resumeStream" {
        sender: signer = "sender",
        receiver: readonly = "receiver",
        data_account: writable = "dataAccount",
    }

    CancelStream => "cancelStream" {
        zebec_vault: writable = "zebecVault",
        sender: writable_signer = "sender",
        receiver: writable = "receiver",
        data_account: writable = "dataAccount",
        withdraw_data: writable = "withdrawData",
        fee_owner: readonly = "feeOwner",
        fee_vault_data: readonly = "feeVaultData",
        fee_vault: writable = "feeVault",
        system_program: readonly = "systemProgram",
    }

    InstantNativeTransfer => "instantNativeTransfer" {
        zebec_vault: writable = "zebecVault",
        sender: writable_signer = "sender",
        receiver: writable = "receiver",
        withdraw_data: writable = "withdrawData",
        system_program: readonly = "systemProgram",
    }

    NativeWithdrawal => "nativeWithdrawal" {
        zebec_vault: writable = "zebecVault",
        withdraw_data: writable = "withdrawData",
        sender: writable_signer = "sender",
        system_program: readonly = "systemProgram",
    }

    TokenStream => "tokenStream" {
        data_account: writable = "dataAccount",
        withdraw_data: writable = "withdrawData",
        fee_owner: readonly = "feeOwner",
        fee_vault_data: readonly = "feeVaultData",
        fee_vault: readonly = "feeVault",
        source_account: writable_signer = "sourceAccount",
        dest_account: readonly = "destAccount",
        system_program: readonly = "systemProgram",
        token_program: readonly = "tokenProgram",
        mint: readonly = "mint",
        rent: readonly = "rent",
    }

    /// Signed by the receiver (`dest_account`).
    WithdrawTokenStream => "withdrawTokenStream" {
        dest_account: writable_signer = "destAccount",
        source_account: writable = "sourceAccount",
        fee_owner: readonly = "feeOwner",
        fee_vault_data: readonly = "feeVaultData",
        fee_vault: readonly = "feeVault",
        zebec_vault: readonly = "zebecVault",
        data_account: writable = "dataAccount",
        withdraw_data: writable = "withdrawData",
        system_program: readonly = "systemProgram",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        rent: readonly = "rent",
        mint: readonly = "mint",
        pda_account_token_account: writable = "pdaAccountTokenAccount",
        dest_token_account: writable = "destTokenAccount",
        fee_receiver_token_account: writable = "feeReceiverTokenAccount",
    }

    /// Toggles: pauses a running stream, resumes a paused one.
    PauseResumeTokenStream => "pauseResumeTokenStream" {
        sender: signer = "sender",
        receiver: readonly = "receiver",
        data_account: writable = "dataAccount",
    }

    CancelTokenStream => "cancelTokenStream" {
        dest_account: writable = "destAccount",
        source_account: writable_signer = "sourceAccount",
        fee_owner: readonly = "feeOwner",
        fee_vault_data: readonly = "feeVaultData",
        fee_vault: readonly = "feeVault",
        zebec_vault: readonly = "zebecVault",
        data_account: writable = "dataAccount",
        withdraw_data: writable = "withdrawData",
        system_program: readonly = "systemProgram",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        rent: readonly = "rent",
        mint: readonly = "mint",
        pda_account_token_account: writable = "pdaAccountTokenAccount",
        dest_token_account: writable = "destTokenAccount",
        fee_receiver_token_account: writable = "feeReceiverTokenAccount",
    }

    InstantTokenTransfer => "instantTokenTransfer" {
        zebec_vault: readonly = "zebecVault",
        dest_account: readonly = "destAccount",
        source_account: writable_signer = "sourceAccount",
        withdraw_data: writable = "withdrawData",
        system_program: readonly = "systemProgram",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        rent: readonly = "rent",
        mint: readonly = "mint",
        pda_account_token_account: writable = "pdaAccountTokenAccount",
        dest_token_account: writable = "destTokenAccount",
    }

    TokenWithdrawal => "tokenWithdrawal" {
        zebec_vault: readonly = "zebecVault",
        withdraw_data: writable = "withdrawData",
        source_account: writable_signer = "sourceAccount",
        system_program: readonly = "systemProgram",
        token_program: readonly = "tokenProgram",
        associated_token_program: readonly = "associatedTokenProgram",
        rent: readonly = "rent",
        mint: readonly = "mint",
        source_account_token_account: writable = "sourceAccountTokenAccount",
        pda_account_token_account: writable = "pdaAccountTokenAccount",
    }
}
