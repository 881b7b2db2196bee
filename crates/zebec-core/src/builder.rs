//! Instruction and transaction assembly.

use chain_sol::{
    compile_transaction, AccountMeta, Instruction, Keypair, Pubkey, Signer, SolTransaction,
};
use program_idl::{ArgValue, ProgramInterface};

use crate::accounts::{AccountList, InstructionAccounts};
use crate::error::SdkError;

/// One program instruction plus everything that must travel with it.
#[derive(Debug, Clone)]
pub struct InstructionSpec {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
    /// Instructions that run first, in order (account creation, ATA setup).
    pub pre_instructions: Vec<Instruction>,
    /// Keys the SDK generated for accounts it creates in this transaction.
    pub extra_signers: Vec<Keypair>,
}

impl InstructionSpec {
    /// Wrap an instruction that does not come from an interface document.
    pub fn from_instruction(instruction: Instruction) -> Self {
        Self {
            program_id: instruction.program_id,
            accounts: instruction.accounts,
            data: instruction.data,
            pre_instructions: Vec::new(),
            extra_signers: Vec::new(),
        }
    }

    pub fn with_pre_instruction(mut self, instruction: Instruction) -> Self {
        self.pre_instructions.push(instruction);
        self
    }

    pub fn with_signer(mut self, signer: Keypair) -> Self {
        self.extra_signers.push(signer);
        self
    }

    /// The main instruction alone.
    pub fn instruction(&self) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: self.accounts.clone(),
            data: self.data.clone(),
        }
    }

    /// Pre-instructions first, then the main instruction.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut all = self.pre_instructions.clone();
        all.push(self.instruction());
        all
    }

    /// Every key that must sign: the fee payer first, then each signer slot
    /// of every instruction, de-duplicated.
    pub fn required_signers(&self, fee_payer: &Pubkey) -> Vec<Pubkey> {
        let mut signers = vec![*fee_payer];
        for meta in self.instructions().iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }

    pub fn to_transaction(
        &self,
        fee_payer: &Pubkey,
        recent_blockhash: &[u8; 32],
    ) -> Result<SolTransaction, SdkError> {
        Ok(compile_transaction(
            &self.instructions(),
            fee_payer,
            recent_blockhash,
        )?)
    }

    /// Extra signers as the keys they sign for.
    pub fn extra_signer_keys(&self) -> Vec<Pubkey> {
        self.extra_signers.iter().map(Signer::pubkey).collect()
    }
}

/// Builds instructions for one program from its interface document.
#[derive(Debug, Clone, Copy)]
pub struct InstructionBuilder<'a> {
    program_id: Pubkey,
    interface: &'a ProgramInterface,
}

impl<'a> InstructionBuilder<'a> {
    pub fn new(program_id: Pubkey, interface: &'a ProgramInterface) -> Self {
        Self {
            program_id,
            interface,
        }
    }

    pub fn interface(&self) -> &'a ProgramInterface {
        self.interface
    }

    /// Build from a typed account list; the instruction name comes from the
    /// list's type.
    pub fn build_for<A: InstructionAccounts>(
        &self,
        args: &[ArgValue],
        accounts: &A,
    ) -> Result<InstructionSpec, SdkError> {
        self.build(A::INSTRUCTION, args, accounts)
    }

    /// Check `accounts` against the interface, encode `args` and produce the
    /// instruction.
    pub fn build(
        &self,
        name: &str,
        args: &[ArgValue],
        accounts: &dyn AccountList,
    ) -> Result<InstructionSpec, SdkError> {
        let result = self.try_build(name, args, accounts);
        if let Err(err) = &result {
            tracing::error!(
                program = %self.interface.name,
                instruction = name,
                error = %err,
                "instruction does not match its interface"
            );
        }
        result
    }

    fn try_build(
        &self,
        name: &str,
        args: &[ArgValue],
        accounts: &dyn AccountList,
    ) -> Result<InstructionSpec, SdkError> {
        let def = self.interface.instruction(name)?;
        let metas = accounts.account_refs();

        if metas.len() != def.accounts.len() {
            return Err(SdkError::MissingAccount(format!(
                "{name} expects {} accounts, got {}",
                def.accounts.len(),
                metas.len()
            )));
        }

        if let Some(names) = accounts.slot_names() {
            for (slot, given) in def.accounts.iter().zip(names) {
                if slot.name != *given {
                    return Err(SdkError::SchemaMismatch(format!(
                        "{name}: expected slot {}, got {given}",
                        slot.name
                    )));
                }
            }
        }

        for (slot, meta) in def.accounts.iter().zip(&metas) {
            if slot.is_mut != meta.is_writable || slot.is_signer != meta.is_signer {
                return Err(SdkError::SchemaMismatch(format!(
                    "{name}.{}: expected writable={} signer={}, got writable={} signer={}",
                    slot.name, slot.is_mut, slot.is_signer, meta.is_writable, meta.is_signer
                )));
            }
        }

        let data = self.interface.encode_instruction(name, args)?;
        tracing::debug!(
            instruction = name,
            discriminator = %hex::encode(&data[..8]),
            data_len = data.len(),
            "built instruction"
        );

        let mut all = metas;
        all.extend(accounts.remaining_accounts());

        Ok(InstructionSpec {
            program_id: self.program_id,
            accounts: all,
            data,
            pre_instructions: Vec::new(),
            extra_signers: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{stream, WithRemaining};
    use chain_sol::{system, SYSTEM_PROGRAM_ID};
    use program_idl::{InterfaceRegistry, ProgramKind};

    fn registry() -> InterfaceRegistry {
        InterfaceRegistry::embedded().unwrap()
    }

    fn program() -> Pubkey {
        Pubkey::new_from_array([0xAB; 32])
    }

    fn deposit_accounts(sender: Pubkey) -> stream::DepositSol {
        stream::DepositSol {
            zebec_vault: Pubkey::new_from_array([1; 32]),
            sender,
            system_program: SYSTEM_PROGRAM_ID,
        }
    }

    #[test]
    fn deposit_sol_amount_decodes_back() {
        let registry = registry();
        let iface = registry.get(ProgramKind::Stream);
        let builder = InstructionBuilder::new(program(), iface);
        let spec = builder
            .build_for(
                &[ArgValue::U64(1_000_000)],
                &deposit_accounts(Pubkey::new_from_array([2; 32])),
            )
            .unwrap();

        assert_eq!(
            iface.decode_instruction("depositSol", &spec.data).unwrap(),
            vec![ArgValue::U64(1_000_000)]
        );
        assert_eq!(spec.program_id, program());
        assert_eq!(spec.accounts.len(), 3);
    }

    #[test]
    fn identical_inputs_build_identical_specs() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.stream());
        let accounts = deposit_accounts(Pubkey::new_from_array([2; 32]));

        let a = builder.build_for(&[ArgValue::U64(u64::MAX)], &accounts).unwrap();
        let b = builder.build_for(&[ArgValue::U64(u64::MAX)], &accounts).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.accounts, b.accounts);
    }

    #[test]
    fn short_account_list_is_missing_account() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.stream());
        let accounts = vec![
            AccountMeta::new(Pubkey::new_from_array([1; 32]), false),
            AccountMeta::new(Pubkey::new_from_array([2; 32]), true),
        ];

        let err = builder
            .build("depositSol", &[ArgValue::U64(1)], &accounts)
            .unwrap_err();
        assert_eq!(
            err,
            SdkError::MissingAccount("depositSol expects 3 accounts, got 2".into())
        );
    }

    #[test]
    fn wrong_roles_are_schema_mismatch() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.stream());
        let accounts = vec![
            AccountMeta::new(Pubkey::new_from_array([1; 32]), false),
            AccountMeta::new_readonly(Pubkey::new_from_array([2; 32]), true),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ];

        let err = builder
            .build("depositSol", &[ArgValue::U64(1)], &accounts)
            .unwrap_err();
        assert!(matches!(err, SdkError::SchemaMismatch(ref m) if m.starts_with("depositSol.sender")));
    }

    #[test]
    fn typed_list_for_another_instruction_is_schema_mismatch() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.stream());

        // Same length as depositSol, different slots.
        let err = builder
            .build("depositSol", &[ArgValue::U64(1)], &stream::PauseStream::filled(0))
            .unwrap_err();
        assert_eq!(
            err,
            SdkError::SchemaMismatch("depositSol: expected slot zebecVault, got sender".into())
        );

        let err = builder
            .build("depositSol", &[ArgValue::U64(1)], &stream::CancelStream::filled(0))
            .unwrap_err();
        assert!(matches!(err, SdkError::MissingAccount(_)));
    }

    #[test]
    fn bad_arguments_are_schema_mismatch() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.stream());
        let accounts = deposit_accounts(Pubkey::new_from_array([2; 32]));

        assert!(matches!(
            builder.build_for(&[ArgValue::Bool(true)], &accounts),
            Err(SdkError::SchemaMismatch(_))
        ));
        assert!(matches!(
            builder.build_for(&[], &accounts),
            Err(SdkError::SchemaMismatch(_))
        ));
        assert!(matches!(
            builder.build("noSuchInstruction", &[], &accounts),
            Err(SdkError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn remaining_accounts_are_appended() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.batch_transfer());
        let receivers = [Pubkey::new_from_array([0x71; 32]), Pubkey::new_from_array([0x72; 32])];
        let accounts = WithRemaining {
            accounts: crate::accounts::batch::TransferSol::filled(0),
            remaining: receivers.iter().map(|r| AccountMeta::new(*r, false)).collect(),
        };

        let spec = builder
            .build_for(
                &[ArgValue::Vec(vec![ArgValue::U64(5), ArgValue::U64(6)])],
                &accounts,
            )
            .unwrap();
        assert_eq!(spec.accounts.len(), 6);
        assert_eq!(spec.accounts[4].pubkey, receivers[0]);
        assert_eq!(spec.accounts[5].pubkey, receivers[1]);
    }

    #[test]
    fn pre_instructions_come_first_and_signers_are_merged() {
        let registry = registry();
        let builder = InstructionBuilder::new(program(), registry.stream());
        let payer = Pubkey::new_from_array([2; 32]);
        let fresh = Keypair::from_seed(&[3; 32]);
        let create = system::create_account(&payer, &Signer::pubkey(&fresh), 1, 178, &program());

        let spec = builder
            .build_for(&[ArgValue::U64(1)], &deposit_accounts(payer))
            .unwrap()
            .with_pre_instruction(create.clone())
            .with_signer(fresh.clone());

        let instructions = spec.instructions();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0], create);
        assert_eq!(instructions[1].program_id, program());
        assert_eq!(
            spec.required_signers(&payer),
            vec![payer, Signer::pubkey(&fresh)]
        );
        assert_eq!(spec.extra_signer_keys(), vec![Signer::pubkey(&fresh)]);

        let tx = spec.to_transaction(&payer, &[9; 32]).unwrap();
        assert_eq!(tx.signer_keys(), &[payer, Signer::pubkey(&fresh)]);
    }
}
