use std::sync::Arc;

use chain_sol::Pubkey;
use program_idl::{InterfaceRegistry, ProgramInterface, ProgramKind};

use crate::builder::InstructionBuilder;
use crate::config::{ProgramIds, SdkConfig, Timing};
use crate::error::SdkError;
use crate::ledger::{AccountInfo, LedgerClient};

/// Read-only state shared by every service.
pub struct SdkContext {
    pub ids: ProgramIds,
    pub registry: InterfaceRegistry,
    pub ledger: Arc<dyn LedgerClient>,
    pub timing: Timing,
}

impl SdkContext {
    pub fn new(config: &SdkConfig, ledger: Arc<dyn LedgerClient>) -> Result<Self, SdkError> {
        Ok(Self {
            ids: config.program_ids()?,
            registry: InterfaceRegistry::embedded()?,
            ledger,
            timing: config.timing(),
        })
    }

    pub fn interface(&self, kind: ProgramKind) -> &ProgramInterface {
        self.registry.get(kind)
    }

    pub fn builder(&self, kind: ProgramKind) -> InstructionBuilder<'_> {
        InstructionBuilder::new(self.ids.program_id(kind), self.registry.get(kind))
    }

    /// Fetch an account that must exist and be owned by `owner`.
    pub async fn fetch_owned(
        &self,
        address: &Pubkey,
        owner: &Pubkey,
        what: &str,
    ) -> Result<AccountInfo, SdkError> {
        let account = self
            .ledger
            .get_account_info(address)
            .await?
            .ok_or_else(|| SdkError::Precondition(format!("{what} {address} not found")))?;

        if account.owner != *owner {
            return Err(SdkError::Precondition(format!(
                "{what} {address} is owned by {}, expected {owner}",
                account.owner
            )));
        }
        Ok(account)
    }
}

impl std::fmt::Debug for SdkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkContext")
            .field("ids", &self.ids)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedgerClient;
    use crate::testing::context;

    fn ledger_returning(account: Option<AccountInfo>) -> MockLedgerClient {
        let mut ledger = MockLedgerClient::new();
        ledger.expect_get_account_info().returning(move |_| {
            let account = account.clone();
            Box::pin(async move { Ok(account) })
        });
        ledger
    }

    #[tokio::test]
    async fn absent_account_is_a_precondition() {
        let ctx = context(ledger_returning(None));
        let err = ctx
            .fetch_owned(&Pubkey::new_from_array([1; 32]), &ctx.ids.multisig, "safe")
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Precondition(ref m) if m.contains("not found")));
    }

    #[tokio::test]
    async fn foreign_owner_is_a_precondition() {
        let ctx = context(ledger_returning(Some(AccountInfo {
            owner: Pubkey::new_from_array([9; 32]),
            lamports: 1,
            data: vec![],
        })));
        let err = ctx
            .fetch_owned(&Pubkey::new_from_array([1; 32]), &ctx.ids.multisig, "safe")
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Precondition(ref m) if m.contains("owned by")));
    }

    #[test]
    fn builder_targets_configured_program() {
        let ctx = context(MockLedgerClient::new());
        let ix = ctx
            .builder(ProgramKind::BatchTransfer)
            .build("depositSol", &[program_idl::ArgValue::U64(5)], &vec![
                chain_sol::AccountMeta::new(Pubkey::new_from_array([1; 32]), true),
                chain_sol::AccountMeta::new(Pubkey::new_from_array([2; 32]), false),
                chain_sol::AccountMeta::new_readonly(chain_sol::SYSTEM_PROGRAM_ID, false),
            ])
            .unwrap();
        assert_eq!(ix.program_id, ctx.ids.batch_transfer);
    }
}
