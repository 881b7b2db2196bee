//! Typed account lists, one struct per program instruction.
//!
//! Every struct fixes the order and the writable/signer role of each slot at
//! compile time. The builder re-checks names, order and roles against the
//! interface document, so a drifted document fails loudly instead of
//! producing a transaction the program misreads.

use chain_sol::AccountMeta;

/// Something that yields the account metas for one instruction.
pub trait AccountList {
    /// Slot names in order, when the list knows them.
    fn slot_names(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// The fixed slots, in interface order.
    fn account_refs(&self) -> Vec<AccountMeta>;

    /// Variable trailing accounts the program reads beyond its fixed slots.
    fn remaining_accounts(&self) -> Vec<AccountMeta> {
        Vec::new()
    }
}

/// A statically shaped account list for a named instruction.
pub trait InstructionAccounts: AccountList {
    const INSTRUCTION: &'static str;
    const FIELDS: &'static [&'static str];
}

/// An untyped list, mostly useful in tests and for ad-hoc instructions.
impl AccountList for Vec<AccountMeta> {
    fn account_refs(&self) -> Vec<AccountMeta> {
        self.clone()
    }
}

/// Fixed slots plus trailing accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithRemaining<A> {
    pub accounts: A,
    pub remaining: Vec<AccountMeta>,
}

impl<A: AccountList> AccountList for WithRemaining<A> {
    fn slot_names(&self) -> Option<&'static [&'static str]> {
        self.accounts.slot_names()
    }

    fn account_refs(&self) -> Vec<AccountMeta> {
        self.accounts.account_refs()
    }

    fn remaining_accounts(&self) -> Vec<AccountMeta> {
        let mut all = self.accounts.remaining_accounts();
        all.extend(self.remaining.iter().cloned());
        all
    }
}

impl<A: InstructionAccounts> InstructionAccounts for WithRemaining<A> {
    const INSTRUCTION: &'static str = A::INSTRUCTION;
    const FIELDS: &'static [&'static str] = A::FIELDS;
}

macro_rules! account_meta {
    (readonly, $key:expr) => {
        ::chain_sol::AccountMeta::new_readonly($key, false)
    };
    (writable, $key:expr) => {
        ::chain_sol::AccountMeta::new($key, false)
    };
    (signer, $key:expr) => {
        ::chain_sol::AccountMeta::new_readonly($key, true)
    };
    (writable_signer, $key:expr) => {
        ::chain_sol::AccountMeta::new($key, true)
    };
}

macro_rules! define_accounts {
    ($(
        $(#[$meta:meta])*
        $name:ident => $ix:literal {
            $( $field:ident : $role:ident = $slot:literal ),* $(,)?
        }
    )*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $( pub $field: ::chain_sol::Pubkey, )*
        }

        impl $crate::accounts::AccountList for $name {
            fn slot_names(&self) -> Option<&'static [&'static str]> {
                Some(<Self as $crate::accounts::InstructionAccounts>::FIELDS)
            }

            fn account_refs(&self) -> Vec<::chain_sol::AccountMeta> {
                vec![$( account_meta!($role, self.$field) ),*]
            }
        }

        impl $crate::accounts::InstructionAccounts for $name {
            const INSTRUCTION: &'static str = $ix;
            const FIELDS: &'static [&'static str] = &[$($slot),*];
        }

        #[cfg(test)]
        impl $name {
            /// Distinct placeholder keys, one per slot.
            pub(crate) fn filled(seed: u8) -> Self {
                let mut next = seed;
                Self {
                    $( $field: {
                        next = next.wrapping_add(1);
                        ::chain_sol::Pubkey::new_from_array([next; 32])
                    }, )*
                }
            }
        }
    )*};
}

pub mod batch;
pub mod multisig;
pub mod stream;
