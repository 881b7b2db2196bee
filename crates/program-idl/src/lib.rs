//! Program interface documents for the Zebec programs.
//!
//! An interface document lists each instruction's accounts (with their
//! writable/signer roles) and argument types, the layouts of program-owned
//! accounts, and the program's custom error codes. This crate parses those
//! documents and encodes/decodes instruction data and account data from them.

pub mod codec;
pub mod discriminator;
pub mod error;
pub mod framework;
pub mod registry;
pub mod schema;

pub use codec::{ArgValue, DecodedAccount};
pub use discriminator::{account_discriminator, instruction_discriminator, to_snake_case};
pub use error::IdlError;
pub use framework::framework_error;
pub use registry::{InterfaceRegistry, ProgramKind};
pub use schema::{
    AccountDef, ErrorDef, FieldDef, IdlType, InstructionDef, ProgramInterface, TypeDef,
    DISCRIMINATOR_LEN,
};
