//! Serde model of an Anchor-style program interface document.
//!
//! Only the legacy (pre-0.30) JSON layout is understood: instruction accounts
//! carry `isMut` / `isSigner`, and field types are either a primitive name or
//! a single-key object such as `{"vec": "u64"}` or `{"defined": "Foo"}`.

use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;

use crate::error::IdlError;

/// The full description of one on-chain program.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramInterface {
    pub version: String,
    pub name: String,
    pub instructions: Vec<InstructionDef>,
    #[serde(default)]
    pub accounts: Vec<TypeDef>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub errors: Vec<ErrorDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructionDef {
    pub name: String,
    pub accounts: Vec<AccountDef>,
    #[serde(default)]
    pub args: Vec<FieldDef>,
}

/// One named account slot of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountDef {
    pub name: String,
    #[serde(rename = "isMut")]
    pub is_mut: bool,
    #[serde(rename = "isSigner")]
    pub is_signer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub body: TypeDefBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDefBody {
    Struct { fields: Vec<FieldDef> },
}

impl TypeDef {
    pub fn fields(&self) -> &[FieldDef] {
        match &self.body {
            TypeDefBody::Struct { fields } => fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorDef {
    pub code: u32,
    pub name: String,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ErrorDef {
    /// The human readable message, falling back to the error name.
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawIdlType")]
pub enum IdlType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I64,
    U128,
    PublicKey,
    Bytes,
    String,
    Vec(Box<IdlType>),
    Option(Box<IdlType>),
    Array(Box<IdlType>, usize),
    Defined(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdlType {
    Primitive(String),
    Vec { vec: Box<RawIdlType> },
    Option { option: Box<RawIdlType> },
    Array { array: (Box<RawIdlType>, usize) },
    Defined { defined: String },
}

impl TryFrom<RawIdlType> for IdlType {
    type Error = IdlError;

    fn try_from(raw: RawIdlType) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawIdlType::Primitive(name) => match name.as_str() {
                "bool" => IdlType::Bool,
                "u8" => IdlType::U8,
                "u16" => IdlType::U16,
                "u32" => IdlType::U32,
                "u64" => IdlType::U64,
                "i64" => IdlType::I64,
                "u128" => IdlType::U128,
                "publicKey" => IdlType::PublicKey,
                "bytes" => IdlType::Bytes,
                "string" => IdlType::String,
                other => return Err(IdlError::UnknownType(other.to_string())),
            },
            RawIdlType::Vec { vec } => IdlType::Vec(Box::new((*vec).try_into()?)),
            RawIdlType::Option { option } => IdlType::Option(Box::new((*option).try_into()?)),
            RawIdlType::Array { array: (inner, len) } => {
                IdlType::Array(Box::new((*inner).try_into()?), len)
            }
            RawIdlType::Defined { defined } => IdlType::Defined(defined),
        })
    }
}

impl fmt::Display for IdlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdlType::Bool => f.write_str("bool"),
            IdlType::U8 => f.write_str("u8"),
            IdlType::U16 => f.write_str("u16"),
            IdlType::U32 => f.write_str("u32"),
            IdlType::U64 => f.write_str("u64"),
            IdlType::I64 => f.write_str("i64"),
            IdlType::U128 => f.write_str("u128"),
            IdlType::PublicKey => f.write_str("publicKey"),
            IdlType::Bytes => f.write_str("bytes"),
            IdlType::String => f.write_str("string"),
            IdlType::Vec(inner) => write!(f, "vec<{inner}>"),
            IdlType::Option(inner) => write!(f, "option<{inner}>"),
            IdlType::Array(inner, len) => write!(f, "[{inner}; {len}]"),
            IdlType::Defined(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Size of the Anchor discriminator that prefixes instruction data and
/// program-owned account data.
pub const DISCRIMINATOR_LEN: usize = 8;

impl ProgramInterface {
    /// Parse and validate an interface document.
    pub fn from_json(json: &str) -> Result<Self, IdlError> {
        let interface: ProgramInterface = serde_json::from_str(json)
            .map_err(|e| IdlError::InvalidDocument(e.to_string()))?;
        interface.validate()?;
        Ok(interface)
    }

    pub fn instruction(&self, name: &str) -> Result<&InstructionDef, IdlError> {
        self.instructions
            .iter()
            .find(|ix| ix.name == name)
            .ok_or_else(|| IdlError::UnknownInstruction(format!("{}::{name}", self.name)))
    }

    /// An account layout from the `accounts` section.
    pub fn account_layout(&self, name: &str) -> Result<&TypeDef, IdlError> {
        self.accounts
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| IdlError::UnknownAccount(format!("{}::{name}", self.name)))
    }

    /// A named type, searched in `types` first and then in `accounts`.
    pub fn type_def(&self, name: &str) -> Result<&TypeDef, IdlError> {
        self.types
            .iter()
            .chain(self.accounts.iter())
            .find(|def| def.name == name)
            .ok_or_else(|| IdlError::UnknownType(name.to_string()))
    }

    /// The declared error with the given custom program error code.
    pub fn error(&self, code: u32) -> Option<&ErrorDef> {
        self.errors.iter().find(|e| e.code == code)
    }

    /// Byte size of a fixed-size account layout, discriminator included.
    pub fn account_size(&self, name: &str) -> Result<usize, IdlError> {
        let layout = self.account_layout(name)?;
        let mut size = DISCRIMINATOR_LEN;
        for field in layout.fields() {
            size += self
                .fixed_size(&field.ty)?
                .ok_or_else(|| IdlError::VariableSize(name.to_string()))?;
        }
        Ok(size)
    }

    /// Encoded size of a type, or `None` if it carries a length prefix.
    pub fn fixed_size(&self, ty: &IdlType) -> Result<Option<usize>, IdlError> {
        Ok(match ty {
            IdlType::Bool | IdlType::U8 => Some(1),
            IdlType::U16 => Some(2),
            IdlType::U32 => Some(4),
            IdlType::U64 | IdlType::I64 => Some(8),
            IdlType::U128 => Some(16),
            IdlType::PublicKey => Some(32),
            IdlType::Bytes | IdlType::String | IdlType::Vec(_) | IdlType::Option(_) => None,
            IdlType::Array(inner, len) => self.fixed_size(inner)?.map(|s| s * len),
            IdlType::Defined(name) => {
                let mut total = 0;
                for field in self.type_def(name)?.fields() {
                    match self.fixed_size(&field.ty)? {
                        Some(s) => total += s,
                        None => return Ok(None),
                    }
                }
                Some(total)
            }
        })
    }

    fn validate(&self) -> Result<(), IdlError> {
        let mut seen = HashSet::new();
        for ix in &self.instructions {
            if !seen.insert(ix.name.as_str()) {
                return Err(IdlError::InvalidDocument(format!(
                    "duplicate instruction {}",
                    ix.name
                )));
            }
            for arg in &ix.args {
                self.check_type(&arg.ty)?;
            }
        }
        for def in self.types.iter().chain(self.accounts.iter()) {
            for field in def.fields() {
                self.check_type(&field.ty)?;
            }
        }
        let mut codes = HashSet::new();
        for err in &self.errors {
            if !codes.insert(err.code) {
                return Err(IdlError::InvalidDocument(format!(
                    "duplicate error code {}",
                    err.code
                )));
            }
        }
        Ok(())
    }

    fn check_type(&self, ty: &IdlType) -> Result<(), IdlError> {
        match ty {
            IdlType::Vec(inner) | IdlType::Option(inner) | IdlType::Array(inner, _) => {
                self.check_type(inner)
            }
            IdlType::Defined(name) => self.type_def(name).map(|_| ()),
            _ => Ok(()),
        }
    }
}
