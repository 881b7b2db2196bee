//! Borsh encoding of instruction arguments and account data, driven by the
//! types declared in a [`ProgramInterface`].
//!
//! Values are checked against the declared type while encoding, so a caller
//! passing a `bool` where the program wants a `u64` gets an error instead of
//! a malformed instruction.

use borsh::{BorshDeserialize, BorshSerialize};
use chain_sol::Pubkey;

use crate::discriminator::{account_discriminator, instruction_discriminator};
use crate::error::IdlError;
use crate::schema::{FieldDef, IdlType, ProgramInterface, DISCRIMINATOR_LEN};

/// A dynamically typed argument or account field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    U128(u128),
    PublicKey(Pubkey),
    Bytes(Vec<u8>),
    String(String),
    Vec(Vec<ArgValue>),
    Option(Option<Box<ArgValue>>),
    /// Fields of a defined struct, in declaration order.
    Struct(Vec<ArgValue>),
}

impl ArgValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any unsigned integer that fits in a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ArgValue::U8(v) => Some(u64::from(*v)),
            ArgValue::U16(v) => Some(u64::from(*v)),
            ArgValue::U32(v) => Some(u64::from(*v)),
            ArgValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_pubkey(&self) -> Option<Pubkey> {
        match self {
            ArgValue::PublicKey(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ArgValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::Vec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::Struct(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<u8> for ArgValue {
    fn from(v: u8) -> Self {
        ArgValue::U8(v)
    }
}

impl From<u64> for ArgValue {
    fn from(v: u64) -> Self {
        ArgValue::U64(v)
    }
}

impl From<Pubkey> for ArgValue {
    fn from(v: Pubkey) -> Self {
        ArgValue::PublicKey(v)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(v: Vec<u8>) -> Self {
        ArgValue::Bytes(v)
    }
}

/// A decoded program-owned account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAccount {
    pub layout: String,
    pub fields: Vec<(String, ArgValue)>,
}

impl DecodedAccount {
    pub fn get(&self, name: &str) -> Result<&ArgValue, IdlError> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| IdlError::Decode(format!("{} has no field {name}", self.layout)))
    }

    pub fn u64(&self, name: &str) -> Result<u64, IdlError> {
        self.typed(name, "u64", ArgValue::as_u64)
    }

    pub fn bool(&self, name: &str) -> Result<bool, IdlError> {
        self.typed(name, "bool", ArgValue::as_bool)
    }

    pub fn pubkey(&self, name: &str) -> Result<Pubkey, IdlError> {
        self.typed(name, "publicKey", ArgValue::as_pubkey)
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: &str,
        pick: impl Fn(&ArgValue) -> Option<T>,
    ) -> Result<T, IdlError> {
        pick(self.get(name)?).ok_or_else(|| IdlError::TypeMismatch {
            field: name.to_string(),
            expected: expected.to_string(),
        })
    }
}

impl ProgramInterface {
    /// Discriminator followed by the Borsh-encoded arguments.
    pub fn encode_instruction(&self, name: &str, args: &[ArgValue]) -> Result<Vec<u8>, IdlError> {
        let def = self.instruction(name)?;
        if def.args.len() != args.len() {
            return Err(IdlError::ArgumentCount {
                instruction: name.to_string(),
                expected: def.args.len(),
                actual: args.len(),
            });
        }

        let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + 8 * args.len());
        data.extend_from_slice(&instruction_discriminator(name));
        for (field, value) in def.args.iter().zip(args) {
            self.encode_value(&field.ty, value, &field.name, &mut data)?;
        }
        Ok(data)
    }

    /// Inverse of [`encode_instruction`](Self::encode_instruction). Trailing
    /// bytes are an error.
    pub fn decode_instruction(&self, name: &str, data: &[u8]) -> Result<Vec<ArgValue>, IdlError> {
        let def = self.instruction(name)?;
        let mut buf = strip_discriminator(data, &instruction_discriminator(name), name)?;

        let mut values = Vec::with_capacity(def.args.len());
        for field in &def.args {
            values.push(self.decode_value(&field.ty, &mut buf, &field.name)?);
        }
        if !buf.is_empty() {
            return Err(IdlError::Decode(format!(
                "{} trailing bytes after {name} arguments",
                buf.len()
            )));
        }
        Ok(values)
    }

    /// Discriminator followed by the Borsh-encoded account fields.
    pub fn encode_account(&self, name: &str, fields: &[ArgValue]) -> Result<Vec<u8>, IdlError> {
        let layout = self.account_layout(name)?;
        if layout.fields().len() != fields.len() {
            return Err(IdlError::ArgumentCount {
                instruction: name.to_string(),
                expected: layout.fields().len(),
                actual: fields.len(),
            });
        }

        let mut data = account_discriminator(name).to_vec();
        for (field, value) in layout.fields().iter().zip(fields) {
            self.encode_value(&field.ty, value, &field.name, &mut data)?;
        }
        Ok(data)
    }

    /// Decode program-owned account data. Accounts are often allocated with
    /// slack, so trailing bytes are ignored.
    pub fn decode_account(&self, name: &str, data: &[u8]) -> Result<DecodedAccount, IdlError> {
        let layout = self.account_layout(name)?;
        let mut buf = strip_discriminator(data, &account_discriminator(name), name)?;

        let fields = self.decode_fields(layout.fields(), &mut buf)?;
        Ok(DecodedAccount {
            layout: name.to_string(),
            fields,
        })
    }

    fn decode_fields(
        &self,
        fields: &[FieldDef],
        buf: &mut &[u8],
    ) -> Result<Vec<(String, ArgValue)>, IdlError> {
        fields
            .iter()
            .map(|f| Ok((f.name.clone(), self.decode_value(&f.ty, buf, &f.name)?)))
            .collect()
    }

    fn encode_value(
        &self,
        ty: &IdlType,
        value: &ArgValue,
        field: &str,
        out: &mut Vec<u8>,
    ) -> Result<(), IdlError> {
        match (ty, value) {
            (IdlType::Bool, ArgValue::Bool(v)) => put(v, out),
            (IdlType::U8, ArgValue::U8(v)) => put(v, out),
            (IdlType::U16, ArgValue::U16(v)) => put(v, out),
            (IdlType::U32, ArgValue::U32(v)) => put(v, out),
            (IdlType::U64, ArgValue::U64(v)) => put(v, out),
            (IdlType::I64, ArgValue::I64(v)) => put(v, out),
            (IdlType::U128, ArgValue::U128(v)) => put(v, out),
            (IdlType::PublicKey, ArgValue::PublicKey(v)) => put(v.as_array(), out),
            (IdlType::Bytes, ArgValue::Bytes(v)) => put(v, out),
            (IdlType::String, ArgValue::String(v)) => put(v, out),
            (IdlType::Vec(inner), ArgValue::Vec(items)) => {
                let len = u32::try_from(items.len())
                    .map_err(|_| IdlError::Encode(format!("{field}: vector too long")))?;
                put(&len, out)?;
                items
                    .iter()
                    .try_for_each(|item| self.encode_value(inner, item, field, out))
            }
            (IdlType::Option(inner), ArgValue::Option(opt)) => match opt {
                None => put(&0u8, out),
                Some(item) => {
                    put(&1u8, out)?;
                    self.encode_value(inner, item, field, out)
                }
            },
            (IdlType::Array(inner, len), ArgValue::Vec(items)) if items.len() == *len => items
                .iter()
                .try_for_each(|item| self.encode_value(inner, item, field, out)),
            (IdlType::Defined(name), ArgValue::Struct(values)) => {
                let fields = self.type_def(name)?.fields();
                if fields.len() != values.len() {
                    return Err(mismatch(field, ty));
                }
                fields
                    .iter()
                    .zip(values)
                    .try_for_each(|(f, v)| self.encode_value(&f.ty, v, &f.name, out))
            }
            _ => Err(mismatch(field, ty)),
        }
    }

    fn decode_value(
        &self,
        ty: &IdlType,
        buf: &mut &[u8],
        field: &str,
    ) -> Result<ArgValue, IdlError> {
        Ok(match ty {
            IdlType::Bool => ArgValue::Bool(take(buf, field)?),
            IdlType::U8 => ArgValue::U8(take(buf, field)?),
            IdlType::U16 => ArgValue::U16(take(buf, field)?),
            IdlType::U32 => ArgValue::U32(take(buf, field)?),
            IdlType::U64 => ArgValue::U64(take(buf, field)?),
            IdlType::I64 => ArgValue::I64(take(buf, field)?),
            IdlType::U128 => ArgValue::U128(take(buf, field)?),
            IdlType::PublicKey => ArgValue::PublicKey(Pubkey::new_from_array(take(buf, field)?)),
            IdlType::Bytes => ArgValue::Bytes(take(buf, field)?),
            IdlType::String => ArgValue::String(take(buf, field)?),
            IdlType::Vec(inner) => {
                let len: u32 = take(buf, field)?;
                // Every element takes at least one byte.
                if len as usize > buf.len() {
                    return Err(IdlError::Decode(format!(
                        "{field}: length {len} exceeds remaining data"
                    )));
                }
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(self.decode_value(inner, buf, field)?);
                }
                ArgValue::Vec(items)
            }
            IdlType::Option(inner) => match take::<u8>(buf, field)? {
                0 => ArgValue::Option(None),
                1 => ArgValue::Option(Some(Box::new(self.decode_value(inner, buf, field)?))),
                tag => {
                    return Err(IdlError::Decode(format!("{field}: invalid option tag {tag}")))
                }
            },
            IdlType::Array(inner, len) => {
                let mut items = Vec::with_capacity(*len);
                for _ in 0..*len {
                    items.push(self.decode_value(inner, buf, field)?);
                }
                ArgValue::Vec(items)
            }
            IdlType::Defined(name) => {
                let fields = self.type_def(name)?.fields();
                let values = self
                    .decode_fields(fields, buf)?
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect();
                ArgValue::Struct(values)
            }
        })
    }
}

fn put<T: BorshSerialize + ?Sized>(value: &T, out: &mut Vec<u8>) -> Result<(), IdlError> {
    value
        .serialize(out)
        .map_err(|e| IdlError::Encode(e.to_string()))
}

fn take<T: BorshDeserialize>(buf: &mut &[u8], field: &str) -> Result<T, IdlError> {
    T::deserialize(buf).map_err(|e| IdlError::Decode(format!("{field}: {e}")))
}

fn mismatch(field: &str, ty: &IdlType) -> IdlError {
    IdlError::TypeMismatch {
        field: field.to_string(),
        expected: ty.to_string(),
    }
}

fn strip_discriminator<'a>(
    data: &'a [u8],
    expected: &[u8; DISCRIMINATOR_LEN],
    name: &str,
) -> Result<&'a [u8], IdlError> {
    match data.split_first_chunk::<DISCRIMINATOR_LEN>() {
        Some((disc, rest)) if disc == expected => Ok(rest),
        _ => Err(IdlError::DiscriminatorMismatch(name.to_string())),
    }
}
