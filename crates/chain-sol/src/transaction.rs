//! Solana legacy transaction wire format and multi-signer assembly.
//!
//! We build Solana transactions entirely by hand, with no `solana-sdk` dependency.
//! The wire format is a compact binary layout documented here:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use crate::address::Pubkey;
use crate::error::SolError;
use crate::keypair::Signer;

/// Account keys are addressed by a `u8` index inside compiled instructions.
const MAX_ACCOUNT_KEYS: usize = 256;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SolError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;

        value |= ((byte & 0x7f) as u32) << (7 * consumed);
        consumed += 1;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    u16::try_from(value)
        .map(|v| (v, consumed))
        .map_err(|_| SolError::SerializationError("compact-u16 value overflow".into()))
}

fn compact_len(len: usize, what: &str) -> Result<Vec<u8>, SolError> {
    u16::try_from(len)
        .map(encode_compact_u16)
        .map_err(|_| SolError::SerializationError(format!("{what} length {len} exceeds u16")))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account.
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account.
    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A Solana instruction (before it is compiled into a transaction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled, unsigned legacy transaction message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolTransaction {
    /// All account keys referenced by this transaction, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<Pubkey>,

    /// Number of required signatures (first N accounts are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned: u8,

    pub recent_blockhash: [u8; 32],

    pub compiled_instructions: Vec<CompiledInstruction>,
}

impl SolTransaction {
    /// Keys whose signatures the transaction needs, in signature-slot order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        &self.account_keys[..self.num_required_signatures as usize]
    }
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the transaction's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Transaction building
// ---------------------------------------------------------------------------

/// Build a transaction from a set of instructions with a single fee payer.
///
/// Instructions keep their relative order. Account keys are de-duplicated;
/// a key that appears several times keeps the union of its flags.
pub fn compile_transaction(
    instructions: &[Instruction],
    fee_payer: &Pubkey,
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    if instructions.is_empty() {
        return Err(SolError::TransactionBuildError(
            "transaction has no instructions".into(),
        ));
    }

    struct AccountEntry {
        pubkey: Pubkey,
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: Pubkey, signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    // Fee payer is always signer + writable and inserted first, so the
    // stable sort below keeps it at index 0.
    upsert(*fee_payer, true, true);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        upsert(ix.program_id, false, false);
    }

    if entries.len() > MAX_ACCOUNT_KEYS {
        return Err(SolError::TransactionBuildError(format!(
            "{} account keys exceed the limit of {MAX_ACCOUNT_KEYS}",
            entries.len()
        )));
    }

    fn rank(e: &AccountEntry) -> u8 {
        match (e.is_signer, e.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
    entries.sort_by_key(rank);

    let count = |pred: fn(&AccountEntry) -> bool| entries.iter().filter(|e| pred(e)).count() as u8;
    let num_signers = count(|e| e.is_signer);
    let num_readonly_signed = count(|e| e.is_signer && !e.is_writable);
    let num_readonly_unsigned = count(|e| !e.is_signer && !e.is_writable);

    let account_keys: Vec<Pubkey> = entries.iter().map(|e| e.pubkey).collect();

    let index_of = |key: &Pubkey| -> Result<u8, SolError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| {
                SolError::TransactionBuildError(format!("{key} not in account keys"))
            })
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey))
            .collect::<Result<Vec<u8>, SolError>>()?;

        compiled.push(CompiledInstruction {
            program_id_index: index_of(&ix.program_id)?,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(SolTransaction {
        account_keys,
        num_required_signatures: num_signers,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the transaction message (the bytes that get signed).
pub fn serialize_message(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(256);

    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&compact_len(tx.account_keys.len(), "account keys")?);
    for key in &tx.account_keys {
        buf.extend_from_slice(key.as_ref());
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&compact_len(tx.compiled_instructions.len(), "instructions")?);
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);

        buf.extend_from_slice(&compact_len(ix.account_indices.len(), "account indices")?);
        buf.extend_from_slice(&ix.account_indices);

        buf.extend_from_slice(&compact_len(ix.data.len(), "instruction data")?);
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

/// Assemble the wire transaction from a serialized message and the collected
/// signatures.
///
/// Every key in [`SolTransaction::signer_keys`] must have exactly one
/// signature; signatures for keys that are not signers are rejected.
pub fn assemble_signed_transaction(
    tx: &SolTransaction,
    message: &[u8],
    signatures: &[(Pubkey, [u8; 64])],
) -> Result<Vec<u8>, SolError> {
    let signer_keys = tx.signer_keys();

    if let Some((stray, _)) = signatures.iter().find(|(k, _)| !signer_keys.contains(k)) {
        return Err(SolError::SigningError(format!(
            "{stray} is not a required signer"
        )));
    }

    let mut wire = Vec::with_capacity(3 + signer_keys.len() * 64 + message.len());
    wire.extend_from_slice(&compact_len(signer_keys.len(), "signatures")?);

    for key in signer_keys {
        let (_, sig) = signatures.iter().find(|(k, _)| k == key).ok_or_else(|| {
            SolError::SigningError(format!("missing signature for {key}"))
        })?;
        wire.extend_from_slice(sig);
    }

    wire.extend_from_slice(message);
    Ok(wire)
}

/// Sign and serialize a transaction with locally held signers.
pub fn sign_transaction(tx: &SolTransaction, signers: &[&dyn Signer]) -> Result<Vec<u8>, SolError> {
    let message = serialize_message(tx)?;
    let signatures: Vec<(Pubkey, [u8; 64])> = signers
        .iter()
        .map(|s| (s.pubkey(), s.sign_message(&message)))
        .collect();
    assemble_signed_transaction(tx, &message, &signatures)
}

/// The transaction id: Base58 of the first signature in a wire transaction.
pub fn transaction_id(wire: &[u8]) -> Result<String, SolError> {
    let (num_sigs, offset) = decode_compact_u16(wire)?;
    if num_sigs == 0 {
        return Err(SolError::SerializationError(
            "transaction has zero signatures".into(),
        ));
    }
    let sig = wire.get(offset..offset + 64).ok_or_else(|| {
        SolError::SerializationError("transaction too short for its signatures".into())
    })?;
    Ok(bs58::encode(sig).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::Keypair;
    use crate::system::{self, SYSTEM_PROGRAM_ID};

    fn key(b: u8) -> Pubkey {
        Pubkey::new_from_array([b; 32])
    }

    // -- compact-u16 --------------------------------------------------------

    #[test]
    fn compact_u16_boundaries() {
        assert_eq!(encode_compact_u16(0), vec![0x00]);
        assert_eq!(encode_compact_u16(0x7f), vec![0x7f]);
        assert_eq!(encode_compact_u16(128), vec![0x80, 0x01]);
        assert_eq!(encode_compact_u16(16383), vec![0xff, 0x7f]);
        assert_eq!(encode_compact_u16(16384), vec![0x80, 0x80, 0x01]);
        assert_eq!(encode_compact_u16(u16::MAX), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn decode_compact_u16_values() {
        assert_eq!(decode_compact_u16(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_compact_u16(&[0x80, 0x01]).unwrap(), (128, 2));
        assert_eq!(decode_compact_u16(&[0x80, 0x80, 0x01]).unwrap(), (16384, 3));
        assert_eq!(decode_compact_u16(&[0xff, 0xff, 0x03]).unwrap(), (u16::MAX, 3));
    }

    #[test]
    fn decode_compact_u16_rejects_truncated() {
        assert!(decode_compact_u16(&[]).is_err());
        assert!(decode_compact_u16(&[0x80]).is_err());
    }

    #[test]
    fn decode_compact_u16_rejects_overflow() {
        assert!(decode_compact_u16(&[0xff, 0xff, 0x7f]).is_err());
    }

    // -- compilation ----------------------------------------------------------

    #[test]
    fn compiled_transaction_account_order() {
        let from = key(1);
        let to = key(2);
        let ix = system::transfer(&from, &to, 1000);
        let tx = compile_transaction(&[ix], &from, &[0xAA; 32]).unwrap();

        assert_eq!(tx.account_keys, vec![from, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(tx.num_required_signatures, 1);
        assert_eq!(tx.num_readonly_signed, 0);
        assert_eq!(tx.num_readonly_unsigned, 1);
        assert_eq!(tx.recent_blockhash, [0xAA; 32]);
    }

    #[test]
    fn fee_payer_stays_first_among_signers() {
        let payer = key(9);
        let other_signer = key(1);
        let ix = Instruction {
            program_id: key(5),
            accounts: vec![
                AccountMeta::new(other_signer, true),
                AccountMeta::new_readonly(key(3), false),
            ],
            data: vec![],
        };
        let tx = compile_transaction(&[ix], &payer, &[0; 32]).unwrap();
        assert_eq!(tx.account_keys[0], payer);
        assert_eq!(tx.signer_keys(), &[payer, other_signer]);
    }

    #[test]
    fn duplicate_keys_merge_flags() {
        let payer = key(1);
        let shared = key(2);
        let a = Instruction {
            program_id: key(7),
            accounts: vec![AccountMeta::new_readonly(shared, false)],
            data: vec![1],
        };
        let b = Instruction {
            program_id: key(7),
            accounts: vec![AccountMeta::new(shared, true)],
            data: vec![2],
        };
        let tx = compile_transaction(&[a, b], &payer, &[0; 32]).unwrap();

        assert_eq!(tx.account_keys.len(), 3);
        assert_eq!(tx.num_required_signatures, 2);
        assert_eq!(tx.compiled_instructions[0].account_indices, vec![1]);
        assert_eq!(tx.compiled_instructions[1].account_indices, vec![1]);
        assert_eq!(tx.compiled_instructions[0].data, vec![1]);
        assert_eq!(tx.compiled_instructions[1].data, vec![2]);
    }

    #[test]
    fn empty_instruction_list_is_rejected() {
        assert!(compile_transaction(&[], &key(1), &[0; 32]).is_err());
    }

    // -- serialization + signing ---------------------------------------------

    #[test]
    fn serialize_message_layout() {
        let from = key(1);
        let tx = compile_transaction(&[system::transfer(&from, &key(2), 5)], &from, &[0xCC; 32])
            .unwrap();
        let msg = serialize_message(&tx).unwrap();

        assert_eq!(&msg[..3], &[1, 0, 1]);
        let offset = 3 + 1 + 32 * tx.account_keys.len();
        assert_eq!(&msg[offset..offset + 32], &[0xCC; 32]);
    }

    #[test]
    fn multi_signer_transaction_verifies() {
        use ed25519_dalek::{Signature, VerifyingKey};

        let payer = Keypair::from_seed(&[0x42; 32]);
        let new_account = Keypair::from_seed(&[0x43; 32]);
        let ix = system::create_account(&payer.pubkey(), &new_account.pubkey(), 1_000, 64, &key(8));
        let tx = compile_transaction(&[ix], &payer.pubkey(), &[0x99; 32]).unwrap();
        assert_eq!(tx.num_required_signatures, 2);

        let wire = sign_transaction(&tx, &[&new_account, &payer]).unwrap();
        assert_eq!(wire[0], 2);

        let message = &wire[1 + 128..];
        for (slot, signer) in [&payer, &new_account].iter().enumerate() {
            let sig: [u8; 64] = wire[1 + slot * 64..1 + (slot + 1) * 64].try_into().unwrap();
            let vk = VerifyingKey::from_bytes(signer.pubkey().as_array()).unwrap();
            assert!(vk.verify_strict(message, &Signature::from_bytes(&sig)).is_ok());
        }
    }

    #[test]
    fn missing_signer_fails() {
        let payer = Keypair::from_seed(&[0x42; 32]);
        let new_account = Keypair::from_seed(&[0x43; 32]);
        let ix = system::create_account(&payer.pubkey(), &new_account.pubkey(), 1, 0, &key(8));
        let tx = compile_transaction(&[ix], &payer.pubkey(), &[0; 32]).unwrap();

        let err = sign_transaction(&tx, &[&payer]).unwrap_err();
        assert!(err.to_string().contains("missing signature"));
    }

    #[test]
    fn stray_signer_fails() {
        let payer = Keypair::from_seed(&[0x42; 32]);
        let stranger = Keypair::from_seed(&[0x44; 32]);
        let tx = compile_transaction(
            &[system::transfer(&payer.pubkey(), &key(2), 1)],
            &payer.pubkey(),
            &[0; 32],
        )
        .unwrap();

        let err = sign_transaction(&tx, &[&payer, &stranger]).unwrap_err();
        assert!(err.to_string().contains("not a required signer"));
    }

    #[test]
    fn signing_is_deterministic() {
        let payer = Keypair::from_seed(&[0x55; 32]);
        let tx = compile_transaction(
            &[system::transfer(&payer.pubkey(), &key(7), 42)],
            &payer.pubkey(),
            &[0x99; 32],
        )
        .unwrap();
        assert_eq!(
            sign_transaction(&tx, &[&payer]).unwrap(),
            sign_transaction(&tx, &[&payer]).unwrap()
        );
    }

    #[test]
    fn transaction_id_is_first_signature() {
        let payer = Keypair::from_seed(&[0x55; 32]);
        let tx = compile_transaction(
            &[system::transfer(&payer.pubkey(), &key(7), 42)],
            &payer.pubkey(),
            &[0x99; 32],
        )
        .unwrap();
        let wire = sign_transaction(&tx, &[&payer]).unwrap();

        let id = transaction_id(&wire).unwrap();
        assert_eq!(id, bs58::encode(&wire[1..65]).into_string());
    }

    #[test]
    fn transaction_id_rejects_truncated_wire() {
        assert!(transaction_id(&[0x01, 0x00]).is_err());
        assert!(transaction_id(&[0x00]).is_err());
    }
}
