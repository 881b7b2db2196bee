//! The interface documents shipped with the SDK.

use crate::error::IdlError;
use crate::schema::ProgramInterface;

pub const STREAM_IDL: &str = include_str!("../idl/zebec.json");
pub const MULTISIG_IDL: &str = include_str!("../idl/serum_multisig.json");
pub const BATCH_TRANSFER_IDL: &str = include_str!("../idl/batch_transfer.json");

/// The three programs the SDK talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Stream,
    Multisig,
    BatchTransfer,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 3] = [
        ProgramKind::Stream,
        ProgramKind::Multisig,
        ProgramKind::BatchTransfer,
    ];
}

/// Parsed interfaces, one per [`ProgramKind`].
#[derive(Debug, Clone)]
pub struct InterfaceRegistry {
    stream: ProgramInterface,
    multisig: ProgramInterface,
    batch_transfer: ProgramInterface,
}

impl InterfaceRegistry {
    pub fn new(
        stream: ProgramInterface,
        multisig: ProgramInterface,
        batch_transfer: ProgramInterface,
    ) -> Self {
        Self {
            stream,
            multisig,
            batch_transfer,
        }
    }

    /// Parse the documents compiled into this crate.
    pub fn embedded() -> Result<Self, IdlError> {
        Ok(Self::new(
            ProgramInterface::from_json(STREAM_IDL)?,
            ProgramInterface::from_json(MULTISIG_IDL)?,
            ProgramInterface::from_json(BATCH_TRANSFER_IDL)?,
        ))
    }

    pub fn get(&self, kind: ProgramKind) -> &ProgramInterface {
        match kind {
            ProgramKind::Stream => &self.stream,
            ProgramKind::Multisig => &self.multisig,
            ProgramKind::BatchTransfer => &self.batch_transfer,
        }
    }

    pub fn stream(&self) -> &ProgramInterface {
        &self.stream
    }

    pub fn multisig(&self) -> &ProgramInterface {
        &self.multisig
    }

    pub fn batch_transfer(&self) -> &ProgramInterface {
        &self.batch_transfer
    }
}
