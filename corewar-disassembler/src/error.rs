//! Error types for the Corewar disassembler.

use thiserror::Error;

use corewar_assembler::AssemblerError;
use corewar_spec::SpecError;

/// Disassembler error types.
#[derive(Debug, Error)]
pub enum DisassemblerError {
    /// Nothing to decode
    #[error("empty buffer")]
    EmptyBuffer,

    /// Opcode byte outside the table. The program decoder skips over these
    /// one byte at a time, they usually come from a raw `.code` region.
    #[error("invalid instruction 0x{0:02x}: invalid opcode")]
    InvalidOpcode(u8),

    /// Too few bytes for the encoding byte or the parameters
    #[error("invalid instruction {opcode:?}, missing {what}")]
    Truncated {
        opcode: &'static str,
        what: &'static str,
    },

    /// Encoding byte with an empty pair where a parameter is declared
    #[error("invalid encoding byte {byte:#04x} for {opcode:?}")]
    InvalidEncodingByte { byte: u8, opcode: &'static str },

    /// Encoding byte describes a type the opcode does not permit
    #[error("invalid parameter {index} type {found} for {opcode:?}, expected {expected}")]
    DisallowedType {
        index: usize,
        found: String,
        expected: String,
        opcode: &'static str,
    },

    /// Binary larger than the arena
    #[error("program size {size} exceeds memory size {mem_size}")]
    ProgramTooLarge { size: usize, mem_size: usize },

    /// Header error
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Re-assembly failure during reconciliation
    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for disassembler operations.
pub type Result<T> = std::result::Result<T, DisassemblerError>;
