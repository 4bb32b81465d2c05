//! Error types for the Corewar VM.
//!
//! These only cover match setup: once a match is running, champion mistakes
//! degrade to no-ops instead of failing the VM.

use thiserror::Error;

use corewar_spec::{SpecError, MAX_PLAYERS};

#[derive(Debug, Error)]
pub enum VmError {
    #[error("no players")]
    NoPlayers,

    #[error("too many players: {0}, max {MAX_PLAYERS}")]
    TooManyPlayers(usize),

    #[error("duplicate player number {0}")]
    DuplicatePlayerNumber(u32),

    #[error("player {number}: binary size {size} exceeds memory size {mem_size}")]
    ProgramTooLarge {
        number: u32,
        size: usize,
        mem_size: usize,
    },

    #[error("player {number}: missing program name")]
    MissingName { number: u32 },

    #[error("player {number}: {source}")]
    InvalidProgram { number: u32, source: SpecError },
}

pub type Result<T> = std::result::Result<T, VmError>;
