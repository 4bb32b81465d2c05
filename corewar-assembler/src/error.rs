//! Error types for the Corewar assembler.

use thiserror::Error;

use corewar_spec::SpecError;

/// Assembler error types.
#[derive(Debug, Error)]
pub enum AssemblerError {
    /// Lexical error, terminal for the token stream
    #[error("[{line}:{pos}]: {message}")]
    LexError {
        line: usize,
        pos: usize,
        message: String,
    },

    /// Invalid syntax
    #[error("syntax error at line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    /// Mnemonic not in the opcode table
    #[error("unknown instruction {name:?} at line {line}")]
    UnknownInstruction { line: usize, name: String },

    /// Label defined twice
    #[error("duplicate label {label:?} at line {line}")]
    DuplicateLabel { line: usize, label: String },

    /// Comma immediately before end of line
    #[error("unexpected comma at the end of instruction at line {line}")]
    TrailingComma { line: usize },

    /// Instruction failed arity or type-mask validation
    #[error("invalid instruction at line {line}: {source}")]
    InvalidInstruction { line: usize, source: SpecError },

    /// Label reference with no matching definition (second encoding pass)
    #[error("unknown label {label:?}")]
    UnknownLabel { label: String },

    /// `.code` used before `.extend` (strict mode)
    #[error(".extend must be set to use .code directive")]
    CodeWithoutExtend,

    /// `.code` token with more than two hex digits
    #[error("code directive hex {token:?} is too long")]
    CodeHexTooLong { token: String },

    /// `.code` token that is not hex
    #[error("failed to parse code directive hex {token:?}")]
    CodeHexInvalid { token: String },

    /// `.name` directive missing
    #[error("missing program name")]
    MissingName,

    /// Core format error
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for assembler operations.
pub type Result<T> = std::result::Result<T, AssemblerError>;
