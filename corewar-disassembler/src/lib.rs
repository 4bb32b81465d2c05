//! # Corewar Disassembler
//!
//! Decode binary champion images back into source form.
//!
//! The per-instruction decoder is also what the VM runs at execution time;
//! the program-level entry points add header handling, raw-code recovery and
//! an optional known-sources reconciliation pass.
//!
//! ## Example
//!
//! ```rust
//! use corewar_assembler::compile;
//! use corewar_disassembler::{disassemble, format_program};
//!
//! let (image, _) = compile(".name \"zork\"\nlive %1\n", true).unwrap();
//! let program = disassemble(&image, None, true).unwrap();
//! let source = format_program(&program.nodes);
//! assert!(source.contains("live    %1"));
//! ```

pub mod decoder;
pub mod disassembler;
pub mod error;
pub mod formatter;

pub use decoder::decode_instruction;
pub use disassembler::{decode_program, disassemble};
pub use error::{DisassemblerError, Result};
pub use formatter::{format_instruction, format_program};
