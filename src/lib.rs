//! # Corewar
//!
//! The Corewar tournament platform: champions written in a small assembly
//! language compete inside a shared circular memory arena, overwriting and
//! starving each other while periodically proving they are alive.
//!
//! This crate re-exports the three cores:
//!
//! - [`asm`]: lexer, parser and two-pass encoder producing binary images.
//! - [`disasm`]: instruction/program decoding, pretty-printing, and
//!   known-sources reconciliation.
//! - [`vm`]: the cycle-driven multi-process machine and its event stream.
//!
//! The shared constants, opcode table and binary format live in [`spec`].
//!
//! ## Example
//!
//! ```rust
//! use corewar::asm::compile;
//! use corewar::vm::{Machine, PlayerConfig, VmConfig};
//!
//! let (image, _) = compile(".name \"zork\"\nlive %1\n", true).unwrap();
//! let (mut machine, events) = Machine::new(
//!     VmConfig::default(),
//!     vec![PlayerConfig { number: 1, data: image }],
//! )
//! .unwrap();
//! machine.round();
//! assert!(events.try_iter().count() > 0);
//! ```

pub use corewar_assembler as asm;
pub use corewar_disassembler as disasm;
pub use corewar_spec as spec;
pub use corewar_vm as vm;
