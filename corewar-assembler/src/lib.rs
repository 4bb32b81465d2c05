//! # Corewar Assembler
//!
//! Compile champion source into the binary image loaded by the VM.
//!
//! ## Example
//!
//! ```rust
//! use corewar_assembler::compile;
//!
//! let source = r#"
//! .name "zork"
//! .comment "just a test"
//!
//! loop:   live %1
//!         zjmp %:loop
//! "#;
//!
//! let (image, _program) = compile(source, true).unwrap();
//! assert_eq!(image.len(), 2192 + 8);
//! ```

pub mod assembler;
pub mod encoder;
pub mod error;
pub mod lexer;
pub mod parser;

pub use assembler::compile;
pub use encoder::encode;
pub use error::{AssemblerError, Result};
pub use parser::{parse, Program};
