//! # Corewar Virtual Machine
//!
//! A cycle-driven multi-process VM over a circular byte arena. Champions
//! fight by overwriting each other while proving they are alive within a
//! sliding window; the scheduler is single-threaded and cooperative, and
//! everything observable leaves through a bounded event channel.
//!
//! ## Example
//!
//! ```rust
//! use corewar_assembler::compile;
//! use corewar_vm::{Machine, PlayerConfig, VmConfig};
//!
//! let (image, _) = compile(".name \"zork\"\nl: live %1\nzjmp %:l\n", true).unwrap();
//! let (mut machine, events) = Machine::new(
//!     VmConfig::default(),
//!     vec![PlayerConfig { number: 1, data: image }],
//! )
//! .unwrap();
//!
//! machine.round();
//! for event in events.try_iter() {
//!     println!("{}: {}", event.kind, event.message);
//! }
//! ```

pub mod arena;
pub mod config;
pub mod error;
pub mod event;
mod execute;
pub mod process;
pub mod vm;

pub use arena::{AccessKind, Arena, Cell};
pub use config::{PlayerConfig, VmConfig};
pub use error::{Result, VmError};
pub use event::{Event, EventKind, EventSource};
pub use process::{Player, Process};
pub use vm::{Machine, RoundOutcome};
