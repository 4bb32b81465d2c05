//! Match configuration.

use corewar_spec::{CYCLES_TO_DIE, CYCLE_DELTA, IDX_MOD, MEM_SIZE, NUM_LIVES};

/// VM tuning parameters.
///
/// Defaults match the canonical deployment; alternative arenas (6144 bytes,
/// 40 lives, delta 5) are a configuration away rather than a rebuild.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Size of the memory.
    pub mem_size: usize,
    /// Index modulo, i.e. how far a short reference can go in the memory.
    pub idx_mod: usize,
    /// Window within which players need to say they are alive.
    pub cycles_to_die: i64,
    /// How many cycles to remove from the window once `num_lives` is reached.
    pub cycle_delta: i64,
    /// Number of `live` calls before updating the window.
    pub num_lives: u32,
    /// Promote loader warnings to errors.
    pub strict: bool,
    /// Bounded depth of the event channel; the VM blocks when it is full.
    pub event_capacity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            mem_size: MEM_SIZE,
            idx_mod: IDX_MOD,
            cycles_to_die: CYCLES_TO_DIE as i64,
            cycle_delta: CYCLE_DELTA as i64,
            num_lives: NUM_LIVES,
            strict: false,
            event_capacity: 64,
        }
    }
}

/// One champion to load: its player number and full binary image.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub number: u32,
    pub data: Vec<u8>,
}
