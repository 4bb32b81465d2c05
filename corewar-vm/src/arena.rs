//! The circular memory arena.
//!
//! A fixed-size circular byte array with per-cell provenance: every touched
//! cell remembers the process that last wrote or read it and the kind of
//! access, for observers only. Multi-byte accesses wrap byte by byte and use
//! big-endian order.

use serde::Serialize;

/// How a cell was last touched. Only used for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AccessKind {
    #[default]
    None,
    Written,
    Read32,
    Read16,
}

/// One byte of the arena with its provenance.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Cell {
    pub value: u8,
    /// Process that last touched the cell.
    pub owner: Option<u32>,
    /// That process's player, for coloring in viewers.
    pub player: Option<u32>,
    pub access: AccessKind,
}

/// Fixed-size circular byte array.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Arena {
    cells: Vec<Cell>,
}

impl Arena {
    pub fn new(size: usize) -> Self {
        Arena {
            cells: vec![Cell::default(); size],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, addr: i64) -> usize {
        addr.rem_euclid(self.cells.len() as i64) as usize
    }

    pub fn cell(&self, addr: i64) -> &Cell {
        &self.cells[self.index(addr)]
    }

    /// Copy `size` bytes starting at `addr` without recording any access,
    /// used for the decode lookahead.
    pub fn bytes(&self, addr: i64, size: usize) -> Vec<u8> {
        (0..size)
            .map(|i| self.cells[self.index(addr + i as i64)].value)
            .collect()
    }

    /// Copy a program body into place at load time. The cells take the
    /// owning process but no access tag.
    pub fn load(&mut self, addr: i64, data: &[u8], pid: u32, player: u32) {
        for (i, &byte) in data.iter().enumerate() {
            let idx = self.index(addr + i as i64);
            self.cells[idx] = Cell {
                value: byte,
                owner: Some(pid),
                player: Some(player),
                access: AccessKind::None,
            };
        }
    }

    pub fn read_u32(&mut self, addr: i64, pid: u32, player: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let idx = self.index(addr + i as i64);
            *byte = self.cells[idx].value;
            self.cells[idx].owner = Some(pid);
            self.cells[idx].player = Some(player);
            self.cells[idx].access = AccessKind::Read32;
        }
        u32::from_be_bytes(bytes)
    }

    pub fn read_u16(&mut self, addr: i64, pid: u32, player: u32) -> u16 {
        let mut bytes = [0u8; 2];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let idx = self.index(addr + i as i64);
            *byte = self.cells[idx].value;
            self.cells[idx].owner = Some(pid);
            self.cells[idx].player = Some(player);
            self.cells[idx].access = AccessKind::Read16;
        }
        u16::from_be_bytes(bytes)
    }

    pub fn write_u32(&mut self, addr: i64, value: u32, pid: u32, player: u32) {
        for (i, byte) in value.to_be_bytes().iter().enumerate() {
            let idx = self.index(addr + i as i64);
            self.cells[idx] = Cell {
                value: *byte,
                owner: Some(pid),
                player: Some(player),
                access: AccessKind::Written,
            };
        }
    }
}
