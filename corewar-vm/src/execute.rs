//! The 16 opcode implementations.
//!
//! Dispatch goes through a 17-entry table indexed by the opcode byte; the
//! long variants share their short implementation and differ only on the
//! index-modulo step. Champion mistakes are never fatal: an instruction with
//! invalid operands is discarded and the pc advances past it.

use corewar_spec::{Instruction, Parameter, ParamType, REGISTER_COUNT};

use crate::event::EventKind;
use crate::process::Process;
use crate::vm::Machine;

type OpFn = fn(&mut Machine, usize, &Instruction) -> bool;

/// Per-opcode handlers, indexed by opcode byte.
const OPS: [OpFn; 17] = [
    op_noop, // 0x00
    op_live, // 0x01
    op_ld,   // 0x02
    op_st,   // 0x03
    op_add,  // 0x04
    op_sub,  // 0x05
    op_and,  // 0x06
    op_or,   // 0x07
    op_xor,  // 0x08
    op_zjmp, // 0x09
    op_ldi,  // 0x0a
    op_sti,  // 0x0b
    op_fork, // 0x0c
    op_ld,   // 0x0d lld
    op_ldi,  // 0x0e lldi
    op_fork, // 0x0f lfork
    op_aff,  // 0x10
];

impl Machine {
    /// Execute one instruction for the process at `idx`.
    ///
    /// Returns true when the pc should advance past the instruction, false
    /// when the opcode moved it itself (zjmp).
    pub(crate) fn exec(&mut self, idx: usize, ins: &Instruction) -> bool {
        // Invalid register operands discard the whole instruction; the pc
        // still advances.
        for param in &ins.params {
            if param.typ == ParamType::Register {
                let n = value_of(param);
                if n < 1 || n > REGISTER_COUNT as i64 {
                    return true;
                }
            }
        }

        self.send_from(idx, EventKind::Debug, format!("executing {ins}"));
        OPS[ins.op.code as usize](self, idx, ins)
    }

    fn idx_mod(&self) -> i64 {
        self.config.idx_mod as i64
    }
}

/// Decoded operand value. The decoder always resolves, so this cannot fail
/// for instructions coming out of the arena.
fn value_of(param: &Parameter) -> i64 {
    param.value().unwrap_or(0)
}

fn ids(process: &Process) -> (u32, u32) {
    (process.id, process.player)
}

fn op_noop(_m: &mut Machine, _idx: usize, _ins: &Instruction) -> bool {
    true
}

/// Declare a player alive. The window counter moves even when the target
/// player is invalid or dead.
fn op_live(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    m.bump_live_calls();

    let target = value_of(&ins.params[0]);
    let found = m
        .players
        .iter()
        .position(|p| p.number as i64 == target && !p.dead);
    match found {
        Some(i) => {
            m.players[i].total_lives += 1;
            m.players[i].current_lives += 1;
            let message = format!(
                "Player {} ({}) is alive",
                m.players[i].number, m.players[i].name
            );
            m.send_from(idx, EventKind::Live, message);
        }
        None => {
            let caller = &m.processes[idx];
            let message = format!(
                "Missed 'live' from {} ({})",
                caller.player,
                m.player_name(caller.player)
            );
            m.send_from(idx, EventKind::LiveMiss, message);
        }
    }
    true
}

/// Load the first operand into a register and set the carry. The long
/// variant skips the index modulo.
fn op_ld(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    let long = ins.op.code == 0x0d;
    let r = value_of(&ins.params[1]);

    let value = if ins.params[0].typ == ParamType::Direct {
        let value = value_of(&ins.params[0]) as u32;
        m.send_from(
            idx,
            EventKind::Debug,
            format!("LD direct {value:#06x} into r{r}"),
        );
        value
    } else {
        let (pid, player) = ids(&m.processes[idx]);
        let mut offset = value_of(&ins.params[0]);
        if !long {
            offset %= m.idx_mod();
        }
        let addr = m.processes[idx].pc as i64 + offset;
        let value = m.arena.read_u32(addr, pid, player);
        m.send_from(
            idx,
            EventKind::Debug,
            format!("LD ram {offset} ({value:#06x}) into r{r}"),
        );
        value
    };

    let process = &mut m.processes[idx];
    process.set_reg(r, value);
    process.carry = value == 0;
    true
}

/// Store a register, either into another register or into the arena.
fn op_st(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    let source = m.processes[idx].reg(value_of(&ins.params[0]));

    if ins.params[1].typ == ParamType::Register {
        let r = value_of(&ins.params[1]);
        m.processes[idx].set_reg(r, source);
        m.send_from(
            idx,
            EventKind::Debug,
            format!("ST r{} ({source:#06x}) into r{r}", value_of(&ins.params[0])),
        );
        return true;
    }

    let (pid, player) = ids(&m.processes[idx]);
    let offset = value_of(&ins.params[1]) % m.idx_mod();
    let addr = m.processes[idx].pc as i64 + offset;
    m.arena.write_u32(addr, source, pid, player);
    m.send_from(
        idx,
        EventKind::Debug,
        format!("ST r{} ({source:#06x}) into ram {offset}", value_of(&ins.params[0])),
    );
    true
}

/// Operand for the arithmetic and bitwise family: registers by content,
/// directs by value, indirects through the arena at pc + n % idx_mod.
fn math_source(m: &mut Machine, idx: usize, param: &Parameter) -> i64 {
    match param.typ {
        ParamType::Register => m.processes[idx].reg(value_of(param)) as i64,
        ParamType::Direct => value_of(param),
        _ => {
            let (pid, player) = ids(&m.processes[idx]);
            let addr = m.processes[idx].pc as i64 + value_of(param) % m.idx_mod();
            m.arena.read_u32(addr, pid, player) as i64
        }
    }
}

fn math_op(m: &mut Machine, idx: usize, ins: &Instruction, op: fn(i64, i64) -> i64) -> bool {
    let target = value_of(&ins.params[2]);
    let a = math_source(m, idx, &ins.params[0]);
    let b = math_source(m, idx, &ins.params[1]);
    let result = op(a, b) as u32;

    let process = &mut m.processes[idx];
    process.set_reg(target, result);
    process.carry = result == 0;
    true
}

fn op_add(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    math_op(m, idx, ins, |a, b| a.wrapping_add(b))
}

fn op_sub(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    math_op(m, idx, ins, |a, b| a.wrapping_sub(b))
}

fn op_and(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    math_op(m, idx, ins, |a, b| a & b)
}

fn op_or(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    math_op(m, idx, ins, |a, b| a | b)
}

fn op_xor(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    math_op(m, idx, ins, |a, b| a ^ b)
}

/// Jump to pc + n % idx_mod when the carry is set.
fn op_zjmp(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    if !m.processes[idx].carry {
        return true;
    }
    let offset = (value_of(&ins.params[0]) as i16 as i64) % m.idx_mod();
    let mem = m.arena.len() as i64;
    let process = &mut m.processes[idx];
    process.pc = (process.pc as i64 + offset).rem_euclid(mem) as u32;
    false
}

/// Operand resolved as a signed 16-bit index for the ldi/sti family.
fn index_source(m: &mut Machine, idx: usize, param: &Parameter, long: bool) -> i16 {
    match param.typ {
        ParamType::Register => m.processes[idx].reg(value_of(param)) as i16,
        ParamType::Direct => value_of(param) as i16,
        _ => {
            let (pid, player) = ids(&m.processes[idx]);
            let mut offset = value_of(param) as i16 as i64;
            if !long {
                offset %= m.idx_mod();
            }
            let addr = m.processes[idx].pc as i64 + offset;
            m.arena.read_u16(addr, pid, player) as i16
        }
    }
}

/// Load from pc + (a + b) % idx_mod. The long variant skips the modulo.
fn op_ldi(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    let long = ins.op.code == 0x0e;
    let target = value_of(&ins.params[2]);

    let a = index_source(m, idx, &ins.params[0], long);
    let b = match ins.params[1].typ {
        ParamType::Register => m.processes[idx].reg(value_of(&ins.params[1])) as i16,
        _ => value_of(&ins.params[1]) as i16,
    };

    let mut sum = a.wrapping_add(b) as i64;
    if !long {
        sum %= m.idx_mod();
    }
    let (pid, player) = ids(&m.processes[idx]);
    let addr = m.processes[idx].pc as i64 + sum;
    let value = m.arena.read_u32(addr, pid, player);

    let process = &mut m.processes[idx];
    process.set_reg(target, value);
    process.carry = value == 0;
    true
}

/// Store a register at pc + (a + b) % idx_mod.
fn op_sti(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    let source = m.processes[idx].reg(value_of(&ins.params[0]));

    let a = index_source(m, idx, &ins.params[1], false);
    let b = match ins.params[2].typ {
        ParamType::Register => m.processes[idx].reg(value_of(&ins.params[2])) as i16,
        _ => value_of(&ins.params[2]) as i16,
    };

    let sum = a.wrapping_add(b) as i64 % m.idx_mod();
    let (pid, player) = ids(&m.processes[idx]);
    let addr = m.processes[idx].pc as i64 + sum;
    m.send_from(
        idx,
        EventKind::Debug,
        format!("STI r{} ({source:#06x}) at ram {sum}", value_of(&ins.params[0])),
    );
    m.arena.write_u32(addr, source, pid, player);
    true
}

/// Spawn a child at pc + n % idx_mod, cloning registers and carry. The long
/// variant skips the modulo.
fn op_fork(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    let long = ins.op.code == 0x0f;
    let mut offset = value_of(&ins.params[0]) as i16 as i64;
    if !long {
        offset %= m.idx_mod();
    }

    let mem = m.arena.len() as i64;
    let mut child = m.processes[idx].clone();
    child.cur_instruction = None;
    child.wait_cycles = 0;
    child.pc = (child.pc as i64 + offset).rem_euclid(mem) as u32;
    child.id = m.take_pid();

    let message = format!("Forking process {} to {}", m.processes[idx].id, child.id);
    m.send_from(idx, EventKind::Debug, message);

    let player = child.player;
    m.processes.push(child);
    if let Some(p) = m.players.iter_mut().find(|p| p.number == player) {
        p.process_count += 1;
    }
    true
}

/// Display the low byte of a register.
fn op_aff(m: &mut Machine, idx: usize, ins: &Instruction) -> bool {
    let r = value_of(&ins.params[0]);
    let byte = (m.processes[idx].reg(r) % 256) as u8;
    m.send_from(idx, EventKind::Display, (byte as char).to_string());
    true
}
