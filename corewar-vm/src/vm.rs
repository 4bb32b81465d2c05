//! The match scheduler.
//!
//! Single-threaded and cooperative: one scheduler owns the arena, the
//! process list and the event channel, and advances in rounds. Within a
//! round it visits processes in id order, executing at most one buffered
//! instruction and decoding the next one per process, then jumps the clock
//! forward to the next interesting cycle.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use corewar_disassembler::decode_instruction;
use corewar_spec::header::header_struct_size;
use corewar_spec::{
    ProgramHeader, COREWAR_EXEC_MAGIC, MAX_ARGS_NUMBER, MAX_PLAYERS, REGISTER_SIZE,
};

use crate::arena::Arena;
use crate::config::{PlayerConfig, VmConfig};
use crate::error::{Result, VmError};
use crate::event::{Event, EventKind, EventSource};
use crate::process::{Player, Process};

/// What a round left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Continue,
    /// The match ended; the event stream carries the verdict.
    GameOver,
}

/// A running Corewar match.
#[derive(Debug)]
pub struct Machine {
    pub config: VmConfig,
    pub arena: Arena,
    pub players: Vec<Player>,
    pub processes: Vec<Process>,

    next_pid: u32,
    cycle: i64,
    /// Cycles left in the current liveness window.
    cur_cycles_to_die: i64,
    /// Global `live` count since the window counter last reset.
    live_calls: u32,

    events: SyncSender<Event>,
}

impl Machine {
    /// Load champions and set up a match.
    ///
    /// Players are sorted by number and placed at `(mem_size / n) * i`; each
    /// starts with one process whose r1 holds the player number. The
    /// returned receiver is the event stream; the VM blocks once the
    /// bounded channel fills up, so keep reading from it.
    pub fn new(
        config: VmConfig,
        players: Vec<PlayerConfig>,
    ) -> Result<(Machine, Receiver<Event>)> {
        if players.is_empty() {
            return Err(VmError::NoPlayers);
        }
        if players.len() > MAX_PLAYERS {
            return Err(VmError::TooManyPlayers(players.len()));
        }
        let mut players = players;
        players.sort_by_key(|p| p.number);
        for pair in players.windows(2) {
            if pair[0].number == pair[1].number {
                return Err(VmError::DuplicatePlayerNumber(pair[0].number));
            }
        }

        let (sender, receiver) = sync_channel(config.event_capacity.max(1));
        let mut machine = Machine {
            arena: Arena::new(config.mem_size),
            players: Vec::with_capacity(players.len()),
            processes: Vec::with_capacity(players.len()),
            next_pid: 1,
            cycle: 0,
            cur_cycles_to_die: config.cycles_to_die,
            live_calls: 0,
            events: sender,
            config,
        };
        machine.load_players(&players)?;

        let snapshot = serde_json::to_string(&machine.arena).unwrap_or_default();
        machine.send(EventKind::Dump, None, snapshot);

        Ok((machine, receiver))
    }

    fn load_players(&mut self, configs: &[PlayerConfig]) -> Result<()> {
        let (header_size, ..) = header_struct_size();
        let count = configs.len();

        for (i, cfg) in configs.iter().enumerate() {
            if cfg.data.len() > self.config.mem_size {
                return Err(VmError::ProgramTooLarge {
                    number: cfg.number,
                    size: cfg.data.len(),
                    mem_size: self.config.mem_size,
                });
            }
            let header = ProgramHeader::from_bytes(&cfg.data, self.config.strict)
                .map_err(|source| VmError::InvalidProgram {
                    number: cfg.number,
                    source,
                })?;
            if !self.config.strict {
                if header.magic != COREWAR_EXEC_MAGIC {
                    self.send(
                        EventKind::Warning,
                        None,
                        format!(
                            "player {}: invalid magic number {:#x}",
                            cfg.number, header.magic
                        ),
                    );
                }
                let actual = cfg.data.len() - header_size;
                if header.prog_size as usize != actual {
                    self.send(
                        EventKind::Warning,
                        None,
                        format!(
                            "player {}: header says {} bytes of code, found {}",
                            cfg.number, header.prog_size, actual
                        ),
                    );
                }
            }
            if header.prog_name.is_empty() {
                return Err(VmError::MissingName { number: cfg.number });
            }

            let start = ((self.config.mem_size / count) * i) as u32;
            let pid = self.next_pid;
            self.next_pid += 1;

            self.arena
                .load(start as i64, &cfg.data[header_size..], pid, cfg.number);

            let mut process = Process::new(pid, cfg.number, start);
            // r1 gets initialized to the player number.
            process.registers[0] = cfg.number;
            self.processes.push(process);
            self.players.push(Player::new(cfg.number, header.prog_name));
        }
        Ok(())
    }

    /// Current cycle count.
    pub fn cycle(&self) -> i64 {
        self.cycle
    }

    /// Cycles left before the next liveness check.
    pub fn cur_cycles_to_die(&self) -> i64 {
        self.cur_cycles_to_die
    }

    /// Global `live` calls in the current window.
    pub fn live_calls_window(&self) -> u32 {
        self.live_calls
    }

    pub fn player(&self, number: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.number == number)
    }

    pub(crate) fn player_name(&self, number: u32) -> &str {
        self.player(number).map_or("", |p| p.name.as_str())
    }

    pub(crate) fn bump_live_calls(&mut self) {
        self.live_calls += 1;
    }

    pub(crate) fn take_pid(&mut self) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    pub(crate) fn send(&self, kind: EventKind, source: Option<EventSource>, message: String) {
        // A dropped receiver means the observer cancelled; keep running.
        let _ = self.events.send(Event::new(kind, source, message));
    }

    pub(crate) fn send_from(&self, idx: usize, kind: EventKind, message: String) {
        let process = &self.processes[idx];
        self.send(
            kind,
            Some(EventSource {
                pid: Some(process.id),
                player: process.player,
            }),
            message,
        );
    }

    /// Advance the match by one round.
    ///
    /// Applies the liveness window bookkeeping, gives every live process one
    /// scheduling step, jumps the clock, and emits a memory dump.
    pub fn round(&mut self) -> RoundOutcome {
        // Enough lives in this window: tighten the configured window for the
        // future ones.
        if self.live_calls >= self.config.num_lives {
            self.live_calls = 0;
            self.config.cycles_to_die -= self.config.cycle_delta;
        }

        if self.cur_cycles_to_die <= 0 {
            if let Some(outcome) = self.expire_window() {
                return outcome;
            }
        }

        // Processes spawned during the round run from the next one.
        let visible = self.processes.len();
        for idx in 0..visible {
            self.process_turn(idx);
        }
        self.next_cycle();

        let snapshot = serde_json::to_string(&self.arena).unwrap_or_default();
        self.send(EventKind::Dump, None, snapshot);

        RoundOutcome::Continue
    }

    /// The liveness window expired: bury silent players, then either end
    /// the match or start the next window.
    fn expire_window(&mut self) -> Option<RoundOutcome> {
        let mut died = Vec::new();
        for player in &mut self.players {
            if player.dead {
                continue;
            }
            if player.current_lives == 0 {
                player.dead = true;
                // The process count stays for display; the processes go.
                died.push((player.number, player.name.clone()));
            } else {
                player.current_lives = 0;
            }
        }
        for (number, name) in &died {
            self.processes.retain(|p| p.player != *number);
            self.send(
                EventKind::Dead,
                Some(EventSource {
                    pid: None,
                    player: *number,
                }),
                format!("Player {number} ({name}) died"),
            );
        }

        let alive: Vec<(u32, String)> = self
            .players
            .iter()
            .filter(|p| !p.dead)
            .map(|p| (p.number, p.name.clone()))
            .collect();
        if alive.len() <= 1 {
            let message = match alive.first() {
                Some((number, name)) => {
                    format!("Game over, winner: player {number} ({name})")
                }
                None => "Game over, no players alive".to_string(),
            };
            self.send(EventKind::GameOver, None, message);
            return Some(RoundOutcome::GameOver);
        }

        self.cur_cycles_to_die = self.config.cycles_to_die;
        if self.cur_cycles_to_die <= 0 {
            let names: Vec<String> = alive
                .iter()
                .map(|(number, name)| format!("{number} ({name})"))
                .collect();
            self.send(
                EventKind::GameOver,
                None,
                format!("Game over, tie {} players: {}", names.len(), names.join(",")),
            );
            return Some(RoundOutcome::GameOver);
        }
        None
    }

    /// One scheduling step: execute the buffered instruction if its cost has
    /// been paid, then decode the next one at pc.
    fn process_turn(&mut self, idx: usize) {
        if self.processes[idx].wait_cycles > 0 {
            return;
        }

        let mem = self.arena.len() as u32;
        if let Some(ins) = self.processes[idx].cur_instruction.take() {
            if self.exec(idx, &ins) {
                let process = &mut self.processes[idx];
                process.pc = process.pc.wrapping_add(ins.size as u32) % mem;
            }
        }

        // The longest instruction is 20 bytes: opcode word plus 4 params of
        // 4 bytes each.
        let lookahead = {
            let pc = self.processes[idx].pc as i64;
            self.arena
                .bytes(pc, REGISTER_SIZE + REGISTER_SIZE * MAX_ARGS_NUMBER)
        };
        let process = &mut self.processes[idx];
        match decode_instruction(&lookahead) {
            Ok((ins, _)) => {
                process.wait_cycles = ins.op.cycles as i64;
                process.cur_instruction = Some(ins);
            }
            Err(_) => {
                // Not a valid instruction: treat the byte as a no-op.
                process.pc = (process.pc + 1) % mem;
                process.wait_cycles = 1;
                process.cur_instruction = None;
            }
        }
    }

    /// Jump the clock to the next cycle where something can happen: the next
    /// instruction completion or the window expiry, whichever comes first.
    /// Useful when everyone is waiting on a long instruction like fork.
    fn next_cycle(&mut self) {
        let mut step = self.cur_cycles_to_die;
        for process in &self.processes {
            step = step.min(process.wait_cycles);
        }
        // Always advance at least one cycle.
        if step < 1 {
            step = 1;
        }

        self.cycle += step;
        self.cur_cycles_to_die -= step;
        for process in &mut self.processes {
            process.wait_cycles = (process.wait_cycles - step).max(0);
        }
    }
}
