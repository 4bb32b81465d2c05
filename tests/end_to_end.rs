//! End-to-end tests for the Corewar toolchain.
//!
//! These drive the complete workflow: assemble champion source, load the
//! images into the VM, pump rounds, and watch the event stream.

use corewar::asm::compile;
use corewar::spec::header::header_struct_size;
use corewar::vm::{EventKind, Machine, PlayerConfig, RoundOutcome, VmConfig};

#[test]
fn test_reference_bytes_live_zjmp() {
    let (image, _) = compile(
        ".name \"zork\"\n.comment \"x\"\nlive: live %1\nzjmp %:live\n",
        true,
    )
    .unwrap();
    let (header_size, ..) = header_struct_size();
    assert_eq!(
        &image[header_size..],
        &[0x01, 0x00, 0x00, 0x00, 0x01, 0x09, 0xFF, 0xFB]
    );
}

#[test]
fn test_reference_bytes_sti() {
    let (image, _) = compile(".name \"a\"\nl: sti r1,%:l,%1\nand r1,%0,r1\n", true).unwrap();
    let (header_size, ..) = header_struct_size();
    assert_eq!(
        &image[header_size..header_size + 7],
        &[0x0B, 0x68, 0x01, 0x00, 0x00, 0x00, 0x01]
    );
}

#[test]
fn test_single_champion_first_rounds() {
    // A lone five-byte live champion at offset 0.
    let (image, _) = compile(".name \"solo\"\nlive %1\n", true).unwrap();
    let (mut machine, events) = Machine::new(
        VmConfig::default(),
        vec![PlayerConfig {
            number: 1,
            data: image,
        }],
    )
    .unwrap();

    // Round one buffers the live and pays its 10 cycles up front.
    assert_eq!(machine.round(), RoundOutcome::Continue);
    assert_eq!(machine.cur_cycles_to_die(), 1536 - 10);
    assert_eq!(machine.cycle(), 10);

    // Round two executes it: the window counter moves and pc lands after
    // the instruction.
    assert_eq!(machine.round(), RoundOutcome::Continue);
    assert_eq!(machine.live_calls_window(), 1);
    assert_eq!(machine.processes[0].pc, 5);

    let kinds: Vec<EventKind> = events.try_iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::Live));
}

#[test]
fn test_compile_load_fight() {
    // Two real champions; the silent one dies, the shouting one wins.
    let loud = compile(
        ".name \"loud\"\nl: ld %0, r2\nlive %1\nzjmp %:l\n",
        true,
    )
    .unwrap()
    .0;
    let quiet = compile(".name \"quiet\"\nl: ld %0, r2\nzjmp %:l\n", true)
        .unwrap()
        .0;

    let config = VmConfig {
        cycles_to_die: 120,
        ..VmConfig::default()
    };
    let (mut machine, events) = Machine::new(
        config,
        vec![
            PlayerConfig {
                number: 1,
                data: loud,
            },
            PlayerConfig {
                number: 2,
                data: quiet,
            },
        ],
    )
    .unwrap();

    let mut saw_dead = false;
    let mut verdict = None;
    for _ in 0..10_000 {
        let outcome = machine.round();
        for event in events.try_iter() {
            match event.kind {
                EventKind::Dead => {
                    saw_dead = true;
                    assert_eq!(event.source.unwrap().player, 2);
                }
                EventKind::GameOver => verdict = Some(event.message.clone()),
                _ => {}
            }
        }
        if outcome == RoundOutcome::GameOver {
            break;
        }
    }

    assert!(saw_dead, "no Dead event for the quiet player");
    let verdict = verdict.expect("no GameOver event");
    assert!(verdict.contains("player 1"), "{verdict}");
}

#[test]
fn test_decoded_champion_fights_like_the_original() {
    // Disassemble a champion, reassemble the dump, and check the rebuilt
    // image is accepted by the VM loader all the same.
    let source = ".name \"copy\"\nl: ld %0, r2\nlive %1\nzjmp %:l\n";
    let (image, _) = compile(source, true).unwrap();
    let program = corewar::disasm::disassemble(&image, None, true).unwrap();
    let rebuilt = compile(&corewar::disasm::format_program(&program.nodes), true)
        .unwrap()
        .0;
    assert_eq!(image, rebuilt);

    let (mut machine, events) = Machine::new(
        VmConfig::default(),
        vec![PlayerConfig {
            number: 1,
            data: rebuilt,
        }],
    )
    .unwrap();
    let mut lives = 0;
    for _ in 0..10 {
        machine.round();
        lives += events.try_iter().filter(|e| e.kind == EventKind::Live).count();
    }
    assert!(lives > 0);
}
