use chip86_core::Chip8State;
use chip86_frontend::Translator;

/// Drive `emit` from a word list laid out at 0x200, returning the
/// final pc value after the batch completes.
fn feed(translator: &mut Translator, words: &[u16]) -> u16 {
    let mut pc: u16 = 0x200;
    loop {
        let idx = ((pc - 0x200) / 2) as usize;
        let opcode = words[idx];
        if !translator.emit(opcode, &mut pc) {
            return pc;
        }
    }
}

#[test]
fn batch_ends_at_jump_and_rewinds_pc() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);

    let mut pc: u16 = 0x200;
    assert!(translator.emit(0x6A05, &mut pc));
    assert_eq!(pc, 0x202);
    assert!(translator.emit(0x7A03, &mut pc));
    assert_eq!(pc, 0x204);
    assert!(!translator.emit(0x1208, &mut pc));
    assert_eq!(pc, 0x200, "batch completion rewinds to the start");

    let block = translator.next_block().unwrap();
    assert_eq!(block.addr(), 0x200);
    assert_eq!(block.op_count(), 3);
    assert!(block.code_len() > 0);
    assert!(translator.next_block().is_none());
}

#[test]
fn emit_after_ready_keeps_returning_false() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    let mut pc: u16 = 0x200;
    assert!(!translator.emit(0x1200, &mut pc));
    let mut pc2: u16 = 0x999;
    assert!(!translator.emit(0x6000, &mut pc2));
    assert_eq!(pc2, 0x200, "a ready translator only reports the restart pc");
}

#[test]
fn drain_resets_for_next_batch() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);

    let pc = feed(&mut translator, &[0x1200]);
    assert_eq!(pc, 0x200);
    let _ = translator.next_block().unwrap();

    // A fresh batch works after the drain.
    let pc = feed(&mut translator, &[0x6005, 0x1202]);
    assert_eq!(pc, 0x200);
    let block = translator.next_block().unwrap();
    assert_eq!(block.op_count(), 2);
}

#[test]
fn skip_extends_batch_to_branch_destination() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    // skip, shadowed op, destination op: four nodes in one block.
    let pc = feed(&mut translator, &[0x6005, 0x3005, 0x6099, 0x60AA]);
    assert_eq!(pc, 0x200);
    let block = translator.next_block().unwrap();
    assert_eq!(block.op_count(), 4);
    assert!(translator.next_block().is_none());
}

#[test]
fn terminator_inside_shadow_does_not_end_batch() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    let mut pc: u16 = 0x200;
    assert!(translator.emit(0x3005, &mut pc));
    assert!(
        translator.emit(0x1300, &mut pc),
        "a jump in the skip shadow keeps collecting"
    );
    assert!(!translator.emit(0x6001, &mut pc));
    let block = translator.next_block().unwrap();
    assert_eq!(block.op_count(), 3);
}

#[test]
fn wait_for_key_splits_blocks() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    let pc = feed(&mut translator, &[0x6A05, 0xF50A]);
    assert_eq!(pc, 0x200);

    let first = translator.next_block().unwrap();
    assert_eq!(first.addr(), 0x200);
    assert_eq!(first.op_count(), 1);

    let second = translator.next_block().unwrap();
    assert_eq!(second.addr(), 0x202);
    assert_eq!(second.op_count(), 1);

    assert!(translator.next_block().is_none());
}

#[test]
fn wait_for_key_first_gets_one_block() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    let mut pc: u16 = 0x200;
    assert!(!translator.emit(0xF00A, &mut pc));
    let block = translator.next_block().unwrap();
    assert_eq!(block.addr(), 0x200);
    assert_eq!(block.op_count(), 1);
    assert!(translator.next_block().is_none());
}

#[test]
fn unknown_opcode_counts_but_emits_nothing_extra() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    let mut pc: u16 = 0x200;
    assert!(translator.emit(0xF0FF, &mut pc), "unknown opcode continues");
    assert_eq!(pc, 0x202, "pc still advances past an unknown opcode");
    assert!(!translator.emit(0x1204, &mut pc));
    let block = translator.next_block().unwrap();
    assert_eq!(block.op_count(), 2, "ignored nodes still count as ops");
}

#[test]
fn reset_discards_partial_batch() {
    let state = Chip8State::new();
    let mut translator = Translator::new(&state);
    let mut pc: u16 = 0x200;
    assert!(translator.emit(0x6005, &mut pc));
    translator.reset();
    assert!(translator.next_block().is_none());
    let pc = feed(&mut translator, &[0x1200]);
    assert_eq!(pc, 0x200);
    assert!(translator.next_block().is_some());
}
