//! End-to-end scenarios: translate real opcode sequences, execute the
//! produced blocks through the cache and check the guest state.
#![cfg(target_arch = "x86_64")]

use chip86_core::chip8::{
    FONT, FONT_GLYPH_SIZE, LCG_INCREMENT, LCG_MULTIPLIER, NEW_FRAME, PIXEL_OFF, PIXEL_ON,
    RES_WIDTH,
};
use chip86_core::Chip8State;
use chip86_exec::TranslationCache;
use chip86_frontend::Translator;

/// Big-endian ROM image from opcode words.
fn rom(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for w in words {
        bytes.extend_from_slice(&w.to_be_bytes());
    }
    bytes
}

fn setup(words: &[u16], seed: u32) -> Box<Chip8State> {
    let mut state = Chip8State::new();
    state.reset_with_seed(seed);
    assert!(state.load_rom(&rom(words)));
    state
}

/// One dispatch tick: execute from the cache, or translate at the
/// miss address and install the produced blocks.
fn tick(
    state: &mut Chip8State,
    translator: &mut Translator,
    cache: &mut TranslationCache,
    opcount: u32,
) {
    let mut pc = state.pc;
    // SAFETY: the state is boxed and outlives the cache.
    if unsafe { cache.execute_n(&mut pc, opcount) } {
        state.pc = pc;
        state.tick_timers();
    } else {
        loop {
            let opcode = state.fetch(pc);
            if !translator.emit(opcode, &mut pc) {
                break;
            }
        }
        while let Some(block) = translator.next_block() {
            let _ = cache.insert(block);
        }
        state.pc = pc;
    }
}

fn run_ticks(state: &mut Chip8State, ticks: u32, opcount: u32) {
    let mut translator = Translator::new(state);
    let mut cache = TranslationCache::new();
    for _ in 0..ticks {
        tick(state, &mut translator, &mut cache, opcount);
    }
}

/// Rust-side LCG step matching the generated CXNN code.
fn lcg_next(seed: u32) -> u32 {
    seed.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT)
}

// -- core scenarios --

#[test]
fn immediate_load_then_add() {
    let mut state = setup(&[0x6A05, 0x7A03, 0x1204], 1);
    run_ticks(&mut state, 4, 2);
    assert_eq!(state.v[0xA], 0x08);
    assert_eq!(state.v[0xF], 0, "7XNN leaves VF alone");
    assert_eq!(state.pc, 0x204);
}

#[test]
fn add_sets_carry() {
    let mut state = setup(&[0x6AF0, 0x6B20, 0x8AB4, 0x1206], 1);
    run_ticks(&mut state, 4, 4);
    assert_eq!(state.v[0xA], 0x10);
    assert_eq!(state.v[0xB], 0x20);
    assert_eq!(state.v[0xF], 1);
    assert_eq!(state.pc, 0x206);
}

#[test]
fn skip_taken() {
    let mut state = setup(&[0x6005, 0x3005, 0x6099, 0x60AA, 0x1208], 1);
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[0], 0xAA, "the 6099 in the shadow was skipped");
    assert_eq!(state.pc, 0x208);
}

#[test]
fn skip_not_taken_runs_shadowed_op() {
    let mut state = setup(&[0x6007, 0x3005, 0x6099, 0x1206], 1);
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[0], 0x99);
    assert_eq!(state.pc, 0x206);
}

#[test]
fn call_and_return() {
    let mut state = setup(&[0x2204, 0x00E0, 0x00EE], 1);
    run_ticks(&mut state, 4, 1);
    assert_eq!(state.pc, 0x202);
    assert_eq!(state.stack[0], 0x202, "2NNN pushed the return address");
    assert_eq!(
        state.sp,
        state.stack.as_ptr() as *mut u32,
        "00EE popped the stack back to its base"
    );
}

#[test]
fn sprite_draw_and_collision() {
    let mut state = setup(&[0xA300, 0x6000, 0x6100, 0xD015, 0x1208], 1);
    state.mem[0x300] = 0xFF;
    run_ticks(&mut state, 2, 5);

    for x in 0..8 {
        assert_eq!(state.screen[0][x], PIXEL_ON);
    }
    assert_eq!(state.screen[0][8], PIXEL_OFF);
    assert_eq!(state.v[0xF], 0, "no collision on a clean screen");
    assert_eq!(state.new_frame, NEW_FRAME);

    // Same draw again: XOR clears every pixel and reports collision.
    state.pc = 0x200;
    run_ticks(&mut state, 2, 5);
    for x in 0..8 {
        assert_eq!(state.screen[0][x], PIXEL_OFF);
    }
    assert_eq!(state.v[0xF], 1);
}

#[test]
fn bcd_write() {
    let mut state = setup(&[0x63EA, 0xA400, 0xF333, 0x1206], 1);
    run_ticks(&mut state, 4, 3);
    assert_eq!(state.v[3], 234);
    assert_eq!(&state.mem[0x400..0x403], &[2, 3, 4]);
    assert_eq!(state.i, 0x400, "FX33 leaves I unchanged");
}

// -- opcode coverage beyond the lettered scenarios --

#[test]
fn shr_sets_flag_from_lsb() {
    let mut state = setup(&[0x6603, 0x8606, 0x1204], 1);
    run_ticks(&mut state, 4, 2);
    assert_eq!(state.v[6], 0x01);
    assert_eq!(state.v[0xF], 1);
}

#[test]
fn shl_sets_flag_from_msb() {
    let mut state = setup(&[0x6E81, 0x8E0E, 0x1204], 1);
    run_ticks(&mut state, 4, 2);
    assert_eq!(state.v[0xE], 0x02);
    assert_eq!(state.v[0xF], 1);
}

#[test]
fn sub_with_borrow_clears_flag() {
    let mut state = setup(&[0x6005, 0x6107, 0x8015, 0x1206], 1);
    run_ticks(&mut state, 4, 3);
    assert_eq!(state.v[0], 0xFE, "5 - 7 wraps");
    assert_eq!(state.v[0xF], 0, "borrow clears VF");
}

#[test]
fn sub_without_borrow_sets_flag() {
    let mut state = setup(&[0x6007, 0x6105, 0x8015, 0x1206], 1);
    run_ticks(&mut state, 4, 3);
    assert_eq!(state.v[0], 2);
    assert_eq!(state.v[0xF], 1);
}

#[test]
fn reverse_sub() {
    let mut state = setup(&[0x6005, 0x6103, 0x8017, 0x1206], 1);
    run_ticks(&mut state, 4, 3);
    assert_eq!(state.v[0], 0xFE, "3 - 5 wraps");
    assert_eq!(state.v[0xF], 0);
    assert_eq!(state.v[1], 3, "VY is untouched");
}

#[test]
fn logic_ops() {
    let mut state = setup(
        &[
            0x60F0, 0x610F, 0x8011, // V0 |= V1 -> FF
            0x62CC, 0x8022, // V0 &= CC -> CC
            0x63AA, 0x8033, // V0 ^= AA -> 66
            0x120E,
        ],
        1,
    );
    run_ticks(&mut state, 4, 7);
    assert_eq!(state.v[0], 0x66);
}

#[test]
fn mov_between_registers() {
    let mut state = setup(&[0x6442, 0x8540, 0x1204], 1);
    run_ticks(&mut state, 4, 2);
    assert_eq!(state.v[5], 0x42);
    assert_eq!(state.v[4], 0x42);
}

#[test]
fn jump_with_offset() {
    // B200 jumps to 0x200 + V0; the landing pad sets V5.
    let mut state = setup(
        &[0x600A, 0xB200, 0x0000, 0x0000, 0x0000, 0x6577, 0x120C],
        1,
    );
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[5], 0x77);
    assert_eq!(state.pc, 0x20C);
}

#[test]
fn random_matches_lcg_oracle() {
    let seed = 0x1234_5678;
    let mut state = setup(&[0xC0FF, 0xC10F, 0x1204], seed);
    run_ticks(&mut state, 4, 3);

    let s1 = lcg_next(seed);
    let s2 = lcg_next(s1);
    assert_eq!(state.v[0], ((s1 >> 24) & 0xFF) as u8);
    assert_eq!(state.v[1], ((s2 >> 24) & 0x0F) as u8);
    assert_eq!(state.seed_rng, s2);
}

#[test]
fn skip_if_key_pressed() {
    let words = [0x6102, 0xE19E, 0x6301, 0x6401, 0x1208];
    let mut state = setup(&words, 1);
    state.keys[2] = 1;
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[3], 0, "shadowed op skipped while key 2 is down");
    assert_eq!(state.v[4], 1);

    let mut state = setup(&words, 1);
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[3], 1, "no key: fall through runs the shadowed op");
    assert_eq!(state.v[4], 1);
}

#[test]
fn skip_if_key_not_pressed() {
    let words = [0x6102, 0xE1A1, 0x6301, 0x6401, 0x1208];
    let mut state = setup(&words, 1);
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[3], 0, "no key: skip taken");

    let mut state = setup(&words, 1);
    state.keys[2] = 1;
    run_ticks(&mut state, 6, 10);
    assert_eq!(state.v[3], 1, "key down: fall through");
}

#[test]
fn wait_for_key_spins_then_stores() {
    let mut state = setup(&[0xF50A, 0x6801, 0x1204], 1);
    let mut translator = Translator::new(&state);
    let mut cache = TranslationCache::new();

    for _ in 0..4 {
        tick(&mut state, &mut translator, &mut cache, 10);
    }
    assert_eq!(state.pc, 0x200, "no key: the block re-enters itself");
    assert_eq!(state.v[5], 0);

    state.keys[7] = 1;
    for _ in 0..4 {
        tick(&mut state, &mut translator, &mut cache, 10);
    }
    assert_eq!(state.v[5], 7, "pressed key index lands in VX");
    assert_eq!(state.v[8], 1, "execution continued past the wait");
}

#[test]
fn timer_moves() {
    let mut state = setup(&[0x6A14, 0xFA15, 0xFB07, 0xFA18, 0x1208], 1);
    run_ticks(&mut state, 2, 4);
    assert_eq!(state.v[0xB], 0x14, "FX07 read the freshly set delay timer");
    // The executing tick decremented both timers once.
    assert_eq!(state.delay_timer, 0x13);
    assert_eq!(state.sound_timer, 0x13);
}

#[test]
fn add_to_index() {
    let mut state = setup(&[0xA123, 0x6405, 0xF41E, 0x1206], 1);
    run_ticks(&mut state, 4, 3);
    assert_eq!(state.i, 0x128);
}

#[test]
fn font_address() {
    let mut state = setup(&[0x6A07, 0xFA29, 0x1204], 1);
    run_ticks(&mut state, 4, 2);
    assert_eq!(state.i, 7 * FONT_GLYPH_SIZE as u32, "glyph 7 sits at 7 * 5");
    assert_eq!(&state.mem[35..40], &FONT[35..40]);
}

#[test]
fn store_registers_to_memory() {
    let mut state = setup(&[0xA300, 0x6011, 0x6122, 0x6233, 0xF255, 0x120A], 1);
    run_ticks(&mut state, 4, 5);
    assert_eq!(&state.mem[0x300..0x303], &[0x11, 0x22, 0x33]);
    assert_eq!(state.i, 0x300, "FX55 leaves I unchanged");
}

#[test]
fn load_registers_from_memory() {
    let mut state = setup(&[0xA310, 0xF265, 0x1204], 1);
    state.mem[0x310..0x313].copy_from_slice(&[9, 8, 7]);
    run_ticks(&mut state, 4, 2);
    assert_eq!(&state.v[0..3], &[9, 8, 7]);
    assert_eq!(state.i, 0x310, "FX65 leaves I unchanged");
}

#[test]
fn store_all_sixteen_registers() {
    // 16 loads overflow the 8-slot pool, then FX55 stores the lot;
    // exercises eviction write-back and the spill fallback path.
    let mut words: Vec<u16> = (0..16)
        .map(|r| 0x6000 | (r << 8) | (0x10 + 3 * r))
        .collect();
    words.push(0xA300);
    words.push(0xFF55);
    words.push(0x1200 + words.len() as u16 * 2);
    let mut state = setup(&words, 1);
    run_ticks(&mut state, 4, words.len() as u32);
    for r in 0..16usize {
        assert_eq!(state.mem[0x300 + r], 0x10 + 3 * r as u8);
        assert_eq!(state.v[r], 0x10 + 3 * r as u8);
    }
    assert_eq!(state.i, 0x300);
}

#[test]
fn register_pressure_commits_all_values() {
    // Twelve distinct registers force evictions mid-block; memory
    // must still match direct interpretation afterwards.
    let mut words: Vec<u16> = (0..12).map(|r| 0x6000 | (r << 8) | (3 * r)).collect();
    words.push(0x1200 + words.len() as u16 * 2);
    let mut state = setup(&words, 1);
    run_ticks(&mut state, 4, words.len() as u32);
    for r in 0..12usize {
        assert_eq!(state.v[r], 3 * r as u8);
    }
}

#[test]
fn clear_screen() {
    let mut state = setup(&[0x00E0, 0x1202], 1);
    state.screen[5][5] = PIXEL_ON;
    state.screen[31][63] = PIXEL_ON;
    run_ticks(&mut state, 4, 2);
    for row in state.screen.iter() {
        assert!(row.iter().all(|&p| p == PIXEL_OFF));
    }
    assert_eq!(state.new_frame, NEW_FRAME);
}

#[test]
fn sprite_wraps_both_axes() {
    let mut state = setup(&[0xA300, 0x603C, 0x611E, 0xD011, 0x1208], 1);
    state.mem[0x300] = 0xFF;
    run_ticks(&mut state, 2, 4);
    // x = 60, y = 30: four pixels at the right edge, four wrapped.
    for x in 60..RES_WIDTH {
        assert_eq!(state.screen[30][x], PIXEL_ON);
    }
    for x in 0..4 {
        assert_eq!(state.screen[30][x], PIXEL_ON);
    }
    assert_eq!(state.screen[30][4], PIXEL_OFF);
    assert_eq!(state.v[0xF], 0);
}

#[test]
fn sprite_with_zero_rows_draws_once() {
    let mut state = setup(&[0xA300, 0x6000, 0x6100, 0xD010, 0x1208], 1);
    state.mem[0x300] = 0xAA;
    run_ticks(&mut state, 2, 4);
    for x in 0..8 {
        let expected = if x % 2 == 0 { PIXEL_ON } else { PIXEL_OFF };
        assert_eq!(state.screen[0][x], expected);
    }
}

#[test]
fn partial_collision_sets_flag_and_xors() {
    let mut state = setup(&[0xA300, 0x6004, 0x6100, 0xD011, 0x1208], 1);
    state.mem[0x300] = 0xF0;
    // Pre-set one pixel the sprite will hit.
    state.screen[0][5] = PIXEL_ON;
    run_ticks(&mut state, 2, 4);
    assert_eq!(state.v[0xF], 1);
    assert_eq!(state.screen[0][4], PIXEL_ON);
    assert_eq!(state.screen[0][5], PIXEL_OFF, "overlap XORed off");
    assert_eq!(state.screen[0][6], PIXEL_ON);
    assert_eq!(state.screen[0][7], PIXEL_ON);
}

#[test]
fn nested_call_chain() {
    // main calls 0x208, which calls 0x20E, returning through both.
    let mut state = setup(
        &[
            0x2208, // 0x200: call first
            0x6B01, // 0x202: after both returns
            0x1206, // 0x204: self-loop (via 0x206)
            0x1206, // 0x206: self-loop
            0x220E, // 0x208: call second
            0x6A01, // 0x20A
            0x00EE, // 0x20C: return to 0x202
            0x00EE, // 0x20E: return to 0x20A
        ],
        1,
    );
    run_ticks(&mut state, 12, 1);
    assert_eq!(state.v[0xA], 1);
    assert_eq!(state.v[0xB], 1);
    assert_eq!(state.pc, 0x206);
    assert_eq!(state.sp, state.stack.as_ptr() as *mut u32);
}

#[test]
fn cache_reuses_translated_blocks() {
    let mut state = setup(&[0x7001, 0x1200], 1);
    let mut translator = Translator::new(&state);
    let mut cache = TranslationCache::new();

    tick(&mut state, &mut translator, &mut cache, 2);
    assert_eq!(cache.len(), 1);
    for _ in 0..5 {
        tick(&mut state, &mut translator, &mut cache, 2);
    }
    assert_eq!(cache.len(), 1, "the loop re-executes one cached block");
    assert_eq!(state.v[0], 5, "each executed tick ran the block once");
}
