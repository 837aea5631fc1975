use chip86_backend::{Emitter, Reg64, Reg8, RegAllocator, REG_INDEX, REG_RET, REG_STATE, REG_TMP};
use chip86_core::StateLayout;

fn alloc() -> (RegAllocator, Emitter) {
    let layout = StateLayout::new();
    (RegAllocator::new(layout.v, layout.i), Emitter::new())
}

fn v_disp(guest: usize) -> i32 {
    StateLayout::new().v + guest as i32
}

#[test]
fn fresh_state() {
    let (regs, _) = alloc();
    assert_eq!(regs.free_byte_slots(), 8);
    assert!(!regs.is_allocated_index());
    assert_eq!(regs.temp_register(), REG_RET);
}

#[test]
fn scan_order_prefers_a_pair() {
    let (mut regs, mut asm) = alloc();
    let seq: Vec<Reg8> = (0..8)
        .map(|g| regs.alloc_byte(&mut asm, g, false))
        .collect();
    assert_eq!(
        seq,
        vec![
            Reg8::Ah,
            Reg8::Al,
            Reg8::Ch,
            Reg8::Cl,
            Reg8::Dh,
            Reg8::Dl,
            Reg8::Bh,
            Reg8::Bl,
        ]
    );
    assert_eq!(regs.free_byte_slots(), 0);
}

#[test]
fn hit_returns_same_register_without_code() {
    let (mut regs, mut asm) = alloc();
    let r = regs.alloc_byte(&mut asm, 3, true);
    let before = asm.len();
    let again = regs.alloc_byte(&mut asm, 3, true);
    assert_eq!(r, again);
    assert_eq!(asm.len(), before, "a hit emits no code");
}

#[test]
fn free_slot_accounting() {
    let (mut regs, mut asm) = alloc();
    for g in 0..5 {
        regs.alloc_byte(&mut asm, g, false);
    }
    assert_eq!(regs.free_byte_slots(), 3);
    let r = regs.host_of_guest(2).unwrap();
    regs.dealloc_byte(&mut asm, r);
    assert_eq!(regs.free_byte_slots(), 4);
    assert!(!regs.is_allocated_guest(2));
}

#[test]
fn eviction_picks_oldest() {
    let (mut regs, mut asm) = alloc();
    for g in 0..8 {
        regs.alloc_byte(&mut asm, g, false);
    }
    // Guest 0 went in first, so its slot has the highest age.
    let victim_host = regs.host_of_guest(0).unwrap();
    let r = regs.alloc_byte(&mut asm, 8, false);
    assert_eq!(r, victim_host);
    assert!(!regs.is_allocated_guest(0));
    for g in 1..9 {
        assert!(regs.is_allocated_guest(g));
    }
    assert_eq!(regs.free_byte_slots(), 0);
}

#[test]
fn touching_resets_age() {
    let (mut regs, mut asm) = alloc();
    for g in 0..8 {
        regs.alloc_byte(&mut asm, g, false);
    }
    // Re-touch guest 0; guest 1 becomes the eviction victim.
    regs.alloc_byte(&mut asm, 0, false);
    regs.alloc_byte(&mut asm, 8, false);
    assert!(regs.is_allocated_guest(0));
    assert!(!regs.is_allocated_guest(1));
}

#[test]
fn eviction_writes_back_modified_value() {
    let (mut regs, mut asm) = alloc();
    let r0 = regs.alloc_byte(&mut asm, 0, false);
    regs.mark_modified(r0);
    for g in 1..8 {
        regs.alloc_byte(&mut asm, g, false);
    }
    let before = asm.len();
    regs.alloc_byte(&mut asm, 8, false);

    let mut expected = Emitter::new();
    expected.mov_m8r8_d(REG_STATE, r0, v_disp(0));
    assert_eq!(&asm.code()[before..], expected.code());
}

#[test]
fn save_registers_flushes_once() {
    let (mut regs, mut asm) = alloc();
    let r1 = regs.alloc_byte(&mut asm, 1, false);
    let r2 = regs.alloc_byte(&mut asm, 2, false);
    regs.mark_modified(r1);
    regs.mark_modified(r2);

    let before = asm.len();
    regs.save_registers(&mut asm);
    assert!(asm.len() > before);
    assert!(regs.is_allocated_guest(1), "save keeps allocations live");

    let after = asm.len();
    regs.save_registers(&mut asm);
    assert_eq!(asm.len(), after, "second save has nothing to write");
}

#[test]
fn forced_placement_moves_into_free_target() {
    let (mut regs, mut asm) = alloc();
    let src = regs.alloc_byte(&mut asm, 5, true);
    assert_ne!(src, Reg8::Bl);
    let r = regs.alloc_byte_into(&mut asm, Reg8::Bl, 5, true);
    assert_eq!(r, Reg8::Bl);
    assert_eq!(regs.host_of_guest(5), Some(Reg8::Bl));
    assert!(!regs.is_allocated_host(src));
}

#[test]
fn forced_placement_swaps_occupied_target() {
    let (mut regs, mut asm) = alloc();
    regs.alloc_byte(&mut asm, 1, true); // ah
    regs.alloc_byte(&mut asm, 2, true); // al
    let before = asm.len();
    let r = regs.alloc_byte_into(&mut asm, Reg8::Al, 1, true);
    assert_eq!(r, Reg8::Al);
    assert_eq!(regs.host_of_guest(1), Some(Reg8::Al));
    assert_eq!(regs.host_of_guest(2), Some(Reg8::Ah));

    let mut expected = Emitter::new();
    expected.xchg_r8r8(Reg8::Al, Reg8::Ah);
    assert_eq!(&asm.code()[before..], expected.code());
}

#[test]
fn forced_placement_is_idempotent() {
    let (mut regs, mut asm) = alloc();
    regs.alloc_byte_into(&mut asm, Reg8::Dl, 7, true);
    let before = asm.len();
    regs.alloc_byte_into(&mut asm, Reg8::Dl, 7, true);
    assert_eq!(asm.len(), before);
}

#[test]
fn realloc_requires_live_source_and_free_target() {
    let (mut regs, mut asm) = alloc();
    assert!(!regs.realloc_byte(&mut asm, Reg8::Al, Reg8::Bl));
    let r = regs.alloc_byte(&mut asm, 4, true);
    assert!(regs.realloc_byte(&mut asm, r, Reg8::Bl));
    assert_eq!(regs.host_of_guest(4), Some(Reg8::Bl));
    assert!(!regs.realloc_byte(&mut asm, Reg8::Bl, Reg8::Bl));
}

#[test]
fn dirty_pushes_once_and_pops_reversed() {
    let (mut regs, mut asm) = alloc();
    regs.dirty64(&mut asm, Reg64::Rbx);
    regs.dirty64(&mut asm, Reg64::Rcx);
    regs.dirty64(&mut asm, Reg64::Rbx);
    assert_eq!(asm.code(), &[0x53, 0x51], "push rbx, push rcx, no repeat");
    assert!(regs.is_dirty(Reg64::Rbx));

    let before = asm.len();
    regs.restore_dirty(&mut asm);
    assert_eq!(&asm.code()[before..], &[0x59, 0x5B], "pop rcx, pop rbx");

    // restore_dirty does not consume: a second exit gets the same pops.
    let again = asm.len();
    regs.restore_dirty(&mut asm);
    assert_eq!(&asm.code()[again..], &[0x59, 0x5B]);
}

#[test]
fn return_register_is_never_pushed() {
    let (mut regs, mut asm) = alloc();
    regs.dirty64(&mut asm, REG_RET);
    assert!(asm.is_empty());
    assert!(!regs.is_dirty(REG_RET));
}

#[test]
fn temp_register_avoids_live_a_pair() {
    let (mut regs, mut asm) = alloc();
    assert_eq!(regs.temp_register(), REG_RET);
    regs.alloc_byte(&mut asm, 0, false); // lands in ah
    assert_eq!(regs.temp_register(), REG_TMP);
}

#[test]
fn index_allocation_is_idempotent() {
    let layout = StateLayout::new();
    let (mut regs, mut asm) = alloc();
    let r = regs.alloc_index(&mut asm, true);
    assert_eq!(r, REG_INDEX);
    assert!(regs.is_allocated_index());

    let mut expected = Emitter::new();
    expected.push_r64(REG_INDEX);
    expected.mov_r32md(REG_INDEX, REG_STATE, layout.i);
    assert_eq!(asm.code(), expected.code());

    let before = asm.len();
    regs.alloc_index(&mut asm, true);
    assert_eq!(asm.len(), before);
}

#[test]
fn index_write_back_on_dealloc() {
    let layout = StateLayout::new();
    let (mut regs, mut asm) = alloc();
    regs.alloc_index(&mut asm, false);
    regs.mark_index_modified();
    let before = asm.len();
    regs.dealloc_index(&mut asm);
    assert!(!regs.is_allocated_index());

    let mut expected = Emitter::new();
    expected.mov_m32r32_d(REG_STATE, REG_INDEX, layout.i);
    assert_eq!(&asm.code()[before..], expected.code());
}

#[test]
fn reset_clears_everything() {
    let (mut regs, mut asm) = alloc();
    regs.alloc_byte(&mut asm, 3, true);
    regs.alloc_index(&mut asm, true);
    regs.dirty64(&mut asm, Reg64::Rbx);
    regs.reset();
    assert_eq!(regs.free_byte_slots(), 8);
    assert!(!regs.is_allocated_index());
    assert!(!regs.is_dirty(Reg64::Rbx));
}
