//! Guest machine state.

use std::mem::offset_of;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chip8::*;

/// Complete CHIP-8 machine state.
///
/// Shared with generated host code: every code block addresses these
/// fields as `[base + displacement]` where `base` is the address of
/// this struct at translation time. Allocate it once with
/// [`Chip8State::new`] and never move it while translated blocks are
/// alive.
///
/// `sp` is an indirect pointer into `stack`: `2NNN` writes the return
/// address at `*sp` and bumps it by one slot, `00EE` decrements and
/// reads. `pc`, `delay_timer` and `sound_timer` belong to the dispatch
/// loop; generated code never touches them.
#[repr(C)]
pub struct Chip8State {
    pub mem: [u8; MEM_SIZE],
    pub v: [u8; GPREG_COUNT],
    pub keys: [u8; KEY_COUNT],
    pub screen: [[u8; RES_WIDTH]; RES_HEIGHT],
    pub stack: [u32; STACK_DEPTH],
    pub sp: *mut u32,
    pub i: u32,
    pub seed_rng: u32,
    pub new_frame: u32,
    pub pc: u16,
    pub delay_timer: u8,
    pub sound_timer: u8,
}

impl Chip8State {
    /// Allocate a pinned, reset machine. The RNG is seeded from the
    /// wall clock.
    pub fn new() -> Box<Chip8State> {
        let mut state = Box::new(Chip8State {
            mem: [0; MEM_SIZE],
            v: [0; GPREG_COUNT],
            keys: [0; KEY_COUNT],
            screen: [[0; RES_WIDTH]; RES_HEIGHT],
            stack: [0; STACK_DEPTH],
            sp: std::ptr::null_mut(),
            i: 0,
            seed_rng: 0,
            new_frame: 0,
            pc: 0,
            delay_timer: 0,
            sound_timer: 0,
        });
        state.reset();
        state
    }

    /// Reset to power-on state: PC at 0x200, font in low memory,
    /// stack pointer at the base of the call stack.
    pub fn reset(&mut self) {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        self.reset_with_seed(seed);
    }

    /// Reset with a fixed RNG seed.
    pub fn reset_with_seed(&mut self, seed: u32) {
        self.pc = PC_START;
        self.i = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.new_frame = NO_NEW_FRAME;
        self.seed_rng = seed;
        self.sp = self.stack.as_mut_ptr();
        self.v = [0; GPREG_COUNT];
        self.keys = [0; KEY_COUNT];
        self.screen = [[0; RES_WIDTH]; RES_HEIGHT];
        self.mem[..FONT.len()].copy_from_slice(&FONT);
    }

    /// Copy a ROM image to 0x200. Returns false if it does not fit.
    pub fn load_rom(&mut self, rom: &[u8]) -> bool {
        let start = PC_START as usize;
        if rom.len() > MEM_SIZE - start {
            return false;
        }
        self.mem[start..start + rom.len()].copy_from_slice(rom);
        true
    }

    /// Fetch the big-endian opcode at `pc`.
    pub fn fetch(&self, pc: u16) -> u16 {
        let pc = pc as usize & (MEM_SIZE - 1);
        let hi = self.mem[pc] as u16;
        let lo = self.mem[(pc + 1) & (MEM_SIZE - 1)] as u16;
        (hi << 8) | lo
    }

    /// Decrement the delay and sound timers toward zero. Called by
    /// the dispatch loop, never by generated code.
    pub fn tick_timers(&mut self) {
        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
        }
    }

    /// Base address baked into generated code.
    pub fn base_addr(&self) -> usize {
        self as *const Chip8State as usize
    }
}

/// Field displacements of [`Chip8State`], baked into generated code as
/// `[base + disp]` operands.
#[derive(Debug, Clone, Copy)]
pub struct StateLayout {
    pub mem: i32,
    pub v: i32,
    pub keys: i32,
    pub screen: i32,
    pub sp: i32,
    pub i: i32,
    pub seed_rng: i32,
    pub new_frame: i32,
    pub delay_timer: i32,
    pub sound_timer: i32,
}

impl StateLayout {
    pub const fn new() -> StateLayout {
        StateLayout {
            mem: offset_of!(Chip8State, mem) as i32,
            v: offset_of!(Chip8State, v) as i32,
            keys: offset_of!(Chip8State, keys) as i32,
            screen: offset_of!(Chip8State, screen) as i32,
            sp: offset_of!(Chip8State, sp) as i32,
            i: offset_of!(Chip8State, i) as i32,
            seed_rng: offset_of!(Chip8State, seed_rng) as i32,
            new_frame: offset_of!(Chip8State, new_frame) as i32,
            delay_timer: offset_of!(Chip8State, delay_timer) as i32,
            sound_timer: offset_of!(Chip8State, sound_timer) as i32,
        }
    }
}

impl Default for StateLayout {
    fn default() -> Self {
        Self::new()
    }
}
