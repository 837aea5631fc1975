//! Register allocator: CHIP-8 registers onto host byte registers.
//!
//! Tracks which of the eight byte registers holds which guest
//! register, with age-based eviction and lazy write-back: a modified
//! allocation hits memory only on eviction, explicit deallocation or
//! `save_registers`. A separate dirty log pushes each host 64-bit
//! register the first time generated code touches it and replays the
//! pops in reverse before every block exit.
//!
//! The allocator owns no emitter; every operation that generates code
//! takes the emitter as an explicit parameter.

use crate::x86_64::emitter::Emitter;
use crate::x86_64::regs::{Reg64, Reg8, NUM_REG64, NUM_REG8, REG_INDEX, REG_RET, REG_TMP};

/// Per-byte-slot tracking state.
#[derive(Debug, Clone, Copy)]
struct SlotInfo {
    guest: usize,
    age: i32,
    modified: bool,
    free: bool,
}

impl SlotInfo {
    const fn reset() -> SlotInfo {
        SlotInfo {
            guest: 0,
            age: 0,
            modified: false,
            free: true,
        }
    }
}

/// Allocation state of the CHIP-8 I register (held in esi).
#[derive(Debug, Clone, Copy)]
struct IndexInfo {
    modified: bool,
    free: bool,
}

pub struct RegAllocator {
    reg8: [SlotInfo; NUM_REG8],
    index: IndexInfo,
    free_count: usize,

    dirty: [bool; NUM_REG64],
    dirty_order: [Reg64; NUM_REG64],
    dirty_count: usize,

    /// Displacement of V[0] within the guest state.
    v_disp: i32,
    /// Displacement of the I register within the guest state.
    i_disp: i32,
}

impl RegAllocator {
    pub fn new(v_disp: i32, i_disp: i32) -> RegAllocator {
        RegAllocator {
            reg8: [SlotInfo::reset(); NUM_REG8],
            index: IndexInfo {
                modified: false,
                free: true,
            },
            free_count: NUM_REG8,
            dirty: [false; NUM_REG64],
            dirty_order: [Reg64::Rax; NUM_REG64],
            dirty_count: 0,
            v_disp,
            i_disp,
        }
    }

    /// Forget all allocations and dirty state (no code emitted).
    pub fn reset(&mut self) {
        self.reg8 = [SlotInfo::reset(); NUM_REG8];
        self.index = IndexInfo {
            modified: false,
            free: true,
        };
        self.free_count = NUM_REG8;
        self.dirty = [false; NUM_REG64];
        self.dirty_count = 0;
    }

    // -- internal code-generating steps --

    fn reset_slot(&mut self, host: Reg8) {
        self.reg8[host.code() as usize] = SlotInfo::reset();
    }

    /// Write a slot back to V[guest] if it is live and modified.
    fn do_save(&mut self, asm: &mut Emitter, host: Reg8) {
        let slot = self.reg8[host.code() as usize];
        if slot.modified && !slot.free {
            asm.mov_m8r8_d(crate::REG_STATE, host, self.v_disp + slot.guest as i32);
            self.reg8[host.code() as usize].modified = false;
        }
    }

    /// Move a mapping from `src` into `dst`, freeing `src`.
    fn do_replace(&mut self, asm: &mut Emitter, dst: Reg8, src: Reg8, load: bool) {
        self.dirty8(asm, dst);
        if !self.reg8[dst.code() as usize].free {
            self.free_count += 1;
        }
        self.reg8[dst.code() as usize] = self.reg8[src.code() as usize];
        if load {
            asm.mov_r8r8(dst, src);
        }
        self.reset_slot(src);
    }

    /// Exchange two mappings. With `load` the values swap too;
    /// without it the old value of `a` is parked in `b` and `a` is
    /// left to be overwritten.
    fn do_swap(&mut self, asm: &mut Emitter, a: Reg8, b: Reg8, load: bool) {
        self.dirty8(asm, a);
        self.dirty8(asm, b);
        self.reg8.swap(a.code() as usize, b.code() as usize);
        if load {
            asm.xchg_r8r8(a, b);
        } else {
            asm.mov_r8r8(b, a);
        }
    }

    /// Claim a slot for `guest`, loading the value unless the caller
    /// is about to overwrite it.
    fn do_alloc(&mut self, asm: &mut Emitter, host: Reg8, guest: usize, load: bool) {
        self.dirty8(asm, host);
        if self.reg8[host.code() as usize].free {
            self.free_count -= 1;
        }
        self.reset_slot(host);
        let slot = &mut self.reg8[host.code() as usize];
        slot.free = false;
        slot.guest = guest;
        if load {
            asm.mov_r8md(host, crate::REG_STATE, self.v_disp + guest as i32);
        }
    }

    fn do_dealloc(&mut self, asm: &mut Emitter, host: Reg8) {
        if !self.reg8[host.code() as usize].free {
            self.do_save(asm, host);
            self.reset_slot(host);
            self.free_count += 1;
        }
    }

    fn do_save_index(&mut self, asm: &mut Emitter) {
        if self.index.modified && !self.index.free {
            asm.mov_m32r32_d(crate::REG_STATE, REG_INDEX, self.i_disp);
            self.index.modified = false;
        }
    }

    // -- allocation --

    /// Allocate `guest` into a byte register.
    ///
    /// Already live: the slot's age resets. Otherwise a free slot is
    /// claimed, or the oldest slot is written back and evicted. The
    /// scan ages every slot; free-slot preference follows the reverse
    /// scan order (the A pair first, BL last).
    pub fn alloc_byte(&mut self, asm: &mut Emitter, guest: usize, load: bool) -> Reg8 {
        let mut hit: Option<usize> = None;
        let mut free_slot: Option<usize> = None;
        let mut victim: Option<usize> = None;
        let mut oldest = -1;

        for a in (0..4).rev() {
            for b in 0..2 {
                let i = a + b * 4;
                self.reg8[i].age += 1;
                if self.reg8[i].guest == guest && !self.reg8[i].free {
                    hit = Some(i);
                } else if self.reg8[i].free {
                    free_slot = Some(i);
                } else if self.reg8[i].age > oldest {
                    oldest = self.reg8[i].age;
                    victim = Some(i);
                }
            }
        }

        if let Some(i) = hit {
            self.reg8[i].age = 0;
            return Reg8::from_code(i as u8);
        }
        let host = match free_slot {
            Some(i) => Reg8::from_code(i as u8),
            None => {
                let host = Reg8::from_code(victim.unwrap() as u8);
                self.do_dealloc(asm, host);
                host
            }
        };
        self.do_alloc(asm, host, guest, load);
        host
    }

    /// Force `guest` into a specific byte register, swapping or
    /// displacing whatever is there.
    pub fn alloc_byte_into(
        &mut self,
        asm: &mut Emitter,
        host: Reg8,
        guest: usize,
        load: bool,
    ) -> Reg8 {
        let target = self.reg8[host.code() as usize];
        if target.guest == guest && !target.free {
            self.reg8[host.code() as usize].age = 0;
            return host;
        }

        for i in 0..NUM_REG8 {
            if self.reg8[i].guest == guest && !self.reg8[i].free {
                let src = Reg8::from_code(i as u8);
                if !self.reg8[host.code() as usize].free {
                    self.do_swap(asm, host, src, load);
                } else {
                    self.do_replace(asm, host, src, load);
                }
                self.reg8[host.code() as usize].age = 0;
                return host;
            }
        }

        if !self.reg8[host.code() as usize].free {
            self.do_dealloc(asm, host);
        }
        self.do_alloc(asm, host, guest, load);
        host
    }

    /// Allocate the CHIP-8 I register into its fixed host register.
    /// Idempotent while the allocation is live.
    pub fn alloc_index(&mut self, asm: &mut Emitter, load: bool) -> Reg64 {
        if self.index.free {
            self.dirty64(asm, REG_INDEX);
            self.index.free = false;
            self.index.modified = false;
            if load {
                asm.mov_r32md(REG_INDEX, crate::REG_STATE, self.i_disp);
            }
        }
        REG_INDEX
    }

    /// Deallocate a byte register, writing it back if modified.
    pub fn dealloc_byte(&mut self, asm: &mut Emitter, host: Reg8) {
        self.do_dealloc(asm, host);
    }

    /// Deallocate the I register, writing it back if modified.
    pub fn dealloc_index(&mut self, asm: &mut Emitter) {
        self.do_save_index(asm);
        self.index.free = true;
        self.index.modified = false;
    }

    /// Write back every live, modified register (bytes and I),
    /// keeping all allocations live.
    pub fn save_registers(&mut self, asm: &mut Emitter) {
        for i in 0..NUM_REG8 {
            if self.reg8[i].modified && !self.reg8[i].free {
                let host = Reg8::from_code(i as u8);
                asm.mov_m8r8_d(
                    crate::REG_STATE,
                    host,
                    self.v_disp + self.reg8[i].guest as i32,
                );
                self.reg8[i].modified = false;
            }
        }
        self.do_save_index(asm);
    }

    /// Move a live mapping from one byte register to a free one.
    /// Returns false when `from` is free or `to` is occupied.
    pub fn realloc_byte(&mut self, asm: &mut Emitter, from: Reg8, to: Reg8) -> bool {
        if self.reg8[from.code() as usize].free || !self.reg8[to.code() as usize].free {
            return false;
        }
        self.do_replace(asm, to, from, true);
        true
    }

    pub fn mark_modified(&mut self, host: Reg8) {
        self.reg8[host.code() as usize].modified = true;
    }

    pub fn mark_index_modified(&mut self) {
        self.index.modified = true;
    }

    // -- queries --

    pub fn is_allocated_guest(&self, guest: usize) -> bool {
        self.reg8
            .iter()
            .any(|slot| slot.guest == guest && !slot.free)
    }

    pub fn is_allocated_host(&self, host: Reg8) -> bool {
        !self.reg8[host.code() as usize].free
    }

    pub fn is_allocated_index(&self) -> bool {
        !self.index.free
    }

    /// Host register currently holding `guest`, if any.
    pub fn host_of_guest(&self, guest: usize) -> Option<Reg8> {
        for i in 0..NUM_REG8 {
            if self.reg8[i].guest == guest && !self.reg8[i].free {
                return Some(Reg8::from_code(i as u8));
            }
        }
        None
    }

    pub fn free_byte_slots(&self) -> usize {
        self.free_count
    }

    // -- dirty host-register discipline --

    /// Record first use of a host register the caller expects
    /// preserved, emitting the push. The return register is exempt.
    pub fn dirty64(&mut self, asm: &mut Emitter, reg: Reg64) {
        if !self.dirty[reg.code() as usize] && reg != REG_RET {
            self.dirty[reg.code() as usize] = true;
            self.dirty_order[self.dirty_count] = reg;
            self.dirty_count += 1;
            asm.push_r64(reg);
        }
    }

    /// Dirty the 64-bit register containing a byte register.
    pub fn dirty8(&mut self, asm: &mut Emitter, reg: Reg8) {
        self.dirty64(asm, reg.container());
    }

    pub fn is_dirty(&self, reg: Reg64) -> bool {
        self.dirty[reg.code() as usize]
    }

    /// Emit pops for every dirty register, newest first. State is not
    /// consumed: each block exit emits the full sequence.
    pub fn restore_dirty(&self, asm: &mut Emitter) {
        for i in (0..self.dirty_count).rev() {
            asm.pop_r64(self.dirty_order[i]);
        }
    }

    /// Scratch 64-bit register guaranteed not to overlap a live byte
    /// allocation: RAX while AL and AH are free, else the dedicated
    /// temp.
    pub fn temp_register(&self) -> Reg64 {
        if self.reg8[Reg8::Al.code() as usize].free && self.reg8[Reg8::Ah.code() as usize].free {
            REG_RET
        } else {
            REG_TMP
        }
    }
}
