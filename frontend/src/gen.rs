//! Per-opcode code generators.
//!
//! Each generator runs at translation time, driving the allocator and
//! emitter. Guest state is addressed as `[rbp + disp]`: every block's
//! prologue parks the caller's rbp via the dirty discipline and loads
//! the pinned state base, so generators may use rbp freely up to the
//! point `restore_dirty` runs.
//!
//! Several generators borrow registers outside the allocator's
//! bookkeeping (the sprite loop, the LCG, BCD). Those push and pop
//! the affected registers manually around the borrowed range when the
//! allocator reports them live; the allocation map itself is
//! untouched because the values are identical again afterwards.

use chip86_backend::{Reg64, Reg8, REG_RET, REG_STATE, REG_TMP};
use chip86_core::chip8::{
    FLAG_REG, KEY_COUNT, LCG_INCREMENT, LCG_MULTIPLIER, NEW_FRAME, OPCODE_SIZE, PIXEL_OFF,
    PIXEL_ON, RES_HEIGHT, RES_WIDTH, STACK_SLOT_SIZE,
};

use crate::ir::DecodedOp;
use crate::translator::Translator;

/// Bytes of framebuffer, contiguous in guest state.
const SCREEN_BYTES: i32 = (RES_WIDTH * RES_HEIGHT) as i32;

impl Translator {
    /// Forced return: commit registers, restore the caller's, load
    /// the next guest PC and leave. Inside a skip shadow the commit is
    /// skipped because the skip generator already saved.
    pub(crate) fn gen_return(&mut self, node: &DecodedOp) {
        if !node.in_condition {
            self.regs.save_registers(&mut self.asm);
        }
        self.regs.restore_dirty(&mut self.asm);
        self.asm.mov_r32i32(REG_RET, node.addr as u32);
        self.asm.ret();
    }

    /// 00E0 — clear the screen, raise the new-frame flag.
    pub(crate) fn gen_00e0(&mut self, _node: &DecodedOp) {
        let row_loop = self.asm.new_label();
        let r = self.regs.temp_register();
        self.regs.dirty64(&mut self.asm, r);

        // Borrow rcx for the end bound.
        let saved_rcx =
            self.regs.is_allocated_host(Reg8::Cl) || self.regs.is_allocated_host(Reg8::Ch);
        if saved_rcx {
            self.asm.push_r64(Reg64::Rcx);
        } else {
            self.regs.dirty64(&mut self.asm, Reg64::Rcx);
        }

        self.asm.lea_r64(r, REG_STATE, self.layout.screen);
        self.asm
            .lea_r64(Reg64::Rcx, REG_STATE, self.layout.screen + SCREEN_BYTES);

        self.asm.place_label(row_loop);
        for d in (0..RES_WIDTH).step_by(4) {
            self.asm.mov_m32i32_d(r, PIXEL_OFF as u32, d as i32);
        }
        self.asm.add_r64i32(r, RES_WIDTH as i32);
        self.asm.cmp_r64r64(r, Reg64::Rcx);
        self.asm.jnz(row_loop);

        self.asm
            .mov_m32i32_d(REG_STATE, NEW_FRAME, self.layout.new_frame);

        if saved_rcx {
            self.asm.pop_r64(Reg64::Rcx);
        }
    }

    /// 00EE — return from subroutine: pre-decrement sp, fetch the
    /// saved PC.
    pub(crate) fn gen_00ee(&mut self, node: &DecodedOp) {
        if !node.in_condition {
            self.regs.save_registers(&mut self.asm);
        }
        self.asm.mov_r64md(REG_RET, REG_STATE, self.layout.sp);
        self.asm.sub_r64i32(REG_RET, STACK_SLOT_SIZE as i32);
        self.asm.mov_m64r64_d(REG_STATE, REG_RET, self.layout.sp);
        self.asm.mov_r32m32(REG_RET, REG_RET);
        self.regs.restore_dirty(&mut self.asm);
        self.asm.ret();
    }

    /// 1NNN — jump.
    pub(crate) fn gen_1nnn(&mut self, node: &DecodedOp) {
        if !node.in_condition {
            self.regs.save_registers(&mut self.asm);
        }
        self.regs.restore_dirty(&mut self.asm);
        self.asm.mov_r32i32(REG_RET, node.nnn as u32);
        self.asm.ret();
    }

    /// 2NNN — call: store the return address at *sp, post-increment
    /// sp by one slot.
    pub(crate) fn gen_2nnn(&mut self, node: &DecodedOp) {
        if !node.in_condition {
            self.regs.save_registers(&mut self.asm);
        }
        self.asm.mov_r64md(REG_RET, REG_STATE, self.layout.sp);
        self.asm
            .mov_m32i32(REG_RET, node.addr.wrapping_add(OPCODE_SIZE) as u32);
        self.asm.add_r64i32(REG_RET, STACK_SLOT_SIZE as i32);
        self.asm.mov_m64r64_d(REG_STATE, REG_RET, self.layout.sp);
        self.regs.restore_dirty(&mut self.asm);
        self.asm.mov_r32i32(REG_RET, node.nnn as u32);
        self.asm.ret();
    }

    /// Common shape of the four compare skips: operands in registers,
    /// everything committed, then the compare and the forward jump to
    /// the post-skip label.
    fn gen_skip_imm(&mut self, node: &DecodedOp, jump_if_equal: bool) {
        let label = self.asm.new_label();
        self.branch_dest = Some(label);
        let r = self.regs.alloc_byte(&mut self.asm, node.x, true);
        self.regs.save_registers(&mut self.asm);

        if node.kk == 0 {
            self.asm.test_r8r8(r, r);
        } else {
            self.asm.cmp_r8i8(r, node.kk);
        }
        if jump_if_equal {
            self.asm.jz(label);
        } else {
            self.asm.jnz(label);
        }
    }

    fn gen_skip_reg(&mut self, node: &DecodedOp, jump_if_equal: bool) {
        let label = self.asm.new_label();
        self.branch_dest = Some(label);
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.regs.save_registers(&mut self.asm);

        self.asm.cmp_r8r8(r1, r2);
        if jump_if_equal {
            self.asm.jz(label);
        } else {
            self.asm.jnz(label);
        }
    }

    /// 3XNN — skip if VX == NN.
    pub(crate) fn gen_3xnn(&mut self, node: &DecodedOp) {
        self.gen_skip_imm(node, true);
    }

    /// 4XNN — skip if VX != NN.
    pub(crate) fn gen_4xnn(&mut self, node: &DecodedOp) {
        self.gen_skip_imm(node, false);
    }

    /// 5XY0 — skip if VX == VY.
    pub(crate) fn gen_5xy0(&mut self, node: &DecodedOp) {
        self.gen_skip_reg(node, true);
    }

    /// 9XY0 — skip if VX != VY.
    pub(crate) fn gen_9xy0(&mut self, node: &DecodedOp) {
        self.gen_skip_reg(node, false);
    }

    /// 6XNN — VX = NN.
    pub(crate) fn gen_6xnn(&mut self, node: &DecodedOp) {
        let r = self.regs.alloc_byte(&mut self.asm, node.x, false);
        self.asm.mov_r8i8(r, node.kk);
        self.regs.mark_modified(r);
    }

    /// 7XNN — VX += NN, VF untouched.
    pub(crate) fn gen_7xnn(&mut self, node: &DecodedOp) {
        let r = self.regs.alloc_byte(&mut self.asm, node.x, true);
        self.asm.add_r8i8(r, node.kk);
        self.regs.mark_modified(r);
    }

    /// 8XY0 — VX = VY.
    pub(crate) fn gen_8xy0(&mut self, node: &DecodedOp) {
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, false);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.mov_r8r8(r1, r2);
        self.regs.mark_modified(r1);
    }

    /// 8XY1 — VX |= VY.
    pub(crate) fn gen_8xy1(&mut self, node: &DecodedOp) {
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.or_r8r8(r1, r2);
        self.regs.mark_modified(r1);
    }

    /// 8XY2 — VX &= VY.
    pub(crate) fn gen_8xy2(&mut self, node: &DecodedOp) {
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.and_r8r8(r1, r2);
        self.regs.mark_modified(r1);
    }

    /// 8XY3 — VX ^= VY.
    pub(crate) fn gen_8xy3(&mut self, node: &DecodedOp) {
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.xor_r8r8(r1, r2);
        self.regs.mark_modified(r1);
    }

    /// 8XY4 — VX += VY, VF = carry.
    pub(crate) fn gen_8xy4(&mut self, node: &DecodedOp) {
        let rf = self.regs.alloc_byte(&mut self.asm, FLAG_REG, false);
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.add_r8r8(r1, r2);
        self.asm.setc_r8(rf);
        self.regs.mark_modified(r1);
        self.regs.mark_modified(rf);
    }

    /// 8XY5 — VX -= VY, VF = !borrow.
    pub(crate) fn gen_8xy5(&mut self, node: &DecodedOp) {
        let rf = self.regs.alloc_byte(&mut self.asm, FLAG_REG, false);
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.sub_r8r8(r1, r2);
        self.asm.setnc_r8(rf);
        self.regs.mark_modified(r1);
        self.regs.mark_modified(rf);
    }

    /// 8XY6 — VF = lsb(VX), VX >>= 1.
    pub(crate) fn gen_8xy6(&mut self, node: &DecodedOp) {
        let rf = self.regs.alloc_byte(&mut self.asm, FLAG_REG, false);
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        self.asm.shr1_r8(r1);
        self.asm.setc_r8(rf);
        self.regs.mark_modified(r1);
        self.regs.mark_modified(rf);
    }

    /// 8XY7 — VX = VY - VX, VF = !borrow.
    pub(crate) fn gen_8xy7(&mut self, node: &DecodedOp) {
        let rf = self.regs.alloc_byte(&mut self.asm, FLAG_REG, false);
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.y, true);
        self.asm.mov_r8r8(rf, r2);
        self.asm.sub_r8r8(rf, r1);
        self.asm.mov_r8r8(r1, rf);
        self.asm.setnc_r8(rf);
        self.regs.mark_modified(r1);
        self.regs.mark_modified(rf);
    }

    /// 8XYE — VF = msb(VX), VX <<= 1.
    pub(crate) fn gen_8xye(&mut self, node: &DecodedOp) {
        let rf = self.regs.alloc_byte(&mut self.asm, FLAG_REG, false);
        let r1 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        self.asm.shl1_r8(r1);
        self.asm.setc_r8(rf);
        self.regs.mark_modified(r1);
        self.regs.mark_modified(rf);
    }

    /// ANNN — I = NNN.
    pub(crate) fn gen_annn(&mut self, node: &DecodedOp) {
        let r = self.regs.alloc_index(&mut self.asm, false);
        self.asm.mov_r32i32(r, node.nnn as u32);
        self.regs.mark_index_modified();
    }

    /// BNNN — jump to NNN + V0.
    pub(crate) fn gen_bnnn(&mut self, node: &DecodedOp) {
        if node.in_condition {
            // The skip already committed registers; just get V0 into
            // al by whatever path is cheapest.
            if self.regs.is_allocated_guest(0) {
                let r = self.regs.alloc_byte(&mut self.asm, 0, true);
                if r != Reg8::Al {
                    self.asm.mov_r8r8(Reg8::Al, r);
                }
            } else {
                self.asm.mov_r8md(Reg8::Al, REG_STATE, self.layout.v);
            }
        } else {
            self.regs.save_registers(&mut self.asm);
            self.regs.alloc_byte_into(&mut self.asm, Reg8::Al, 0, true);
        }
        self.regs.restore_dirty(&mut self.asm);
        self.asm.movzx_r32r8(REG_RET, Reg8::Al);
        self.asm.add_r32i32(REG_RET, node.nnn as u32);
        self.asm.ret();
    }

    /// CXNN — VX = rand() & NN, advancing the LCG seed.
    ///
    /// The multiply needs eax and clobbers edx, so live occupants of
    /// ah and the d-register halves are parked around it.
    pub(crate) fn gen_cxnn(&mut self, node: &DecodedOp) {
        self.regs
            .alloc_byte_into(&mut self.asm, Reg8::Al, node.x, false);
        self.regs.dirty64(&mut self.asm, Reg64::Rdx);

        // Try to move an ah occupant to some other free slot first.
        if self.regs.is_allocated_host(Reg8::Ah) {
            for code in 1..8u8 {
                let dst = Reg8::from_code(code);
                if !self.regs.is_allocated_host(dst) {
                    self.regs.realloc_byte(&mut self.asm, Reg8::Ah, dst);
                    break;
                }
            }
        }

        let ah_live = self.regs.is_allocated_host(Reg8::Ah);
        if ah_live {
            self.regs.dirty64(&mut self.asm, REG_TMP);
            self.asm.mov_r64r64(REG_TMP, Reg64::Rax);
        }

        let dx_live =
            self.regs.is_allocated_host(Reg8::Dl) || self.regs.is_allocated_host(Reg8::Dh);
        if dx_live {
            if ah_live {
                self.asm.push_r64(Reg64::Rdx);
            } else {
                self.regs.dirty64(&mut self.asm, REG_TMP);
                self.asm.mov_r64r64(REG_TMP, Reg64::Rdx);
            }
        }

        self.asm.mov_r32i32(Reg64::Rax, LCG_MULTIPLIER);
        self.asm.mul_m32_d(REG_STATE, self.layout.seed_rng);
        self.asm.add_r32i32(Reg64::Rax, LCG_INCREMENT);
        self.asm
            .mov_m32r32_d(REG_STATE, Reg64::Rax, self.layout.seed_rng);
        self.asm.shr_r32i8(Reg64::Rax, 24);
        self.asm.and_r8i8(Reg8::Al, node.kk);

        if ah_live {
            self.asm.mov_r8r8(Reg8::Dl, Reg8::Al);
            self.asm.mov_r64r64(Reg64::Rax, REG_TMP);
            self.asm.mov_r8r8(Reg8::Al, Reg8::Dl);
        }
        if dx_live {
            if ah_live {
                self.asm.pop_r64(Reg64::Rdx);
            } else {
                self.asm.mov_r64r64(Reg64::Rdx, REG_TMP);
            }
        }

        self.regs.mark_modified(Reg8::Al);
    }

    /// DXYN — draw an 8-wide, N-high sprite from mem[I] at (VX, VY),
    /// wrapping; VF = collision; raise the new-frame flag. With N = 0
    /// the row body runs once.
    pub(crate) fn gen_dxyn(&mut self, node: &DecodedOp) {
        let rf = self
            .regs
            .alloc_byte_into(&mut self.asm, Reg8::Al, FLAG_REG, false);
        let rx = self
            .regs
            .alloc_byte_into(&mut self.asm, Reg8::Ah, node.x, true);
        let ry = self
            .regs
            .alloc_byte_into(&mut self.asm, Reg8::Bl, node.y, true);
        let ra = self.regs.alloc_index(&mut self.asm, true);

        // Borrowed registers: rcx/rdi for coordinate math, dl for the
        // collision probe, dh for the sprite byte, bh for the row
        // counter.
        let rtmp_x = Reg64::Rcx;
        let rtmp_y = REG_TMP;
        let rcmp = Reg8::Dl;
        let rcount = Reg8::Bh;
        let rbits = Reg8::Dh;

        self.regs.dirty64(&mut self.asm, rtmp_y);
        self.regs.dirty64(&mut self.asm, rtmp_x);
        self.regs.dirty8(&mut self.asm, rbits);
        self.regs.dirty8(&mut self.asm, rcmp);
        if node.n != 0 {
            self.regs.dirty8(&mut self.asm, rcount);
        }

        let row_loop = self.asm.new_label();

        // Park live occupants of the borrowed registers. All pushes
        // sit outside the row loop.
        let saved_rdx =
            self.regs.is_allocated_host(Reg8::Dl) || self.regs.is_allocated_host(Reg8::Dh);
        if saved_rdx {
            self.asm.push_r64(Reg64::Rdx);
        }
        let saved_rcx =
            self.regs.is_allocated_host(Reg8::Cl) || self.regs.is_allocated_host(Reg8::Ch);
        if saved_rcx {
            self.asm.push_r64(Reg64::Rcx);
        }
        let saved_rbx = self.regs.is_allocated_host(Reg8::Bh) && node.n != 0;
        if saved_rbx {
            self.asm.push_r64(Reg64::Rbx);
        }

        self.asm.xor_r8r8(rf, rf);

        if node.n != 0 {
            self.asm.xor_r8r8(rcount, rcount);
            self.asm.place_label(row_loop);
            self.asm.movzx_r32r8(rtmp_y, rcount);
            self.asm.add_r64r64(rtmp_y, ra);
        } else {
            self.asm.mov_r32r32(rtmp_y, ra);
        }
        // Sprite row byte at mem[I + row].
        self.asm.add_r64r64(rtmp_y, REG_STATE);
        self.asm.add_r64i32(rtmp_y, self.layout.mem);
        self.asm.mov_r8m8(rbits, rtmp_y);

        for _ in 0..8 {
            let no_pixel = self.asm.new_label();
            let no_collision = self.asm.new_label();

            self.asm.movzx_r32r8(rtmp_y, ry);
            self.asm.movzx_r32r8(rtmp_x, rx);
            self.asm.and_r32i32(rtmp_y, (RES_HEIGHT - 1) as u32);
            self.asm.and_r32i32(rtmp_x, (RES_WIDTH - 1) as u32);
            self.asm.shl_r32i8(rtmp_y, 6);
            self.asm.add_r32r32(rtmp_y, rtmp_x);
            self.asm.add_r64r64(rtmp_y, REG_STATE);
            self.asm.add_r64i32(rtmp_y, self.layout.screen);

            self.asm.shl1_r8(rbits);
            self.asm.jnc(no_pixel);
            self.asm.mov_r8m8(rcmp, rtmp_y);
            self.asm.test_r8r8(rcmp, rcmp);
            self.asm.jz(no_collision);
            self.asm.or_r8i8(rf, 1);
            self.asm.place_label(no_collision);
            self.asm.xor_m8i8(rtmp_y, PIXEL_ON);
            self.asm.place_label(no_pixel);
            self.asm.inc_r8(rx);
        }

        self.asm.sub_r8i8(rx, 8);

        if node.n != 0 {
            self.asm.inc_r8(ry);
            self.asm.inc_r8(rcount);
            self.asm.cmp_r8i8(rcount, node.n);
            self.asm.jnz(row_loop);
            self.asm.sub_r8r8(ry, rcount);
        }

        self.asm
            .mov_m32i32_d(REG_STATE, NEW_FRAME, self.layout.new_frame);

        if saved_rbx {
            self.asm.pop_r64(Reg64::Rbx);
        }
        if saved_rcx {
            self.asm.pop_r64(Reg64::Rcx);
        }
        if saved_rdx {
            self.asm.pop_r64(Reg64::Rdx);
        }

        self.regs.mark_modified(rf);
    }

    /// Common body of EX9E/EXA1: point a scratch register at
    /// keys[VX], test the byte, jump on the wanted condition.
    fn gen_skip_key(&mut self, node: &DecodedOp, jump_if_pressed: bool) {
        let label = self.asm.new_label();
        self.branch_dest = Some(label);

        let r8 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r32 = self.regs.temp_register();
        self.regs.dirty64(&mut self.asm, r32);
        self.regs.save_registers(&mut self.asm);

        // A free half of r8's own container can hold the key byte;
        // its container is already pushed, so clobbering it is safe.
        let low = Reg8::from_code(r8.code() & 0x3);
        let high = Reg8::from_code((r8.code() & 0x3) + 4);
        let probe = if !self.regs.is_allocated_host(high) {
            Some(high)
        } else if !self.regs.is_allocated_host(low) {
            Some(low)
        } else {
            None
        };

        self.asm.movzx_r32r8(r32, r8);
        self.asm.add_r64r64(r32, REG_STATE);
        self.asm.add_r64i32(r32, self.layout.keys);

        match probe {
            Some(tmp) => {
                self.asm.mov_r8m8(tmp, r32);
                self.asm.test_r8r8(tmp, tmp);
            }
            None => self.asm.cmp_m8i8(r32, 0),
        }

        if jump_if_pressed {
            self.asm.jnz(label);
        } else {
            self.asm.jz(label);
        }
    }

    /// EX9E — skip if key VX is pressed.
    pub(crate) fn gen_ex9e(&mut self, node: &DecodedOp) {
        self.gen_skip_key(node, true);
    }

    /// EXA1 — skip if key VX is not pressed.
    pub(crate) fn gen_exa1(&mut self, node: &DecodedOp) {
        self.gen_skip_key(node, false);
    }

    /// FX07 — VX = delay timer.
    pub(crate) fn gen_fx07(&mut self, node: &DecodedOp) {
        let r8 = self.regs.alloc_byte(&mut self.asm, node.x, false);
        self.asm.mov_r8md(r8, REG_STATE, self.layout.delay_timer);
        self.regs.mark_modified(r8);
    }

    /// FX0A — wait for a key press, store its index in VX.
    ///
    /// Always a block of its own: with no key down the block returns
    /// its own address so the dispatcher re-enters it, which is what
    /// lets the host keep polling input between attempts.
    pub(crate) fn gen_fx0a(&mut self, node: &DecodedOp) {
        let r = self.regs.temp_register();
        self.regs.dirty64(&mut self.asm, r);
        self.regs.dirty64(&mut self.asm, Reg64::Rcx);

        let pressed = self.asm.new_label();

        self.asm.lea_r64(r, REG_STATE, self.layout.keys);
        self.asm.xor_r8r8(Reg8::Cl, Reg8::Cl);
        for i in 0..KEY_COUNT {
            self.asm.mov_r8md(Reg8::Ch, r, i as i32);
            self.asm.test_r8r8(Reg8::Ch, Reg8::Ch);
            self.asm.jnz(pressed);
            self.asm.inc_r8(Reg8::Cl);
        }

        // Nothing down: spin on this block.
        self.regs.restore_dirty(&mut self.asm);
        self.asm.mov_r32i32(REG_RET, node.addr as u32);
        self.asm.ret();

        self.asm.place_label(pressed);
        self.asm
            .mov_m8r8_d(REG_STATE, Reg8::Cl, self.layout.v + node.x as i32);
        self.regs.restore_dirty(&mut self.asm);
        self.asm
            .mov_r32i32(REG_RET, node.addr.wrapping_add(OPCODE_SIZE) as u32);
        self.asm.ret();
    }

    /// FX15 — delay timer = VX.
    pub(crate) fn gen_fx15(&mut self, node: &DecodedOp) {
        let r8 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        self.asm.mov_m8r8_d(REG_STATE, r8, self.layout.delay_timer);
    }

    /// FX18 — sound timer = VX.
    pub(crate) fn gen_fx18(&mut self, node: &DecodedOp) {
        let r8 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        self.asm.mov_m8r8_d(REG_STATE, r8, self.layout.sound_timer);
    }

    /// FX1E — I += VX, no flag.
    pub(crate) fn gen_fx1e(&mut self, node: &DecodedOp) {
        let r1 = self.regs.alloc_index(&mut self.asm, true);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r32 = self.regs.temp_register();
        self.regs.dirty64(&mut self.asm, r32);
        self.asm.movzx_r32r8(r32, r2);
        self.asm.add_r32r32(r1, r32);
        self.regs.mark_index_modified();
    }

    /// FX29 — I = VX * 5 (the font sits at guest address 0).
    pub(crate) fn gen_fx29(&mut self, node: &DecodedOp) {
        let r1 = self.regs.alloc_index(&mut self.asm, false);
        let r2 = self.regs.alloc_byte(&mut self.asm, node.x, true);
        let r32 = self.regs.temp_register();
        self.regs.dirty64(&mut self.asm, r32);
        self.asm.movzx_r32r8(r1, r2);
        self.asm.mov_r32r32(r32, r1);
        self.asm.shl_r32i8(r1, 2);
        self.asm.add_r32r32(r1, r32);
        self.regs.mark_index_modified();
    }

    /// FX33 — BCD of VX to mem[I..I+3]; I unchanged.
    ///
    /// div works on ax, so rax is parked in rdi for the duration and
    /// the divisor goes in a free byte register (or a pushed cl when
    /// the pool is full). esi is turned into a memory pointer and
    /// restored to the plain I value afterwards.
    pub(crate) fn gen_fx33(&mut self, node: &DecodedOp) {
        self.regs
            .alloc_byte_into(&mut self.asm, Reg8::Al, node.x, true);
        let ra = self.regs.alloc_index(&mut self.asm, true);

        let mut divisor: Option<Reg8> = None;
        for code in (1..8u8).rev() {
            let r = Reg8::from_code(code);
            if !self.regs.is_allocated_host(r) && r != Reg8::Ah {
                divisor = Some(r);
                break;
            }
        }

        self.regs.dirty64(&mut self.asm, REG_TMP);

        let r3 = match divisor {
            Some(r) => {
                self.regs.dirty8(&mut self.asm, r);
                r
            }
            None => {
                self.asm.push_r64(Reg64::Rcx);
                Reg8::Cl
            }
        };

        self.asm.mov_r64r64(REG_TMP, Reg64::Rax);
        self.asm.add_r64r64(ra, REG_STATE);
        self.asm.add_r64i32(ra, self.layout.mem);
        self.asm.xor_r8r8(Reg8::Ah, Reg8::Ah);
        self.asm.mov_r8i8(r3, 100);
        self.asm.div_r8(r3);
        self.asm.mov_m8r8(ra, Reg8::Al);
        self.asm.inc_r64(ra);
        self.asm.mov_r8r8(Reg8::Al, Reg8::Ah);
        self.asm.xor_r8r8(Reg8::Ah, Reg8::Ah);
        self.asm.mov_r8i8(r3, 10);
        self.asm.div_r8(r3);
        self.asm.mov_m8r8(ra, Reg8::Al);
        self.asm.inc_r64(ra);
        self.asm.mov_m8r8(ra, Reg8::Ah);
        self.asm.mov_r64r64(Reg64::Rax, REG_TMP);
        self.asm.sub_r64r64(ra, REG_STATE);
        self.asm.sub_r64i32(ra, self.layout.mem + 2);

        if divisor.is_none() {
            self.asm.pop_r64(Reg64::Rcx);
        }
    }

    /// FX55 — store V0..VX to mem[I..]; I unchanged.
    pub(crate) fn gen_fx55(&mut self, node: &DecodedOp) {
        let ra = self.regs.alloc_index(&mut self.asm, true);
        self.asm.add_r64r64(ra, REG_STATE);
        self.asm.add_r64i32(ra, self.layout.mem);

        for i in 0..=node.x {
            if self.regs.is_allocated_guest(i) || self.regs.free_byte_slots() > 0 {
                let r = self.regs.alloc_byte(&mut self.asm, i, true);
                self.asm.mov_m8r8(ra, r);
            } else {
                // Pool exhausted: bounce the byte through a pushed dl.
                self.asm.push_r64(Reg64::Rdx);
                self.asm
                    .mov_r8md(Reg8::Dl, REG_STATE, self.layout.v + i as i32);
                self.asm.mov_m8r8(ra, Reg8::Dl);
                self.asm.pop_r64(Reg64::Rdx);
            }
            self.asm.inc_r64(ra);
        }

        self.asm.sub_r64r64(ra, REG_STATE);
        self.asm.sub_r64i32(ra, self.layout.mem + node.x as i32 + 1);
    }

    /// FX65 — load V0..VX from mem[I..]; I unchanged.
    pub(crate) fn gen_fx65(&mut self, node: &DecodedOp) {
        let ra = self.regs.alloc_index(&mut self.asm, true);
        self.asm.add_r64r64(ra, REG_STATE);
        self.asm.add_r64i32(ra, self.layout.mem);

        for i in 0..=node.x {
            if self.regs.is_allocated_guest(i) || self.regs.free_byte_slots() > 0 {
                let r = self.regs.alloc_byte(&mut self.asm, i, false);
                self.asm.mov_r8m8(r, ra);
                self.regs.mark_modified(r);
            } else {
                self.asm.push_r64(Reg64::Rdx);
                self.asm.mov_r8m8(Reg8::Dl, ra);
                self.asm
                    .mov_m8r8_d(REG_STATE, Reg8::Dl, self.layout.v + i as i32);
                self.asm.pop_r64(Reg64::Rdx);
            }
            self.asm.inc_r64(ra);
        }

        self.asm.sub_r64r64(ra, REG_STATE);
        self.asm.sub_r64i32(ra, self.layout.mem + node.x as i32 + 1);
    }
}
