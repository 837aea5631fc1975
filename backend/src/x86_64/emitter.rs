//! Streaming x86-64 assembler.
//!
//! One method per instruction form, each appending the exact encoding
//! to a growable buffer. Jumps go through symbolic labels: emission
//! reserves a worst-case hole padded with NOPs and records a pending
//! jump; `finish` backpatches every pending jump, picking the short
//! form when the displacement allows it (the leftover NOPs stay as
//! harmless padding).
//!
//! Memory operands are `[base64]` or `[base64 + disp]`; the
//! displacement width (none/8/32) is chosen automatically. RSP is
//! rejected as a base (it would need a SIB byte) and `[rbp]` is
//! encoded as `[rbp + 0]` (plain mod=00 rm=101 means RIP-relative).

use std::io;

use crate::exec_mem::ExecRegion;
use crate::x86_64::regs::{Reg64, Reg8};

/// Identifier returned by [`Emitter::new_label`].
pub type LabelId = usize;

/// Pending-jump flavors; the fanout is the short-vs-near encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Jmp,
    Jz,
    Jnz,
    Jc,
    Jnc,
}

impl JumpKind {
    /// Worst-case encoding size: near jcc is 6 bytes, near jmp 5.
    const fn hole_size(self) -> usize {
        match self {
            JumpKind::Jmp => 5,
            _ => 6,
        }
    }

    /// Short-form opcode (rel8 follows).
    const fn short_opcode(self) -> u8 {
        match self {
            JumpKind::Jmp => 0xEB,
            JumpKind::Jz => 0x74,
            JumpKind::Jnz => 0x75,
            JumpKind::Jc => 0x72,
            JumpKind::Jnc => 0x73,
        }
    }

    /// Near-form second opcode byte for jcc (0F xx rel32).
    const fn near_cc_opcode(self) -> u8 {
        match self {
            JumpKind::Jmp => unreachable!(),
            JumpKind::Jz => 0x84,
            JumpKind::Jnz => 0x85,
            JumpKind::Jc => 0x82,
            JumpKind::Jnc => 0x83,
        }
    }
}

struct Label {
    placed: bool,
    index: usize,
}

struct Jump {
    index: usize,
    label: LabelId,
    kind: JumpKind,
}

/// Streaming code emitter for one block.
pub struct Emitter {
    code: Vec<u8>,
    labels: Vec<Label>,
    jumps: Vec<Jump>,
}

const MODRM_REG: u8 = 0b11;
const MODRM_MEM: u8 = 0b00;
const MODRM_MEM_DISP8: u8 = 0b01;
const MODRM_MEM_DISP32: u8 = 0b10;

/// REX.W prefix: 64-bit operand size.
const REX_W: u8 = 0x48;

const fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode << 6) | (reg << 3) | rm
}

impl Emitter {
    pub fn new() -> Emitter {
        Emitter {
            code: Vec::new(),
            labels: Vec::new(),
            jumps: Vec::new(),
        }
    }

    /// Current write index.
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Drop all code, labels and pending jumps.
    pub fn reset(&mut self) {
        self.code.clear();
        self.labels.clear();
        self.jumps.clear();
    }

    // -- byte plumbing --

    #[inline]
    fn emit_u8(&mut self, val: u8) {
        self.code.push(val);
    }

    #[inline]
    fn emit_u32(&mut self, val: u32) {
        self.code.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    fn emit_u64(&mut self, val: u64) {
        self.code.extend_from_slice(&val.to_le_bytes());
    }

    fn patch(&mut self, at: usize, bytes: &[u8]) {
        self.code[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// ModR/M + displacement for a `[base + disp]` operand.
    fn emit_mem(&mut self, reg: u8, base: Reg64, disp: i32) {
        assert!(base != Reg64::Rsp, "rsp base needs a SIB byte");
        if disp == 0 && base != Reg64::Rbp {
            self.emit_u8(modrm(MODRM_MEM, reg, base.code()));
        } else if (-128..=127).contains(&disp) {
            self.emit_u8(modrm(MODRM_MEM_DISP8, reg, base.code()));
            self.emit_u8(disp as u8);
        } else {
            self.emit_u8(modrm(MODRM_MEM_DISP32, reg, base.code()));
            self.emit_u32(disp as u32);
        }
    }

    /// 81/83-class ALU op on r32 with auto-sized immediate.
    fn alu_r32i32(&mut self, op_ext: u8, reg: Reg64, imm: u32) {
        if (-128..=127).contains(&(imm as i32)) {
            self.emit_u8(0x83);
            self.emit_u8(modrm(MODRM_REG, op_ext, reg.code()));
            self.emit_u8(imm as u8);
        } else {
            self.emit_u8(0x81);
            self.emit_u8(modrm(MODRM_REG, op_ext, reg.code()));
            self.emit_u32(imm);
        }
    }

    // -- labels and jumps --

    /// Reserve a fresh label id.
    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(Label {
            placed: false,
            index: 0,
        });
        self.labels.len() - 1
    }

    /// Bind a label to the current write index. Each label may be
    /// placed at most once.
    pub fn place_label(&mut self, id: LabelId) {
        let label = &mut self.labels[id];
        assert!(!label.placed, "label placed twice");
        label.placed = true;
        label.index = self.code.len();
    }

    fn jump(&mut self, kind: JumpKind, label: LabelId) {
        let index = self.code.len();
        for _ in 0..kind.hole_size() {
            self.nop();
        }
        self.jumps.push(Jump { index, label, kind });
    }

    pub fn jmp(&mut self, label: LabelId) {
        self.jump(JumpKind::Jmp, label);
    }

    pub fn jz(&mut self, label: LabelId) {
        self.jump(JumpKind::Jz, label);
    }

    pub fn jnz(&mut self, label: LabelId) {
        self.jump(JumpKind::Jnz, label);
    }

    pub fn jc(&mut self, label: LabelId) {
        self.jump(JumpKind::Jc, label);
    }

    pub fn jnc(&mut self, label: LabelId) {
        self.jump(JumpKind::Jnc, label);
    }

    /// Backpatch pending jumps, most recent first. The short form is
    /// used when `rel - 2` fits in a signed byte; jumps whose label
    /// was never placed are dropped (the translator guarantees every
    /// referenced label gets placed).
    fn insert_jumps(&mut self) {
        while let Some(jump) = self.jumps.pop() {
            let label = &self.labels[jump.label];
            if !label.placed {
                continue;
            }
            let rel = label.index as i32 - jump.index as i32;
            if (-128..=127).contains(&(rel - 2)) {
                let bytes = [jump.kind.short_opcode(), (rel - 2) as u8];
                self.patch(jump.index, &bytes);
            } else if jump.kind == JumpKind::Jmp {
                let mut bytes = [0xE9, 0, 0, 0, 0];
                bytes[1..].copy_from_slice(&(rel - 5).to_le_bytes());
                self.patch(jump.index, &bytes);
            } else {
                let mut bytes = [0x0F, jump.kind.near_cc_opcode(), 0, 0, 0, 0];
                bytes[2..].copy_from_slice(&(rel - 6).to_le_bytes());
                self.patch(jump.index, &bytes);
            }
        }
    }

    // -- finalization --

    /// Backpatch jumps and take the finished code, resetting the
    /// emitter for the next block.
    pub fn finish(&mut self) -> Vec<u8> {
        self.insert_jumps();
        self.labels.clear();
        std::mem::take(&mut self.code)
    }

    /// Finish and copy the code into a fresh executable region.
    pub fn finalize(&mut self) -> io::Result<ExecRegion> {
        let code = self.finish();
        ExecRegion::alloc(&code)
    }

    // -- alignment --

    /// Pad with NOPs until the write index is 16-byte aligned.
    pub fn align16(&mut self) {
        while self.code.len() % 16 != 0 {
            self.nop();
        }
    }

    /// Pad to 16 bytes only when the gap is small (< 8 bytes),
    /// amortizing the padding cost.
    pub fn align(&mut self) {
        if 16 - (self.code.len() & 15) < 8 {
            self.align16();
        }
    }

    // -- data moves --

    /// B0+rb — MOV r8, imm8
    pub fn mov_r8i8(&mut self, reg: Reg8, imm: u8) {
        self.emit_u8(0xB0 + reg.code());
        self.emit_u8(imm);
    }

    /// 88 /r — MOV r8, r8
    pub fn mov_r8r8(&mut self, dst: Reg8, src: Reg8) {
        self.emit_u8(0x88);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 8A /r — MOV r8, [base]
    pub fn mov_r8m8(&mut self, dst: Reg8, base: Reg64) {
        self.emit_u8(0x8A);
        self.emit_mem(dst.code(), base, 0);
    }

    /// 8A /r — MOV r8, [base + disp]
    pub fn mov_r8md(&mut self, dst: Reg8, base: Reg64, disp: i32) {
        self.emit_u8(0x8A);
        self.emit_mem(dst.code(), base, disp);
    }

    /// 88 /r — MOV [base], r8
    pub fn mov_m8r8(&mut self, base: Reg64, src: Reg8) {
        self.emit_u8(0x88);
        self.emit_mem(src.code(), base, 0);
    }

    /// 88 /r — MOV [base + disp], r8
    pub fn mov_m8r8_d(&mut self, base: Reg64, src: Reg8, disp: i32) {
        self.emit_u8(0x88);
        self.emit_mem(src.code(), base, disp);
    }

    /// B8+rd — MOV r32, imm32 (zero-extends into the full register)
    pub fn mov_r32i32(&mut self, reg: Reg64, imm: u32) {
        self.emit_u8(0xB8 + reg.code());
        self.emit_u32(imm);
    }

    /// REX.W B8+rd — MOVABS r64, imm64
    pub fn mov_r64i64(&mut self, reg: Reg64, imm: u64) {
        self.emit_u8(REX_W);
        self.emit_u8(0xB8 + reg.code());
        self.emit_u64(imm);
    }

    /// 89 /r — MOV r32, r32
    pub fn mov_r32r32(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(0x89);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// REX.W 89 /r — MOV r64, r64
    pub fn mov_r64r64(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(REX_W);
        self.emit_u8(0x89);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 8B /r — MOV r32, [base]
    pub fn mov_r32m32(&mut self, dst: Reg64, base: Reg64) {
        self.emit_u8(0x8B);
        self.emit_mem(dst.code(), base, 0);
    }

    /// 8B /r — MOV r32, [base + disp]
    pub fn mov_r32md(&mut self, dst: Reg64, base: Reg64, disp: i32) {
        self.emit_u8(0x8B);
        self.emit_mem(dst.code(), base, disp);
    }

    /// 89 /r — MOV [base], r32
    pub fn mov_m32r32(&mut self, base: Reg64, src: Reg64) {
        self.emit_u8(0x89);
        self.emit_mem(src.code(), base, 0);
    }

    /// 89 /r — MOV [base + disp], r32
    pub fn mov_m32r32_d(&mut self, base: Reg64, src: Reg64, disp: i32) {
        self.emit_u8(0x89);
        self.emit_mem(src.code(), base, disp);
    }

    /// C7 /0 — MOV [base], imm32
    pub fn mov_m32i32(&mut self, base: Reg64, imm: u32) {
        self.emit_u8(0xC7);
        self.emit_mem(0, base, 0);
        self.emit_u32(imm);
    }

    /// C7 /0 — MOV [base + disp], imm32
    pub fn mov_m32i32_d(&mut self, base: Reg64, imm: u32, disp: i32) {
        self.emit_u8(0xC7);
        self.emit_mem(0, base, disp);
        self.emit_u32(imm);
    }

    /// REX.W 8B /r — MOV r64, [base + disp]
    pub fn mov_r64md(&mut self, dst: Reg64, base: Reg64, disp: i32) {
        self.emit_u8(REX_W);
        self.emit_u8(0x8B);
        self.emit_mem(dst.code(), base, disp);
    }

    /// REX.W 89 /r — MOV [base + disp], r64
    pub fn mov_m64r64_d(&mut self, base: Reg64, src: Reg64, disp: i32) {
        self.emit_u8(REX_W);
        self.emit_u8(0x89);
        self.emit_mem(src.code(), base, disp);
    }

    /// 0F B6 /r — MOVZX r32, r8
    pub fn movzx_r32r8(&mut self, dst: Reg64, src: Reg8) {
        self.emit_u8(0x0F);
        self.emit_u8(0xB6);
        self.emit_u8(modrm(MODRM_REG, dst.code(), src.code()));
    }

    /// 0F B6 /r — MOVZX r32, [base]
    pub fn movzx_r32m8(&mut self, dst: Reg64, base: Reg64) {
        self.emit_u8(0x0F);
        self.emit_u8(0xB6);
        self.emit_mem(dst.code(), base, 0);
    }

    /// 0F B7 /r — MOVZX r32, r16
    pub fn movzx_r32r16(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(0x0F);
        self.emit_u8(0xB7);
        self.emit_u8(modrm(MODRM_REG, dst.code(), src.code()));
    }

    /// REX.W 8D /r — LEA r64, [base + disp]
    pub fn lea_r64(&mut self, dst: Reg64, base: Reg64, disp: i32) {
        self.emit_u8(REX_W);
        self.emit_u8(0x8D);
        self.emit_mem(dst.code(), base, disp);
    }

    // -- arithmetic --

    /// 00 /r — ADD r8, r8
    pub fn add_r8r8(&mut self, dst: Reg8, src: Reg8) {
        self.emit_u8(0x00);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 80 /0 — ADD r8, imm8
    pub fn add_r8i8(&mut self, dst: Reg8, imm: u8) {
        self.emit_u8(0x80);
        self.emit_u8(modrm(MODRM_REG, 0, dst.code()));
        self.emit_u8(imm);
    }

    /// 01 /r — ADD r32, r32
    pub fn add_r32r32(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(0x01);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// REX.W 01 /r — ADD r64, r64
    pub fn add_r64r64(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(REX_W);
        self.emit_u8(0x01);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 81/83 /0 — ADD r32, imm
    pub fn add_r32i32(&mut self, dst: Reg64, imm: u32) {
        self.alu_r32i32(0, dst, imm);
    }

    /// REX.W 81/83 /0 — ADD r64, imm32 (sign-extended)
    pub fn add_r64i32(&mut self, dst: Reg64, imm: i32) {
        self.emit_u8(REX_W);
        self.alu_r32i32(0, dst, imm as u32);
    }

    /// 28 /r — SUB r8, r8
    pub fn sub_r8r8(&mut self, dst: Reg8, src: Reg8) {
        self.emit_u8(0x28);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 80 /5 — SUB r8, imm8
    pub fn sub_r8i8(&mut self, dst: Reg8, imm: u8) {
        self.emit_u8(0x80);
        self.emit_u8(modrm(MODRM_REG, 5, dst.code()));
        self.emit_u8(imm);
    }

    /// 81/83 /5 — SUB r32, imm
    pub fn sub_r32i32(&mut self, dst: Reg64, imm: u32) {
        self.alu_r32i32(5, dst, imm);
    }

    /// REX.W 29 /r — SUB r64, r64
    pub fn sub_r64r64(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(REX_W);
        self.emit_u8(0x29);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// REX.W 81/83 /5 — SUB r64, imm32 (sign-extended)
    pub fn sub_r64i32(&mut self, dst: Reg64, imm: i32) {
        self.emit_u8(REX_W);
        self.alu_r32i32(5, dst, imm as u32);
    }

    /// FE /0 — INC r8
    pub fn inc_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xFE);
        self.emit_u8(modrm(MODRM_REG, 0, reg.code()));
    }

    /// FF /0 — INC r32
    pub fn inc_r32(&mut self, reg: Reg64) {
        self.emit_u8(0xFF);
        self.emit_u8(modrm(MODRM_REG, 0, reg.code()));
    }

    /// REX.W FF /0 — INC r64
    pub fn inc_r64(&mut self, reg: Reg64) {
        self.emit_u8(REX_W);
        self.emit_u8(0xFF);
        self.emit_u8(modrm(MODRM_REG, 0, reg.code()));
    }

    /// FE /1 — DEC r8
    pub fn dec_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xFE);
        self.emit_u8(modrm(MODRM_REG, 1, reg.code()));
    }

    /// FF /1 — DEC r32
    pub fn dec_r32(&mut self, reg: Reg64) {
        self.emit_u8(0xFF);
        self.emit_u8(modrm(MODRM_REG, 1, reg.code()));
    }

    // -- logic --

    /// 20 /r — AND r8, r8
    pub fn and_r8r8(&mut self, dst: Reg8, src: Reg8) {
        self.emit_u8(0x20);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 80 /4 — AND r8, imm8
    pub fn and_r8i8(&mut self, dst: Reg8, imm: u8) {
        self.emit_u8(0x80);
        self.emit_u8(modrm(MODRM_REG, 4, dst.code()));
        self.emit_u8(imm);
    }

    /// 81/83 /4 — AND r32, imm
    pub fn and_r32i32(&mut self, dst: Reg64, imm: u32) {
        self.alu_r32i32(4, dst, imm);
    }

    /// 08 /r — OR r8, r8
    pub fn or_r8r8(&mut self, dst: Reg8, src: Reg8) {
        self.emit_u8(0x08);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 80 /1 — OR r8, imm8
    pub fn or_r8i8(&mut self, dst: Reg8, imm: u8) {
        self.emit_u8(0x80);
        self.emit_u8(modrm(MODRM_REG, 1, dst.code()));
        self.emit_u8(imm);
    }

    /// 30 /r — XOR r8, r8
    pub fn xor_r8r8(&mut self, dst: Reg8, src: Reg8) {
        self.emit_u8(0x30);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 31 /r — XOR r32, r32
    pub fn xor_r32r32(&mut self, dst: Reg64, src: Reg64) {
        self.emit_u8(0x31);
        self.emit_u8(modrm(MODRM_REG, src.code(), dst.code()));
    }

    /// 80 /6 — XOR [base], imm8
    pub fn xor_m8i8(&mut self, base: Reg64, imm: u8) {
        self.emit_u8(0x80);
        self.emit_mem(6, base, 0);
        self.emit_u8(imm);
    }

    /// F6 /2 — NOT r8
    pub fn not_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xF6);
        self.emit_u8(modrm(MODRM_REG, 2, reg.code()));
    }

    /// 84 /r — TEST r8, r8
    pub fn test_r8r8(&mut self, a: Reg8, b: Reg8) {
        self.emit_u8(0x84);
        self.emit_u8(modrm(MODRM_REG, b.code(), a.code()));
    }

    // -- shifts --

    /// D0 /4 — SHL r8, 1
    pub fn shl1_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xD0);
        self.emit_u8(modrm(MODRM_REG, 4, reg.code()));
    }

    /// D0 /5 — SHR r8, 1
    pub fn shr1_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xD0);
        self.emit_u8(modrm(MODRM_REG, 5, reg.code()));
    }

    /// C1 /4 — SHL r32, imm8
    pub fn shl_r32i8(&mut self, reg: Reg64, imm: u8) {
        self.emit_u8(0xC1);
        self.emit_u8(modrm(MODRM_REG, 4, reg.code()));
        self.emit_u8(imm);
    }

    /// C1 /5 — SHR r32, imm8
    pub fn shr_r32i8(&mut self, reg: Reg64, imm: u8) {
        self.emit_u8(0xC1);
        self.emit_u8(modrm(MODRM_REG, 5, reg.code()));
        self.emit_u8(imm);
    }

    // -- compare & condition materialization --

    /// 38 /r — CMP r8, r8
    pub fn cmp_r8r8(&mut self, a: Reg8, b: Reg8) {
        self.emit_u8(0x38);
        self.emit_u8(modrm(MODRM_REG, b.code(), a.code()));
    }

    /// 80 /7 — CMP r8, imm8
    pub fn cmp_r8i8(&mut self, reg: Reg8, imm: u8) {
        self.emit_u8(0x80);
        self.emit_u8(modrm(MODRM_REG, 7, reg.code()));
        self.emit_u8(imm);
    }

    /// 81/83 /7 — CMP r32, imm
    pub fn cmp_r32i32(&mut self, reg: Reg64, imm: u32) {
        self.alu_r32i32(7, reg, imm);
    }

    /// REX.W 39 /r — CMP r64, r64
    pub fn cmp_r64r64(&mut self, a: Reg64, b: Reg64) {
        self.emit_u8(REX_W);
        self.emit_u8(0x39);
        self.emit_u8(modrm(MODRM_REG, b.code(), a.code()));
    }

    /// 80 /7 — CMP [base], imm8
    pub fn cmp_m8i8(&mut self, base: Reg64, imm: u8) {
        self.emit_u8(0x80);
        self.emit_mem(7, base, 0);
        self.emit_u8(imm);
    }

    /// 0F 92 — SETC r8
    pub fn setc_r8(&mut self, reg: Reg8) {
        self.emit_u8(0x0F);
        self.emit_u8(0x92);
        self.emit_u8(modrm(MODRM_REG, 0, reg.code()));
    }

    /// 0F 93 — SETNC r8
    pub fn setnc_r8(&mut self, reg: Reg8) {
        self.emit_u8(0x0F);
        self.emit_u8(0x93);
        self.emit_u8(modrm(MODRM_REG, 0, reg.code()));
    }

    // -- multiply / divide --

    /// F6 /4 — MUL r8 (AX = AL * r8)
    pub fn mul_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xF6);
        self.emit_u8(modrm(MODRM_REG, 4, reg.code()));
    }

    /// F6 /6 — DIV r8 (AL = AX / r8, AH = AX % r8)
    pub fn div_r8(&mut self, reg: Reg8) {
        self.emit_u8(0xF6);
        self.emit_u8(modrm(MODRM_REG, 6, reg.code()));
    }

    /// F7 /4 — MUL [base + disp] (EDX:EAX = EAX * m32)
    pub fn mul_m32_d(&mut self, base: Reg64, disp: i32) {
        self.emit_u8(0xF7);
        self.emit_mem(4, base, disp);
    }

    // -- stack --

    /// 50+rd — PUSH r64
    pub fn push_r64(&mut self, reg: Reg64) {
        self.emit_u8(0x50 + reg.code());
    }

    /// 58+rd — POP r64
    pub fn pop_r64(&mut self, reg: Reg64) {
        self.emit_u8(0x58 + reg.code());
    }

    /// 86 /r — XCHG r8, r8
    pub fn xchg_r8r8(&mut self, a: Reg8, b: Reg8) {
        self.emit_u8(0x86);
        self.emit_u8(modrm(MODRM_REG, b.code(), a.code()));
    }

    // -- control --

    /// C3 — RET
    pub fn ret(&mut self) {
        self.emit_u8(0xC3);
    }

    /// FF /2 — CALL r64
    pub fn call_r64(&mut self, reg: Reg64) {
        self.emit_u8(0xFF);
        self.emit_u8(modrm(MODRM_REG, 2, reg.code()));
    }

    /// 90 — NOP
    pub fn nop(&mut self) {
        self.emit_u8(0x90);
    }

    // -- byte swap --

    /// 0F C8+rd — BSWAP r32
    pub fn bswap_r32(&mut self, reg: Reg64) {
        self.emit_u8(0x0F);
        self.emit_u8(0xC8 + reg.code());
    }

    /// Finished-so-far code bytes (jumps still unpatched).
    pub fn code(&self) -> &[u8] {
        &self.code
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
