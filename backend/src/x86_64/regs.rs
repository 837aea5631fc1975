//! x86-64 register definitions and the register roles used by
//! generated blocks.
//!
//! The byte pool is the eight legacy 8-bit registers. The high-byte
//! forms (AH/CH/DH/BH) are only encodable without a REX prefix, so no
//! byte instruction in the emitter ever emits one; the 64-bit side is
//! restricted to RAX..RDI for the same reason.

/// 8-bit register pool, in ModR/M encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg8 {
    Al = 0,
    Cl = 1,
    Dl = 2,
    Bl = 3,
    Ah = 4,
    Ch = 5,
    Dh = 6,
    Bh = 7,
}

/// Number of allocatable byte registers.
pub const NUM_REG8: usize = 8;

impl Reg8 {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// The 64-bit register containing this byte register
    /// (AL and AH both live in RAX, and so on).
    #[inline]
    pub const fn container(self) -> Reg64 {
        Reg64::from_code(self.code() & 0x3)
    }

    pub const fn from_code(code: u8) -> Reg8 {
        match code {
            0 => Reg8::Al,
            1 => Reg8::Cl,
            2 => Reg8::Dl,
            3 => Reg8::Bl,
            4 => Reg8::Ah,
            5 => Reg8::Ch,
            6 => Reg8::Dh,
            7 => Reg8::Bh,
            _ => panic!("bad byte register code"),
        }
    }
}

/// 64-bit registers reachable without a REX.B prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg64 {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
}

/// Number of tracked 64-bit registers.
pub const NUM_REG64: usize = 8;

impl Reg64 {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Reg64 {
        match code {
            0 => Reg64::Rax,
            1 => Reg64::Rcx,
            2 => Reg64::Rdx,
            3 => Reg64::Rbx,
            4 => Reg64::Rsp,
            5 => Reg64::Rbp,
            6 => Reg64::Rsi,
            7 => Reg64::Rdi,
            _ => panic!("bad register code"),
        }
    }
}

/// Guest-state base pointer, loaded by every block's prologue.
pub const REG_STATE: Reg64 = Reg64::Rbp;

/// Holds the CHIP-8 I register while allocated.
pub const REG_INDEX: Reg64 = Reg64::Rsi;

/// Scratch register for address arithmetic and spills.
pub const REG_TMP: Reg64 = Reg64::Rdi;

/// Return register; carries the next guest PC and is exempt from the
/// dirty save/restore discipline.
pub const REG_RET: Reg64 = Reg64::Rax;
