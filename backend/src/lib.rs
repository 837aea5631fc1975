//! x86-64 host backend: machine-code emitter, executable memory,
//! register allocator and the executable block handle.
//!
//! The emitter is a streaming assembler with symbolic labels; the
//! allocator maps CHIP-8 registers onto the eight legacy byte
//! registers and drives the emitter to produce spill/fill code. Both
//! are passed explicitly through the translator's generate calls —
//! neither holds a reference to the other.

pub mod code_block;
pub mod exec_mem;
pub mod regalloc;
pub mod x86_64;

pub use code_block::CodeBlock;
pub use exec_mem::ExecRegion;
pub use regalloc::RegAllocator;
pub use x86_64::emitter::{Emitter, JumpKind, LabelId};
pub use x86_64::regs::{Reg64, Reg8, REG_INDEX, REG_RET, REG_STATE, REG_TMP};
