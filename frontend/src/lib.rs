//! CHIP-8 frontend: opcode decoding and block translation.
//!
//! The translator collects decoded opcodes into batches bounded by
//! branches and conditional skips, then drives the register allocator
//! and emitter to turn each batch into one or more executable code
//! blocks.

pub mod translator;

mod gen;
mod ir;

pub use translator::Translator;
