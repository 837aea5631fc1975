//! Decoded-opcode IR nodes.
//!
//! Nodes live for the duration of one translation batch. Each carries
//! its generator as a plain function pointer; a node decoded inside a
//! skip shadow has its generator swapped for the forced return, and an
//! unknown opcode has none at all.

use crate::translator::Translator;

/// Code generator for one decoded opcode.
pub(crate) type GenFn = fn(&mut Translator, &DecodedOp);

/// One decoded guest instruction.
pub(crate) struct DecodedOp {
    /// Guest address of this instruction.
    pub addr: u16,
    pub opcode: u16,

    // Decoded argument fields; the decoder fills the ones the opcode
    // actually has.
    pub x: usize,
    pub y: usize,
    pub kk: u8,
    pub nnn: u16,
    pub n: u8,

    /// Decoded while a skip shadow was open.
    pub in_condition: bool,
    /// Target of the preceding skip's forward jump.
    pub is_cond_branch_dest: bool,
    /// Starts a new basic block within the batch.
    pub leader: bool,
    /// Unknown opcode: contributes no code.
    pub ignore: bool,

    pub gen: Option<GenFn>,
}

impl DecodedOp {
    pub fn new(addr: u16, opcode: u16) -> DecodedOp {
        DecodedOp {
            addr,
            opcode,
            x: 0,
            y: 0,
            kk: 0,
            nnn: 0,
            n: 0,
            in_condition: false,
            is_cond_branch_dest: false,
            leader: false,
            ignore: false,
            gen: None,
        }
    }
}
