//! Block builder: opcode batching, skip shadows and publication.
//!
//! The dispatcher feeds opcodes through [`Translator::emit`] until a
//! batch is terminated by a branch or a completed skip shadow; the
//! batch is then lowered front-to-back into one or more code blocks,
//! split at leader nodes, and drained with [`Translator::next_block`].

use std::collections::VecDeque;

use chip86_backend::{CodeBlock, Emitter, LabelId, RegAllocator, REG_STATE};
use chip86_core::chip8::OPCODE_SIZE;
use chip86_core::{Chip8State, StateLayout};

use crate::ir::DecodedOp;

/// Guest instructions taking part in a skip after the skip opcode
/// itself: the shadowed instruction and the skip target.
const TO_COND_BRANCH: i32 = 2;

pub struct Translator {
    pub(crate) asm: Emitter,
    pub(crate) regs: RegAllocator,

    ops: VecDeque<DecodedOp>,
    blocks: VecDeque<CodeBlock>,

    /// Forward-jump label of the open skip, placed at the node marked
    /// `is_cond_branch_dest`.
    pub(crate) branch_dest: Option<LabelId>,

    ready: bool,
    condition: bool,
    countdown: i32,
    next_addr: u16,

    /// Guest-state base address baked into every block.
    pub(crate) base: u64,
    pub(crate) layout: StateLayout,
}

impl Translator {
    /// The state's address and field layout are captured here and
    /// embedded in all generated code: the state must stay pinned for
    /// as long as blocks produced by this translator are alive.
    pub fn new(state: &Chip8State) -> Translator {
        let layout = StateLayout::new();
        Translator {
            asm: Emitter::new(),
            regs: RegAllocator::new(layout.v, layout.i),
            ops: VecDeque::new(),
            blocks: VecDeque::new(),
            branch_dest: None,
            ready: false,
            condition: false,
            countdown: 0,
            next_addr: 0,
            base: state.base_addr() as u64,
            layout,
        }
    }

    /// Drop any batch in progress and all undrained blocks.
    pub fn reset(&mut self) {
        self.condition = false;
        self.ready = false;
        self.countdown = 0;
        self.branch_dest = None;
        self.asm.reset();
        self.regs.reset();
        self.ops.clear();
        self.blocks.clear();
    }

    /// Feed one opcode at `*pc`. Advances `*pc` to the next fetch
    /// address and returns true while the batch wants more opcodes;
    /// on batch completion `*pc` is rewound to the batch's start
    /// address and false is returned.
    pub fn emit(&mut self, opcode: u16, pc: &mut u16) -> bool {
        if self.ready {
            *pc = self.next_addr;
            return false;
        }

        let mut node = DecodedOp::new(*pc, opcode);
        node.in_condition = self.condition;
        self.decode(&mut node);
        self.ops.push_back(node);

        if self.condition && self.countdown == 0 {
            self.ready = true;
            self.ops.back_mut().unwrap().is_cond_branch_dest = true;
        } else if self.condition {
            self.countdown -= 1;
        }

        if self.ready {
            self.next_addr = self.ops.front().unwrap().addr;
            *pc = self.next_addr;
            self.translate();
        } else {
            *pc = self.next_addr;
        }

        !self.ready
    }

    /// Drain the next produced block, oldest first. Draining the last
    /// one resets the translator for the next batch.
    pub fn next_block(&mut self) -> Option<CodeBlock> {
        let block = self.blocks.pop_front()?;
        if self.blocks.is_empty() {
            self.reset();
        }
        Some(block)
    }

    /// Lower the collected batch into code blocks.
    fn translate(&mut self) {
        let mut op_count: u32 = 0;
        let mut first = true;
        let mut addr = self.ops.front().unwrap().addr;

        self.gen_block_prologue();

        while let Some(node) = self.ops.pop_front() {
            if !node.ignore {
                if node.is_cond_branch_dest {
                    let label = self.branch_dest.take().expect("skip produced no label");
                    self.asm.place_label(label);
                }
                if node.leader && !first {
                    // Close the current block with a forced return to
                    // the leader's address and start a fresh one.
                    self.gen_return(&node);
                    self.push_block(addr, op_count);
                    addr = node.addr;
                    op_count = 0;
                    self.regs.reset();
                    self.gen_block_prologue();
                }
                if let Some(gen) = node.gen {
                    gen(self, &node);
                }
            }
            op_count += 1;
            first = false;
        }

        self.push_block(addr, op_count);
    }

    fn push_block(&mut self, addr: u16, op_count: u32) {
        let region = self.asm.finalize().expect("out of code memory");
        self.blocks.push_back(CodeBlock::new(region, addr, op_count));
    }

    /// Every block pins the guest-state base: the push goes through
    /// the dirty discipline so each exit restores the caller's rbp.
    fn gen_block_prologue(&mut self) {
        self.regs.dirty64(&mut self.asm, REG_STATE);
        self.asm.mov_r64i64(REG_STATE, self.base);
    }

    /// Install a generator, substituting the forced return for nodes
    /// inside a skip shadow.
    fn set_gen(&mut self, node: &mut DecodedOp, gen: crate::ir::GenFn) {
        node.gen = Some(if self.condition {
            Translator::gen_return
        } else {
            gen
        });
    }

    /// Skip opcodes open a shadow covering the next two nodes.
    fn decode_skip(&mut self, node: &mut DecodedOp, gen: crate::ir::GenFn) {
        self.set_gen(node, gen);
        if !self.condition {
            self.condition = true;
            self.countdown = TO_COND_BRANCH;
        }
    }

    fn unknown(node: &mut DecodedOp) {
        node.ignore = true;
        node.gen = None;
    }

    /// Decode one opcode: fill argument fields, install the generator
    /// and update the batching state machine.
    fn decode(&mut self, node: &mut DecodedOp) {
        let op = node.opcode;
        node.x = ((op >> 8) & 0xF) as usize;
        node.y = ((op >> 4) & 0xF) as usize;
        node.kk = (op & 0xFF) as u8;
        node.nnn = op & 0x0FFF;
        node.n = (op & 0xF) as u8;

        self.next_addr = node.addr.wrapping_add(OPCODE_SIZE);

        match op & 0xF000 {
            0x0000 => match op & 0x00FF {
                0xE0 => self.set_gen(node, Translator::gen_00e0),
                0xEE => {
                    // Terminators keep their real generator even in a
                    // skip shadow; the batch only ends outside one.
                    node.gen = Some(Translator::gen_00ee);
                    self.ready = !self.condition;
                }
                _ => Self::unknown(node),
            },
            0x1000 => {
                node.gen = Some(Translator::gen_1nnn);
                self.ready = !self.condition;
            }
            0x2000 => {
                node.gen = Some(Translator::gen_2nnn);
                self.ready = !self.condition;
            }
            0x3000 => self.decode_skip(node, Translator::gen_3xnn),
            0x4000 => self.decode_skip(node, Translator::gen_4xnn),
            0x5000 => self.decode_skip(node, Translator::gen_5xy0),
            0x6000 => self.set_gen(node, Translator::gen_6xnn),
            0x7000 => self.set_gen(node, Translator::gen_7xnn),
            0x8000 => match op & 0x000F {
                0x0 => self.set_gen(node, Translator::gen_8xy0),
                0x1 => self.set_gen(node, Translator::gen_8xy1),
                0x2 => self.set_gen(node, Translator::gen_8xy2),
                0x3 => self.set_gen(node, Translator::gen_8xy3),
                0x4 => self.set_gen(node, Translator::gen_8xy4),
                0x5 => self.set_gen(node, Translator::gen_8xy5),
                0x6 => self.set_gen(node, Translator::gen_8xy6),
                0x7 => self.set_gen(node, Translator::gen_8xy7),
                0xE => self.set_gen(node, Translator::gen_8xye),
                _ => Self::unknown(node),
            },
            0x9000 => self.decode_skip(node, Translator::gen_9xy0),
            0xA000 => self.set_gen(node, Translator::gen_annn),
            0xB000 => {
                node.gen = Some(Translator::gen_bnnn);
                self.ready = !self.condition;
            }
            0xC000 => self.set_gen(node, Translator::gen_cxnn),
            0xD000 => self.set_gen(node, Translator::gen_dxyn),
            0xE000 => match op & 0x00FF {
                0x9E => self.decode_skip(node, Translator::gen_ex9e),
                0xA1 => self.decode_skip(node, Translator::gen_exa1),
                _ => Self::unknown(node),
            },
            0xF000 => match op & 0x00FF {
                0x07 => self.set_gen(node, Translator::gen_fx07),
                0x0A => {
                    // Wait-for-key always gets a block of its own: the
                    // generated code re-enters at its own address
                    // until a key is down.
                    node.leader = !self.condition;
                    self.ready = !self.condition;
                    self.set_gen(node, Translator::gen_fx0a);
                }
                0x15 => self.set_gen(node, Translator::gen_fx15),
                0x18 => self.set_gen(node, Translator::gen_fx18),
                0x1E => self.set_gen(node, Translator::gen_fx1e),
                0x29 => self.set_gen(node, Translator::gen_fx29),
                0x33 => self.set_gen(node, Translator::gen_fx33),
                0x55 => self.set_gen(node, Translator::gen_fx55),
                0x65 => self.set_gen(node, Translator::gen_fx65),
                _ => Self::unknown(node),
            },
            _ => Self::unknown(node),
        }
    }
}
