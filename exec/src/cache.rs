//! Direct-mapped translation cache.
//!
//! CHIP-8 addresses occupy 12 bits, so a 4096-slot table gives O(1)
//! lookup with no hashing and at most one block per guest address.

use chip86_backend::CodeBlock;
use chip86_core::chip8::MEM_SIZE;

/// Table length: one slot per possible guest address.
pub const TABLE_SIZE: usize = MEM_SIZE;

pub struct TranslationCache {
    table: Vec<Option<CodeBlock>>,
    count: usize,
}

impl TranslationCache {
    pub fn new() -> TranslationCache {
        let mut table = Vec::with_capacity(TABLE_SIZE);
        table.resize_with(TABLE_SIZE, || None);
        TranslationCache { table, count: 0 }
    }

    #[inline]
    fn slot(pc: u16) -> usize {
        pc as usize & (TABLE_SIZE - 1)
    }

    /// Execute the block at `pc`, storing the produced PC back.
    /// Returns false (pc untouched) when the slot is empty.
    ///
    /// # Safety
    /// The guest state every cached block was translated against must
    /// still be alive at its original address.
    pub unsafe fn execute(&self, pc: &mut u16) -> bool {
        match &self.table[Self::slot(*pc)] {
            Some(block) => {
                *pc = block.invoke();
                true
            }
            None => false,
        }
    }

    /// Execute blocks starting at `pc` until at least `opcount` guest
    /// instructions have run. Returns false on a cache miss, with
    /// `pc` left at the missing address.
    ///
    /// # Safety
    /// As for [`Self::execute`].
    pub unsafe fn execute_n(&self, pc: &mut u16, opcount: u32) -> bool {
        let mut ops = 0;
        loop {
            let block = match &self.table[Self::slot(*pc)] {
                Some(block) => block,
                None => return false,
            };
            ops += block.op_count();
            *pc = block.invoke();
            if ops >= opcount {
                return true;
            }
        }
    }

    /// Install a block in its slot. When the slot is occupied the
    /// block is handed back to the caller.
    pub fn insert(&mut self, block: CodeBlock) -> Result<(), CodeBlock> {
        let slot = Self::slot(block.addr());
        if self.table[slot].is_some() {
            return Err(block);
        }
        self.table[slot] = Some(block);
        self.count += 1;
        Ok(())
    }

    /// Install a block, dropping any prior occupant.
    pub fn replace(&mut self, block: CodeBlock) {
        let slot = Self::slot(block.addr());
        if self.table[slot].is_none() {
            self.count += 1;
        }
        self.table[slot] = Some(block);
    }

    /// Drop the block at `addr`, if any.
    pub fn remove(&mut self, addr: u16) {
        let slot = Self::slot(addr);
        if self.table[slot].take().is_some() {
            self.count -= 1;
        }
    }

    pub fn exists(&self, addr: u16) -> bool {
        self.table[Self::slot(addr)].is_some()
    }

    pub fn get(&self, addr: u16) -> Option<&CodeBlock> {
        self.table[Self::slot(addr)].as_ref()
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drop every block.
    pub fn flush(&mut self) {
        for slot in &mut self.table {
            *slot = None;
        }
        self.count = 0;
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}
