//! Block execution: the translation cache and dispatch statistics.

pub mod cache;

pub use cache::TranslationCache;

use std::fmt;

/// Counters for the dispatch loop's lookup/translate pipeline.
#[derive(Default)]
pub struct DispatchStats {
    pub ticks: u64,
    /// Ticks fully served from the cache.
    pub exec_ticks: u64,
    pub misses: u64,
    pub translated_blocks: u64,
}

impl fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== dispatch stats ===")?;
        writeln!(f, "ticks:             {}", self.ticks)?;
        writeln!(f, "executed:          {}", self.exec_ticks)?;
        writeln!(f, "cache misses:      {}", self.misses)?;
        writeln!(f, "translated blocks: {}", self.translated_blocks)?;
        Ok(())
    }
}
