//! CHIP-8 machine definitions and guest state.
//!
//! The state struct is plain data shared with generated host code:
//! the translator bakes its base address and field displacements into
//! every code block, so it must stay pinned (boxed, never moved) for
//! as long as translated blocks exist.

pub mod chip8;
pub mod state;

pub use state::{Chip8State, StateLayout};
