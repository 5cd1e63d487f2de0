//! Tree -> per-track/per-group 32-bit instruction buffers, symbol
//! resolution and group-jump validation.
//!
//! [`Compiler`] walks a [`crate::parse::Node`] tree twice over: a node that
//! names a definition keyword (`track`, `instr`, `samp`, `wave`, `grp`) is
//! dispatched to its own sub-compiler; anything else compiles directly into
//! the byte code of whatever [`Scope`] is currently open. [`link`] then
//! validates every `g`-command [`crate::compile::instruction::Instruction::Call`]
//! emitted during compilation against the finished symbol tables.

pub mod command;
pub mod compiler;
pub mod instruction;
pub mod link;
pub mod model;
pub mod sequence;
pub mod slots;
pub mod symbols;

pub use compiler::{CompileOutput, Compiler, JumpSite, Scope};
pub use link::link;
