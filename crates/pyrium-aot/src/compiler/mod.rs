//! Ahead-of-time compiler for mod scripts.
//!
//! Transforms the AST into the instruction model that the PYBC codec
//! serializes.
//!
//! # Module Structure
//!
//! - `opcode`: The instruction set and its reserved bands
//! - `ir`: Instructions, functions and modules
//! - `lower`: Lowering from the AST
//!   - `lower::calls`: The recognized call table
//!   - `lower::conditions`: Condition rendering
//!   - `lower::constants`: Literal evaluation and coercions

pub mod ir;
pub mod lower;
pub mod opcode;

pub use ir::{Function, Module, Op, pack_coords, unpack_coords};
pub use lower::Lowerer;
pub use opcode::{Band, Opcode, OperandSchema};
