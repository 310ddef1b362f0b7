//! The PYBC binary container.
//!
//! All multi-byte fields are big-endian:
//!
//! ```text
//! u32 magic        0x50594243 ("PYBC")
//! u32 version      2
//! str module name
//! u32 pool count,  then that many str
//! u32 function count
//!   str name
//!   u32 instruction count
//!     u32 opcode
//!     i32 a        pool index, -1 when empty
//!     i32 b        pool index, -1 when empty
//!     f64 d        IEEE-754 bits
//!     i64 i
//! ```
//!
//! where `str` is a u16 byte length followed by UTF-8.
//!
//! Encoding validates every capacity limit before producing output.
//! Decoding also accepts the pool-less version 1 layout.

mod error;
mod pool;
mod reader;
mod writer;

pub use error::{DecodeError, DecodeErrorKind, EncodeError};
pub use pool::StringPool;
pub use reader::{decode, read_from};
pub use writer::{encode, write_to};

/// The container magic, `"PYBC"` in ASCII.
pub const MAGIC: u32 = 0x5059_4243;

/// The format version written by the encoder.
pub const VERSION: u32 = 2;

/// The pool-less format still accepted by the decoder.
pub const LEGACY_VERSION: u32 = 1;

/// Longest string a u16 length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Pool reference for an empty operand.
pub const NO_STRING: i32 = -1;
