//! Codec error types.

use thiserror::Error;

/// A module that cannot be represented in the PYBC format.
///
/// Raised before any byte is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A length-prefixed string does not fit its u16 prefix
    #[error("{context} is {len} bytes, longer than the 65535-byte limit")]
    StringTooLong { context: String, len: usize },

    /// A count does not fit its field
    #[error("too many {context}: {count}")]
    TooMany { context: &'static str, count: usize },
}

/// A byte stream that is not a valid PYBC module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid PYBC at byte {offset}: {kind}")]
pub struct DecodeError {
    /// Byte offset of the offending field
    pub offset: usize,
    /// What went wrong
    pub kind: DecodeErrorKind,
}

/// The reason a decode failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The magic number is not `PYBC`
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),

    /// The format version is not one this reader understands
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// The input ended inside a field
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A string is not valid UTF-8
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// An instruction carries an id outside the opcode table
    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    /// An operand references a pool entry that does not exist
    #[error("string index {index} out of range for a pool of {len}")]
    PoolIndexOutOfRange { index: i32, len: usize },

    /// Bytes remain after the last function
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}
