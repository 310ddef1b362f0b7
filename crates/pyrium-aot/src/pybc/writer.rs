//! PYBC encoder.

use std::io::Write;

use super::error::EncodeError;
use super::pool::StringPool;
use super::{MAGIC, MAX_STRING_LEN, VERSION};
use crate::compiler::ir::{Module, Op};

/// Encodes a module into a byte vector.
///
/// All capacity limits are checked while building the buffer, so an error
/// means no bytes were produced.
pub fn encode(module: &Module) -> Result<Vec<u8>, EncodeError> {
    let pool = StringPool::collect(module);
    let mut enc = Encoder::new();
    enc.write_module(module, &pool)?;
    Ok(enc.finish())
}

/// Encodes a module and writes it to `writer` with a single `write_all`.
pub fn write_to<W: Write>(module: &Module, mut writer: W) -> crate::Result<()> {
    let bytes = encode(module)?;
    writer.write_all(&bytes)?;
    Ok(())
}

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_be_bytes());
    }

    fn write_count(&mut self, count: usize, context: &'static str) -> Result<(), EncodeError> {
        let count = u32::try_from(count).map_err(|_| EncodeError::TooMany { context, count })?;
        self.write_u32(count);
        Ok(())
    }

    fn write_string(&mut self, s: &str, context: impl FnOnce() -> String) -> Result<(), EncodeError> {
        if s.len() > MAX_STRING_LEN {
            return Err(EncodeError::StringTooLong {
                context: context(),
                len: s.len(),
            });
        }
        self.write_u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn write_module(&mut self, module: &Module, pool: &StringPool<'_>) -> Result<(), EncodeError> {
        // Indices are signed on the wire, with -1 reserved for "no string"
        if pool.len() > i32::MAX as usize {
            return Err(EncodeError::TooMany {
                context: "pool strings",
                count: pool.len(),
            });
        }

        self.write_u32(MAGIC);
        self.write_u32(VERSION);
        self.write_string(&module.name, || "module name".to_string())?;

        self.write_count(pool.len(), "pool strings")?;
        for (index, s) in pool.iter().enumerate() {
            self.write_string(s, || format!("pool string #{}", index))?;
        }

        self.write_count(module.functions.len(), "functions")?;
        for function in &module.functions {
            self.write_string(&function.name, || format!("function name '{}'", function.name))?;
            self.write_count(function.len(), "instructions")?;
            for op in function.instructions() {
                self.write_op(op, pool);
            }
        }

        Ok(())
    }

    fn write_op(&mut self, op: &Op, pool: &StringPool<'_>) {
        self.write_u32(op.opcode.id());
        self.write_i32(pool.reference(&op.a));
        self.write_i32(pool.reference(&op.b));
        self.write_f64(op.d);
        self.write_i64(op.i);
    }
}
