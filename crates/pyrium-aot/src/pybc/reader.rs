//! PYBC decoder.

use std::io::Read;

use super::error::{DecodeError, DecodeErrorKind};
use super::{LEGACY_VERSION, MAGIC, NO_STRING, VERSION};
use crate::compiler::ir::{Function, Module, Op};
use crate::compiler::opcode::Opcode;

/// Decodes a complete PYBC byte stream.
///
/// Current-version modules keep the pool stored in the file. Legacy
/// pool-less modules carry their strings inline and get a pool rebuilt
/// from their instructions.
pub fn decode(bytes: &[u8]) -> Result<Module, DecodeError> {
    let mut dec = Decoder::new(bytes);

    let magic = dec.read_u32()?;
    if magic != MAGIC {
        return Err(dec.err_at(0, DecodeErrorKind::BadMagic(magic)));
    }

    let version_offset = dec.pos;
    let module = match dec.read_u32()? {
        VERSION => dec.read_module()?,
        LEGACY_VERSION => dec.read_legacy_module()?,
        other => {
            return Err(dec.err_at(version_offset, DecodeErrorKind::UnsupportedVersion(other)));
        }
    };

    if dec.remaining() != 0 {
        return Err(dec.err(DecodeErrorKind::TrailingBytes(dec.remaining())));
    }
    Ok(module)
}

/// Reads a reader to the end and decodes it.
pub fn read_from<R: Read>(mut reader: R) -> crate::Result<Module> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(decode(&bytes)?)
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        self.err_at(self.pos, kind)
    }

    fn err_at(&self, offset: usize, kind: DecodeErrorKind) -> DecodeError {
        DecodeError { offset, kind }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn read_exact(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(self.err(DecodeErrorKind::UnexpectedEof));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let len = self.read_u16()? as usize;
        let bytes = self.read_exact(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| self.err_at(start, DecodeErrorKind::InvalidUtf8))
    }

    fn read_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let start = self.pos;
        let id = self.read_u32()?;
        Opcode::from_u32(id).ok_or_else(|| self.err_at(start, DecodeErrorKind::UnknownOpcode(id)))
    }

    /// Counts never exceed the bytes left, so a corrupt count cannot force a
    /// huge allocation.
    fn read_count(&mut self, min_item_size: usize) -> Result<usize, DecodeError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_item_size) > self.remaining() {
            return Err(self.err(DecodeErrorKind::UnexpectedEof));
        }
        Ok(count)
    }

    fn read_pool_ref(&mut self, pool: &[String]) -> Result<String, DecodeError> {
        let start = self.pos;
        let index = self.read_i32()?;
        if index == NO_STRING {
            return Ok(String::new());
        }
        usize::try_from(index)
            .ok()
            .and_then(|i| pool.get(i))
            .cloned()
            .ok_or_else(|| {
                self.err_at(
                    start,
                    DecodeErrorKind::PoolIndexOutOfRange {
                        index,
                        len: pool.len(),
                    },
                )
            })
    }

    fn read_module(&mut self) -> Result<Module, DecodeError> {
        let name = self.read_string()?;

        let pool_len = self.read_count(2)?;
        let mut string_pool = Vec::with_capacity(pool_len);
        for _ in 0..pool_len {
            string_pool.push(self.read_string()?);
        }

        let function_count = self.read_count(6)?;
        let mut functions = Vec::with_capacity(function_count);
        for _ in 0..function_count {
            let fn_name = self.read_string()?;
            let op_count = self.read_count(28)?;
            let mut ops = Vec::with_capacity(op_count);
            for _ in 0..op_count {
                let opcode = self.read_opcode()?;
                let a = self.read_pool_ref(&string_pool)?;
                let b = self.read_pool_ref(&string_pool)?;
                let d = self.read_f64()?;
                let i = self.read_i64()?;
                ops.push(Op { opcode, a, b, d, i });
            }
            functions.push(Function::with_instructions(fn_name, ops));
        }

        Ok(Module {
            name,
            string_pool,
            functions,
        })
    }

    // Version 1: per instruction an opcode, an inline `a` string and `d`
    fn read_legacy_module(&mut self) -> Result<Module, DecodeError> {
        let name = self.read_string()?;

        let function_count = self.read_count(6)?;
        let mut module = Module::new(name);
        for _ in 0..function_count {
            let fn_name = self.read_string()?;
            let op_count = self.read_count(14)?;
            let mut ops = Vec::with_capacity(op_count);
            for _ in 0..op_count {
                let opcode = self.read_opcode()?;
                let a = self.read_string()?;
                let d = self.read_f64()?;
                ops.push(Op::new(opcode).with_a(a).with_d(d));
            }
            module.functions.push(Function::with_instructions(fn_name, ops));
        }

        module.rebuild_pool();
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pybc::encode;
    use pretty_assertions::assert_eq;

    fn sample() -> Module {
        let mut module = Module::new("sample");
        let mut f = Function::new("on_tick");
        f.emit(Op::new(Opcode::Log).with_a("tick executed"));
        f.emit(Op::new(Opcode::MulEntitySpeed).with_a("zombie").with_d(1.5));
        f.emit(Op::new(Opcode::IfEnd));
        module.functions.push(f);
        module.rebuild_pool();
        module
    }

    #[test]
    fn test_round_trip() {
        let module = sample();
        let decoded = decode(&encode(&module).unwrap()).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = b'X';
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(matches!(err.kind, DecodeErrorKind::BadMagic(_)));
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, DecodeError {
            offset: 4,
            kind: DecodeErrorKind::UnsupportedVersion(99),
        });
    }

    #[test]
    fn test_truncated_input() {
        let bytes = encode(&sample()).unwrap();
        for cut in [0, 3, 9, bytes.len() - 1] {
            let err = decode(&bytes[..cut]).unwrap_err();
            assert_eq!(err.kind, DecodeErrorKind::UnexpectedEof, "cut at {}", cut);
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::TrailingBytes(2));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut bytes = encode(&sample()).unwrap();
        // Last instruction starts 28 bytes before the end
        let at = bytes.len() - 28;
        bytes[at..at + 4].copy_from_slice(&7u32.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, DecodeError {
            offset: at,
            kind: DecodeErrorKind::UnknownOpcode(7),
        });
    }

    #[test]
    fn test_pool_index_out_of_range() {
        let mut bytes = encode(&sample()).unwrap();
        let at = bytes.len() - 24;
        bytes[at..at + 4].copy_from_slice(&5i32.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::PoolIndexOutOfRange { index: 5, len: 2 });

        bytes[at..at + 4].copy_from_slice(&(-2i32).to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::PoolIndexOutOfRange { index: -2, .. }));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = encode(&sample()).unwrap();
        // Module name "sample" starts at byte 10
        bytes[10] = 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, DecodeError {
            offset: 8,
            kind: DecodeErrorKind::InvalidUtf8,
        });
    }

    #[test]
    fn test_huge_count_is_rejected_without_allocating() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_be_bytes());
        bytes.extend_from_slice(&VERSION.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_legacy_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_be_bytes());
        bytes.extend_from_slice(&LEGACY_VERSION.to_be_bytes());
        bytes.extend_from_slice(&[0, 3]);
        bytes.extend_from_slice(b"old");
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&[0, 7]);
        bytes.extend_from_slice(b"on_tick");
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&103u32.to_be_bytes());
        bytes.extend_from_slice(&[0, 6]);
        bytes.extend_from_slice(b"zombie");
        bytes.extend_from_slice(&2.0f64.to_bits().to_be_bytes());

        let module = decode(&bytes).unwrap();
        assert_eq!(module.name, "old");
        assert_eq!(module.string_pool, vec!["zombie".to_string()]);
        assert_eq!(
            module.functions[0].instructions(),
            &[Op::new(Opcode::MulEntitySpeed).with_a("zombie").with_d(2.0)]
        );
    }

    #[test]
    fn test_read_from() {
        let bytes = encode(&sample()).unwrap();
        let module = read_from(bytes.as_slice()).unwrap();
        assert_eq!(module, sample());
    }
}
