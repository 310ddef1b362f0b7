//! Text listings of modules.
//!
//! ```text
//! module demo
//! pool:
//!   #0   "x Gt 1"
//!   #1   "hot"
//!
//! on_tick:
//!   0000  IF_BEGIN a="x Gt 1"
//!   0001    LOG a="hot"
//!   0002  IF_END
//! ```
//!
//! Only the operand fields in an opcode's schema are shown; opcodes without
//! a schema show every field that is not at its default. Packed coordinates
//! are shown unpacked.

use std::fmt::{self, Write};

use crate::compiler::ir::{Module, Op, unpack_coords};
use crate::compiler::lower::constants::format_float;
use crate::compiler::opcode::{Opcode, OperandSchema};

/// Renders a full module listing.
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_listing(module, &mut out);
    out
}

/// Writes a full module listing.
pub fn write_listing<W: Write>(module: &Module, out: &mut W) -> fmt::Result {
    writeln!(out, "module {}", module.name)?;

    if module.string_pool.is_empty() {
        writeln!(out, "pool: (empty)")?;
    } else {
        writeln!(out, "pool:")?;
        for (index, s) in module.string_pool.iter().enumerate() {
            writeln!(out, "  #{:<3} {:?}", index, s)?;
        }
    }

    for function in &module.functions {
        writeln!(out)?;
        writeln!(out, "{}:", function.name)?;
        if function.is_empty() {
            writeln!(out, "  (no instructions)")?;
            continue;
        }

        let mut depth = 0usize;
        for (index, op) in function.instructions().iter().enumerate() {
            let (print_depth, next_depth) = match op.opcode {
                Opcode::IfBegin | Opcode::WhileCheck | Opcode::ForIter => (depth, depth + 1),
                Opcode::IfElse => (depth.saturating_sub(1), depth),
                Opcode::IfEnd | Opcode::WhileEnd | Opcode::ForEnd => {
                    let d = depth.saturating_sub(1);
                    (d, d)
                }
                _ => (depth, depth),
            };
            writeln!(
                out,
                "  {:04}  {}{}",
                index,
                "  ".repeat(print_depth),
                format_op(op)
            )?;
            depth = next_depth;
        }
    }

    Ok(())
}

/// Renders one instruction: its name followed by its meaningful operands.
pub fn format_op(op: &Op) -> String {
    let schema = op.opcode.schema().unwrap_or(OperandSchema {
        a: !op.a.is_empty(),
        b: !op.b.is_empty(),
        d: op.d.to_bits() != 0,
        i: op.i != 0,
    });

    let mut line = op.opcode.name().to_string();
    if schema.a {
        let _ = write!(line, " a={:?}", op.a);
    }
    if schema.b {
        let _ = write!(line, " b={:?}", op.b);
    }
    if schema.d {
        let _ = write!(line, " d={}", format_float(op.d));
    }
    if schema.i {
        if carries_coords(op.opcode) {
            let (x, y, z) = unpack_coords(op.i);
            let _ = write!(line, " xyz=({}, {}, {})", x, y, z);
        } else {
            let _ = write!(line, " i={}", op.i);
        }
    }
    line
}

fn carries_coords(opcode: Opcode) -> bool {
    matches!(opcode, Opcode::SetBlock | Opcode::SpawnCustomMob)
}
