//! The in-memory instruction model produced by lowering.

use super::opcode::Opcode;
use crate::pybc::StringPool;

/// A single instruction.
///
/// The operand record is flat: which fields carry meaning depends on the
/// opcode (see [`Opcode::schema`]). Unused fields keep their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    /// The operation code
    pub opcode: Opcode,
    /// Primary string operand
    pub a: String,
    /// Secondary string operand
    pub b: String,
    /// Float operand
    pub d: f64,
    /// Integer operand
    pub i: i64,
}

impl Op {
    /// Creates an instruction with all operands at their defaults.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            a: String::new(),
            b: String::new(),
            d: 0.0,
            i: 0,
        }
    }

    /// Sets the primary string operand.
    pub fn with_a(mut self, a: impl Into<String>) -> Self {
        self.a = a.into();
        self
    }

    /// Sets the secondary string operand.
    pub fn with_b(mut self, b: impl Into<String>) -> Self {
        self.b = b.into();
        self
    }

    /// Sets the float operand.
    pub fn with_d(mut self, d: f64) -> Self {
        self.d = d;
        self
    }

    /// Sets the integer operand.
    pub fn with_i(mut self, i: i64) -> Self {
        self.i = i;
        self
    }

    /// Returns true if every field outside the opcode's schema is at its
    /// default. Opcodes without a schema always conform.
    pub fn conforms_to_schema(&self) -> bool {
        let Some(schema) = self.opcode.schema() else {
            return true;
        };
        (schema.a || self.a.is_empty())
            && (schema.b || self.b.is_empty())
            && (schema.d || self.d.to_bits() == 0)
            && (schema.i || self.i == 0)
    }
}

/// A lowered function: a name and a flat instruction sequence.
///
/// Instructions can only be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name
    pub name: String,
    instructions: Vec<Op>,
}

impl Function {
    /// Creates an empty function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }

    /// Creates a function from an already built instruction sequence.
    pub fn with_instructions(name: impl Into<String>, instructions: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            instructions,
        }
    }

    /// Appends an instruction and returns its index.
    pub fn emit(&mut self, op: Op) -> usize {
        let index = self.instructions.len();
        self.instructions.push(op);
        index
    }

    /// Returns the instruction sequence.
    pub fn instructions(&self) -> &[Op] {
        &self.instructions
    }

    /// Returns the number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the function has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// A compilation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Distinct non-empty operand strings in first-seen order
    pub string_pool: Vec<String>,
    /// Functions in source order
    pub functions: Vec<Function>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Recomputes `string_pool` from the current functions.
    pub fn rebuild_pool(&mut self) {
        self.string_pool = StringPool::collect(self).into_strings();
    }

    /// Looks up a function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Total instruction count across all functions.
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(Function::len).sum()
    }
}

/// Packs three coordinates into one integer, 16 bits each, with the top
/// 16 bits zero. Components outside the 16-bit range wrap.
pub fn pack_coords(x: i64, y: i64, z: i64) -> i64 {
    (x & 0xFFFF) | ((y & 0xFFFF) << 16) | ((z & 0xFFFF) << 32)
}

/// Splits a packed coordinate back into sign-extended components.
pub fn unpack_coords(packed: i64) -> (i16, i16, i16) {
    let x = (packed & 0xFFFF) as u16 as i16;
    let y = ((packed >> 16) & 0xFFFF) as u16 as i16;
    let z = ((packed >> 32) & 0xFFFF) as u16 as i16;
    (x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_builder() {
        let op = Op::new(Opcode::GiveItem).with_a("Steve").with_b("diamond").with_i(3);
        assert_eq!(op.a, "Steve");
        assert_eq!(op.b, "diamond");
        assert_eq!(op.d, 0.0);
        assert_eq!(op.i, 3);
        assert!(op.conforms_to_schema());
    }

    #[test]
    fn test_schema_violation_detected() {
        let op = Op::new(Opcode::Log).with_a("hi").with_i(1);
        assert!(!op.conforms_to_schema());
        assert!(Op::new(Opcode::HttpGet).with_a("x").with_i(1).conforms_to_schema());
    }

    #[test]
    fn test_function_emit_returns_index() {
        let mut f = Function::new("on_tick");
        assert_eq!(f.emit(Op::new(Opcode::Nop)), 0);
        assert_eq!(f.emit(Op::new(Opcode::Nop)), 1);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_pack_coords() {
        assert_eq!(pack_coords(10, 64, -5), 0x0000_FFFB_0040_000A);
        assert_eq!(pack_coords(0, 0, 0), 0);
        assert_eq!(pack_coords(-1, -1, -1), 0x0000_FFFF_FFFF_FFFF);
        // Wraps outside 16 bits
        assert_eq!(pack_coords(0x1_0001, 0, 0), 1);
    }

    #[test]
    fn test_unpack_coords() {
        assert_eq!(unpack_coords(pack_coords(10, 64, -5)), (10, 64, -5));
        assert_eq!(unpack_coords(pack_coords(-32768, 32767, 0)), (-32768, 32767, 0));
    }

    #[test]
    fn test_rebuild_pool_first_seen_order() {
        let mut module = Module::new("m");
        let mut f = Function::new("on_tick");
        f.emit(Op::new(Opcode::GiveItem).with_a("p").with_b("q"));
        f.emit(Op::new(Opcode::Log).with_a("q"));
        f.emit(Op::new(Opcode::IfEnd));
        module.functions.push(f);
        module.rebuild_pool();
        assert_eq!(module.string_pool, vec!["p".to_string(), "q".to_string()]);
    }
}
