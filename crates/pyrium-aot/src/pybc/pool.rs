//! String interning for the operand pool.

use rustc_hash::FxHashMap;

use crate::compiler::ir::Module;

/// Deduplicated operand strings in first-seen order.
///
/// Empty strings are never interned; they encode as index `-1`.
#[derive(Debug, Default)]
pub struct StringPool<'a> {
    strings: Vec<&'a str>,
    indices: FxHashMap<&'a str, u32>,
}

impl<'a> StringPool<'a> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns every non-empty `a`/`b` operand of a module, visiting
    /// functions in order, then instructions in order, `a` before `b`.
    pub fn collect(module: &'a Module) -> Self {
        let mut pool = Self::new();
        for function in &module.functions {
            for op in function.instructions() {
                pool.intern(&op.a);
                pool.intern(&op.b);
            }
        }
        pool
    }

    /// Interns a string and returns its index, or `None` for the empty
    /// string.
    pub fn intern(&mut self, s: &'a str) -> Option<u32> {
        if s.is_empty() {
            return None;
        }
        if let Some(&index) = self.indices.get(s) {
            return Some(index);
        }
        let index = self.strings.len() as u32;
        self.strings.push(s);
        self.indices.insert(s, index);
        Some(index)
    }

    /// Returns the wire reference for a string: its index, or `-1` when
    /// empty or not interned.
    pub fn reference(&self, s: &str) -> i32 {
        if s.is_empty() {
            return super::NO_STRING;
        }
        self.indices
            .get(s)
            .and_then(|&index| i32::try_from(index).ok())
            .unwrap_or(super::NO_STRING)
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if nothing is interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterates over the interned strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.strings.iter().copied()
    }

    /// Converts into owned strings in index order.
    pub fn into_strings(self) -> Vec<String> {
        self.strings.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Function, Op};
    use crate::compiler::opcode::Opcode;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern("a"), Some(0));
        assert_eq!(pool.intern("b"), Some(1));
        assert_eq!(pool.intern("a"), Some(0));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_empty_string_is_never_interned() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(""), None);
        assert!(pool.is_empty());
        assert_eq!(pool.reference(""), -1);
    }

    #[test]
    fn test_collect_order_spans_functions() {
        let mut module = Module::new("m");
        let mut first = Function::new("f");
        first.emit(Op::new(Opcode::SetCustomMobAttr).with_a("demon").with_b("health"));
        let mut second = Function::new("g");
        second.emit(Op::new(Opcode::Log).with_a("health"));
        second.emit(Op::new(Opcode::Broadcast).with_a("hi"));
        module.functions.push(first);
        module.functions.push(second);

        let pool = StringPool::collect(&module);
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec!["demon", "health", "hi"]);
        assert_eq!(pool.reference("hi"), 2);
        assert_eq!(pool.reference("absent"), -1);
    }
}
