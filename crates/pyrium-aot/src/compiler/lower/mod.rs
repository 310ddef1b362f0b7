//! Lowering from the syntax tree to the instruction model.
//!
//! The `Lowerer` walks the bodies of entry-point functions and flattens
//! recognized statements into instructions:
//!
//! - calls to names in the [`calls::CALL_RULES`] table become one
//!   instruction each
//! - `if`/`elif`/`else`, `while` and `for ... in range(...)` become
//!   bracketed `*_BEGIN` / `*_END` regions
//! - everything else is skipped
//!
//! Lowering never fails: constructs it does not understand produce no
//! instructions.

pub mod calls;
pub mod conditions;
pub mod constants;


pub use calls::{CALL_RULES, CallRule};
pub use conditions::render_condition;
pub use constants::Constant;

use tracing::{debug, trace, warn};

use crate::ast::*;
use crate::compiler::ir::{Function, Module, Op};
use crate::compiler::opcode::Opcode;

/// The entry point lowered when none is configured.
pub const DEFAULT_ENTRY_POINT: &str = "on_tick";

/// Lowers parsed programs into modules.
#[derive(Debug, Clone)]
pub struct Lowerer {
    entry_points: Vec<String>,
}

impl Lowerer {
    /// Creates a lowerer for the default `on_tick` entry point.
    pub fn new() -> Self {
        Self {
            entry_points: vec![DEFAULT_ENTRY_POINT.to_string()],
        }
    }

    /// Creates a lowerer for the given entry points. An empty list lowers
    /// every top-level function.
    pub fn with_entry_points<I, S>(entry_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entry_points: entry_points.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a lowerer that lowers every top-level function.
    pub fn all_functions() -> Self {
        Self {
            entry_points: Vec::new(),
        }
    }

    /// Returns the configured entry points.
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    fn is_entry_point(&self, name: &str) -> bool {
        self.entry_points.is_empty() || self.entry_points.iter().any(|e| e == name)
    }

    /// Lowers a program into a module with its string pool built.
    pub fn lower(&self, program: &Program, module_name: &str) -> Module {
        let mut module = Module::new(module_name);

        for def in program.functions() {
            if self.is_entry_point(&def.name.name) {
                module.functions.push(self.lower_function(def));
            } else {
                trace!(function = %def.name.name, "skipping non-entry function");
            }
        }

        if module.functions.is_empty() {
            warn!(
                module = module_name,
                entry_points = ?self.entry_points,
                "no entry-point function found"
            );
        }

        module.rebuild_pool();
        module
    }

    /// Lowers one function definition.
    pub fn lower_function(&self, def: &FunctionDef) -> Function {
        let mut builder = FunctionBuilder {
            function: Function::new(def.name.name.clone()),
        };
        builder.lower_block(&def.body);

        debug!(
            function = %def.name.name,
            instructions = builder.function.len(),
            "lowered function"
        );
        builder.function
    }
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates the instructions of one function.
struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    fn emit(&mut self, op: Op) {
        self.function.emit(op);
    }

    fn lower_block(&mut self, body: &[Statement]) {
        for stmt in body {
            self.lower_statement(stmt);
        }
    }

    fn lower_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(ExpressionStatement {
                expression: Expression::Call(call),
            }) => self.lower_call(call),
            Statement::If(if_stmt) => self.lower_if(if_stmt),
            Statement::While(while_stmt) => self.lower_while(while_stmt),
            Statement::For(for_stmt) => self.lower_for(for_stmt),
            _ => {}
        }
    }

    fn lower_call(&mut self, call: &CallExpression) {
        let Some(name) = call.callee.as_name() else {
            trace!("dropping call to a non-name callee");
            return;
        };

        let Some(rule) = calls::lookup(name) else {
            trace!(callee = name, "dropping unrecognized call");
            return;
        };

        match rule.apply(&call.arguments) {
            Some(op) => self.emit(op),
            None => trace!(
                callee = name,
                given = call.arguments.len(),
                required = rule.arity,
                "dropping call with too few arguments"
            ),
        }
    }

    fn lower_if(&mut self, stmt: &IfStatement) {
        self.emit(Op::new(Opcode::IfBegin).with_a(render_condition(&stmt.test)));
        self.lower_block(&stmt.body);
        if !stmt.orelse.is_empty() {
            self.emit(Op::new(Opcode::IfElse));
            self.lower_block(&stmt.orelse);
        }
        self.emit(Op::new(Opcode::IfEnd));
    }

    fn lower_while(&mut self, stmt: &WhileStatement) {
        let condition = render_condition(&stmt.test);
        self.emit(Op::new(Opcode::WhileBegin).with_a(condition.clone()));
        self.emit(Op::new(Opcode::WhileCheck).with_a(condition));
        self.lower_block(&stmt.body);
        self.emit(Op::new(Opcode::WhileEnd));
    }

    fn lower_for(&mut self, stmt: &ForStatement) {
        let Some(range) = RangeLoop::match_statement(stmt) else {
            trace!("skipping for loop that is not over range()");
            return;
        };

        self.emit(
            Op::new(Opcode::ForInit)
                .with_a(range.var)
                .with_i(range.start),
        );
        self.emit(
            Op::new(Opcode::ForIter)
                .with_a(range.var)
                .with_i(range.end)
                .with_d(range.step),
        );
        self.lower_block(&stmt.body);
        self.emit(Op::new(Opcode::ForEnd).with_a(range.var));
    }
}

/// A `for <name> in range(...)` loop header.
#[derive(Debug, Clone, PartialEq)]
struct RangeLoop<'a> {
    var: &'a str,
    start: i64,
    end: i64,
    step: f64,
}

impl<'a> RangeLoop<'a> {
    fn match_statement(stmt: &'a ForStatement) -> Option<Self> {
        let var = stmt.target.as_name()?;
        let Expression::Call(call) = &stmt.iter else {
            return None;
        };
        if call.callee.as_name() != Some("range") {
            return None;
        }

        let args = &call.arguments;
        let value = |index: usize| Constant::evaluate(&args[index]);
        let (start, end, step) = match args.len() {
            0 => return None,
            1 => (0, value(0).to_int(), 1.0),
            2 => (value(0).to_int(), value(1).to_int(), 1.0),
            _ => (value(0).to_int(), value(1).to_int(), value(2).to_float()),
        };

        Some(Self {
            var,
            start,
            end,
            step,
        })
    }
}
