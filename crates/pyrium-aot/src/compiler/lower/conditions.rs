//! Rendering of loop and branch conditions into the text form the runtime
//! evaluates.

use super::constants::Constant;
use crate::ast::Expression;

/// Renders a condition expression.
///
/// Comparisons and binary operations become `"<left> <OpName> <right>"`
/// (only the first link of a comparison chain is kept), names render as
/// the identifier, literals as their string form. Anything else falls back
/// to the node's structural dump.
pub fn render_condition(expr: &Expression) -> String {
    match expr {
        Expression::Compare(cmp) => match (cmp.operators.first(), cmp.comparators.first()) {
            (Some(op), Some(right)) => format!(
                "{} {} {}",
                render_condition(&cmp.left),
                op.name(),
                render_condition(right)
            ),
            _ => render_condition(&cmp.left),
        },
        Expression::Binary(bin) => format!(
            "{} {} {}",
            render_condition(&bin.left),
            bin.operator.name(),
            render_condition(&bin.right)
        ),
        Expression::Name(id) => id.name.clone(),
        _ => {
            let constant = Constant::evaluate(expr);
            if constant.is_constant() {
                constant.to_operand_string()
            } else {
                format!("{:?}", expr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::ast::Statement;

    fn condition_of(src: &str) -> String {
        let source = format!("if {}:\n    pass\n", src);
        let program = Parser::new(&source).parse_program().unwrap();
        match &program.body[0] {
            Statement::If(stmt) => render_condition(&stmt.test),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_render_comparison() {
        assert_eq!(condition_of("x < 10"), "x Lt 10");
        assert_eq!(condition_of("hp >= 0.5"), "hp GtE 0.5");
        assert_eq!(condition_of("mode == 'night'"), "mode Eq night");
        assert_eq!(condition_of("a is not None"), "a IsNot None");
        assert_eq!(condition_of("item not in bag"), "item NotIn bag");
    }

    #[test]
    fn test_render_keeps_first_link_of_chain() {
        assert_eq!(condition_of("0 < x < 10"), "0 Lt x");
    }

    #[test]
    fn test_render_binary_nested() {
        assert_eq!(condition_of("a + b * 2 > limit"), "a Add b Mult 2 Gt limit");
        assert_eq!(condition_of("flags & 4"), "flags BitAnd 4");
    }

    #[test]
    fn test_render_names_and_literals() {
        assert_eq!(condition_of("running"), "running");
        assert_eq!(condition_of("True"), "True");
        assert_eq!(condition_of("x > -1"), "x Gt -1");
    }

    #[test]
    fn test_render_fallback_is_structural_dump() {
        let rendered = condition_of("ready()");
        assert!(rendered.starts_with("Call("), "got {}", rendered);
        assert!(rendered.contains("ready"));

        let rendered = condition_of("a and b");
        assert!(rendered.starts_with("BoolOp("), "got {}", rendered);
    }
}
