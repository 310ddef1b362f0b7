//! Literal constant evaluation and operand coercions.

use crate::ast::{Expression, Literal, UnaryOperator};

/// The value of a call argument as seen by the lowering pass.
///
/// Anything that is not a literal evaluates to [`Constant::Dynamic`], which
/// coerces to `""`, `0` or `0.0` depending on the operand it feeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant<'a> {
    /// String literal
    Str(&'a str),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// True / False
    Bool(bool),
    /// None
    None,
    /// Not a compile-time constant
    Dynamic,
}

impl<'a> Constant<'a> {
    /// Evaluates an expression. A sign applied to a numeric literal folds
    /// into the literal.
    pub fn evaluate(expr: &'a Expression) -> Self {
        match expr {
            Expression::Literal(literal) => Self::from_literal(literal),
            Expression::Unary(unary) => match (unary.operator, Self::evaluate(&unary.operand)) {
                (UnaryOperator::USub, Constant::Int(n)) => Constant::Int(n.wrapping_neg()),
                (UnaryOperator::USub, Constant::Float(f)) => Constant::Float(-f),
                (UnaryOperator::UAdd, c @ (Constant::Int(_) | Constant::Float(_))) => c,
                _ => Constant::Dynamic,
            },
            _ => Constant::Dynamic,
        }
    }

    /// Converts a literal node.
    pub fn from_literal(literal: &'a Literal) -> Self {
        match literal {
            Literal::String(s) => Constant::Str(s),
            Literal::Int(n) => Constant::Int(*n),
            Literal::Float(f) => Constant::Float(*f),
            Literal::Boolean(b) => Constant::Bool(*b),
            Literal::None => Constant::None,
        }
    }

    /// Returns true for anything but [`Constant::Dynamic`].
    pub fn is_constant(&self) -> bool {
        !matches!(self, Constant::Dynamic)
    }

    /// Coerces to a string operand.
    pub fn to_operand_string(&self) -> String {
        match *self {
            Constant::Str(s) => s.to_string(),
            Constant::Int(n) => n.to_string(),
            Constant::Float(f) => format_float(f),
            Constant::Bool(true) => "True".to_string(),
            Constant::Bool(false) => "False".to_string(),
            Constant::None => "None".to_string(),
            Constant::Dynamic => String::new(),
        }
    }

    /// Coerces to an integer operand. Floats truncate toward zero.
    pub fn to_int(&self) -> i64 {
        match *self {
            Constant::Int(n) => n,
            Constant::Float(f) => f.trunc() as i64,
            Constant::Bool(b) => i64::from(b),
            Constant::Str(s) => parse_int(s),
            Constant::None | Constant::Dynamic => 0,
        }
    }

    /// Coerces to a float operand.
    pub fn to_float(&self) -> f64 {
        match *self {
            Constant::Int(n) => n as f64,
            Constant::Float(f) => f,
            Constant::Bool(true) => 1.0,
            Constant::Bool(false) => 0.0,
            Constant::Str(s) => s.trim().parse().unwrap_or(0.0),
            Constant::None | Constant::Dynamic => 0.0,
        }
    }
}

fn parse_int(s: &str) -> i64 {
    let s = s.trim();
    let digits: String = s.chars().filter(|c| *c != '_').collect();
    if let Ok(n) = digits.parse::<i64>() {
        return n;
    }
    match digits.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => 0,
    }
}

/// Formats a float the way the scripting language's `str()` does: always
/// with a fractional part or exponent, switching to exponent form below
/// `1e-4` and from `1e16` up.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let rendered = format!("{:e}", value);
        let (mantissa, exponent) = rendered.split_once('e').unwrap_or((&rendered, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let rendered = value.to_string();
    if rendered.contains('.') {
        rendered
    } else {
        format!("{}.0", rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Identifier, UnaryExpression};

    fn lit(literal: Literal) -> Expression {
        Expression::Literal(literal)
    }

    fn neg(expr: Expression) -> Expression {
        Expression::Unary(UnaryExpression {
            operator: UnaryOperator::USub,
            operand: Box::new(expr),
        })
    }

    #[test]
    fn test_non_literals_are_dynamic() {
        let name = Expression::Name(Identifier::new("player"));
        let c = Constant::evaluate(&name);
        assert_eq!(c, Constant::Dynamic);
        assert_eq!(c.to_operand_string(), "");
        assert_eq!(c.to_int(), 0);
        assert_eq!(c.to_float(), 0.0);
    }

    #[test]
    fn test_negative_literals_fold() {
        assert_eq!(Constant::evaluate(&neg(lit(Literal::Int(5)))), Constant::Int(-5));
        assert_eq!(Constant::evaluate(&neg(lit(Literal::Float(0.5)))), Constant::Float(-0.5));
        assert_eq!(Constant::evaluate(&neg(neg(lit(Literal::Int(2))))), Constant::Int(2));
        assert_eq!(Constant::evaluate(&neg(lit(Literal::String("x".into())))), Constant::Dynamic);
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(Constant::Int(42).to_operand_string(), "42");
        assert_eq!(Constant::Float(2.0).to_operand_string(), "2.0");
        assert_eq!(Constant::Bool(true).to_operand_string(), "True");
        assert_eq!(Constant::None.to_operand_string(), "None");
        assert_eq!(Constant::Str("zombie").to_operand_string(), "zombie");
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(Constant::Float(2.9).to_int(), 2);
        assert_eq!(Constant::Float(-2.9).to_int(), -2);
        assert_eq!(Constant::Bool(true).to_int(), 1);
        assert_eq!(Constant::Str(" 12 ").to_int(), 12);
        assert_eq!(Constant::Str("3.7").to_int(), 3);
        assert_eq!(Constant::Str("many").to_int(), 0);
        assert_eq!(Constant::None.to_int(), 0);
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(Constant::Int(3).to_float(), 3.0);
        assert_eq!(Constant::Str("1.5").to_float(), 1.5);
        assert_eq!(Constant::Str("fast").to_float(), 0.0);
        assert_eq!(Constant::Bool(false).to_float(), 0.0);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(1.25), "1.25");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(123456.0), "123456.0");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }
}
