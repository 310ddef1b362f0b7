//! Abstract Syntax Tree (AST) definitions for mod scripts.
//!
//! Node shapes and operator names mirror the host language's own `ast`
//! module, so condition strings rendered from these nodes read the same
//! way a runtime expects them (`x Lt 10`, `a Add b`).

/// A complete script module.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The top-level statements
    pub body: Vec<Statement>,
}

impl Program {
    /// Iterates over the top-level function definitions in source order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|stmt| match stmt {
            Statement::FunctionDef(def) => Some(def),
            _ => None,
        })
    }
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
}

impl Identifier {
    /// Creates an identifier from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Function definition
    FunctionDef(FunctionDef),
    /// Expression statement
    Expression(ExpressionStatement),
    /// If statement (`elif` nests another If in `orelse`)
    If(IfStatement),
    /// While statement
    While(WhileStatement),
    /// For statement
    For(ForStatement),
    /// Assignment (`a = b = value`)
    Assign(AssignStatement),
    /// Augmented assignment (`a += value`)
    AugAssign(AugAssignStatement),
    /// Return statement
    Return(ReturnStatement),
    /// Import statement (`import a.b` or `from a import b`)
    Import(ImportStatement),
    /// pass
    Pass,
    /// break
    Break,
    /// continue
    Continue,
    /// A statement with no instruction form (`try`, `with`, `class`,
    /// `async def`, `global`, `raise`, ...)
    Unsupported(UnsupportedStatement),
}

/// A statement that parses but never lowers.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedStatement {
    /// What the statement was, e.g. `"try"` or `"async"`
    pub kind: &'static str,
    /// Statements from every block the construct owns, in source order
    pub body: Vec<Statement>,
}

impl UnsupportedStatement {
    /// A statement without blocks.
    pub fn simple(kind: &'static str) -> Self {
        Self {
            kind,
            body: Vec::new(),
        }
    }

    /// A compound statement owning `body`.
    pub fn compound(kind: &'static str, body: Vec<Statement>) -> Self {
        Self { kind, body }
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name
    pub name: Identifier,
    /// Parameter names
    pub params: Vec<Identifier>,
    /// Function body
    pub body: Vec<Statement>,
    /// Decorator expressions, outermost first
    pub decorators: Vec<Expression>,
    /// Return annotation after `->`
    pub returns: Option<Expression>,
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then-block
    pub body: Vec<Statement>,
    /// The else-block (empty when absent)
    pub orelse: Vec<Statement>,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The loop body
    pub body: Vec<Statement>,
    /// The `else:` block run when the loop ends without `break`
    pub orelse: Vec<Statement>,
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// The loop target
    pub target: Expression,
    /// The iterable
    pub iter: Expression,
    /// The loop body
    pub body: Vec<Statement>,
    /// The `else:` block
    pub orelse: Vec<Statement>,
}

/// An assignment statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignStatement {
    /// Assignment targets, left to right
    pub targets: Vec<Expression>,
    /// The assigned value
    pub value: Expression,
}

/// An augmented assignment statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AugAssignStatement {
    /// The target
    pub target: Expression,
    /// The arithmetic operator
    pub operator: BinaryOperator,
    /// The right-hand side
    pub value: Expression,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    /// The returned value
    pub value: Option<Expression>,
}

/// An import statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    /// Dotted module path (`from` part for `from ... import`)
    pub module: String,
    /// Imported names (empty for plain `import module`)
    pub names: Vec<String>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Name reference
    Name(Identifier),
    /// Comparison chain (`a < b <= c`)
    Compare(CompareExpression),
    /// Binary arithmetic or bitwise expression
    Binary(BinaryExpression),
    /// Boolean `and` / `or`
    BoolOp(BoolOpExpression),
    /// Unary expression
    Unary(UnaryExpression),
    /// Call expression
    Call(CallExpression),
    /// Attribute access (`value.attr`)
    Attribute(AttributeExpression),
    /// Subscript (`value[index]`)
    Subscript(SubscriptExpression),
    /// Tuple display
    Tuple(Vec<Expression>),
    /// List display
    List(Vec<Expression>),
    /// Dict display
    Dict(DictExpression),
    /// An expression that is never evaluated at compile time
    Opaque(OpaqueExpression),
}

impl Expression {
    /// Returns the identifier if this expression is a bare name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expression::Name(id) => Some(&id.name),
            _ => None,
        }
    }
}

/// An expression form kept only as its parsed operands.
///
/// Lowering treats these like any other non-constant expression.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueExpression {
    /// What the expression was
    pub kind: OpaqueKind,
    /// Sub-expressions in source order
    pub operands: Vec<Expression>,
}

impl OpaqueExpression {
    /// Creates an opaque expression.
    pub fn new(kind: OpaqueKind, operands: Vec<Expression>) -> Self {
        Self { kind, operands }
    }
}

/// The forms an [`OpaqueExpression`] can take.
#[derive(Debug, Clone, PartialEq)]
pub enum OpaqueKind {
    /// `f"..."`, with its raw text
    FormattedString(String),
    /// `b"..."`, with its raw text
    Bytes(String),
    /// `...`
    Ellipsis,
    /// `body if test else orelse`
    Conditional,
    /// List, set, dict or generator comprehension
    Comprehension,
    /// `lambda params: body`
    Lambda,
    /// `name := value`
    NamedExpr,
    /// `await value`
    Await,
    /// `yield value` or `yield from value`
    Yield,
    /// `*value` or `**value`
    Starred,
    /// `lower:upper:step` inside a subscript
    Slice,
    /// Set display
    Set,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// String literal
    String(String),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// True / False
    Boolean(bool),
    /// None
    None,
}

/// A comparison chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareExpression {
    /// The leftmost operand
    pub left: Box<Expression>,
    /// Operators, one per comparator
    pub operators: Vec<CompareOperator>,
    /// Right-hand operands
    pub comparators: Vec<Expression>,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CompareOperator {
    /// Returns the operator's node name.
    pub fn name(self) -> &'static str {
        match self {
            CompareOperator::Eq => "Eq",
            CompareOperator::NotEq => "NotEq",
            CompareOperator::Lt => "Lt",
            CompareOperator::LtE => "LtE",
            CompareOperator::Gt => "Gt",
            CompareOperator::GtE => "GtE",
            CompareOperator::Is => "Is",
            CompareOperator::IsNot => "IsNot",
            CompareOperator::In => "In",
            CompareOperator::NotIn => "NotIn",
        }
    }
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// The left operand
    pub left: Box<Expression>,
    /// The right operand
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    // Bitwise
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinaryOperator {
    /// Returns the operator's node name.
    pub fn name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "Add",
            BinaryOperator::Sub => "Sub",
            BinaryOperator::Mult => "Mult",
            BinaryOperator::Div => "Div",
            BinaryOperator::FloorDiv => "FloorDiv",
            BinaryOperator::Mod => "Mod",
            BinaryOperator::Pow => "Pow",
            BinaryOperator::LShift => "LShift",
            BinaryOperator::RShift => "RShift",
            BinaryOperator::BitOr => "BitOr",
            BinaryOperator::BitXor => "BitXor",
            BinaryOperator::BitAnd => "BitAnd",
        }
    }
}

/// A boolean operation over two or more operands.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolOpExpression {
    /// The operator
    pub operator: BoolOperator,
    /// The operands, flattened (`a and b and c` has three)
    pub values: Vec<Expression>,
}

/// Boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub operand: Box<Expression>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    USub,
    /// +
    UAdd,
    /// not
    Not,
    /// ~
    Invert,
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// The function being called
    pub callee: Box<Expression>,
    /// Positional arguments
    pub arguments: Vec<Expression>,
    /// Keyword arguments
    pub keywords: Vec<Keyword>,
}

/// A keyword argument (`name=value`).
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// The parameter name
    pub name: Identifier,
    /// The value
    pub value: Expression,
}

/// An attribute access expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeExpression {
    /// The object
    pub value: Box<Expression>,
    /// The attribute name
    pub attr: Identifier,
}

/// A subscript expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptExpression {
    /// The object
    pub value: Box<Expression>,
    /// The index expression
    pub index: Box<Expression>,
}

/// A dict display.
#[derive(Debug, Clone, PartialEq)]
pub struct DictExpression {
    /// Keys, parallel to `values`
    pub keys: Vec<Expression>,
    /// Values
    pub values: Vec<Expression>,
}
