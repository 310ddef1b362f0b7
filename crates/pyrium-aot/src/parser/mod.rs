//! Parser for mod scripts.
//!
//! A recursive descent parser over the token stream produced by the
//! [`Scanner`](crate::lexer::Scanner). It accepts the statement and
//! expression subset the lowering engine understands, plus the common
//! constructs it skips (assignments, imports, returns), so ordinary scripts
//! parse without errors.
//!
//! ## Usage
//!
//! ```rust
//! use pyrium_aot::parser::Parser;
//!
//! let mut parser = Parser::new("def on_tick():\n    log('hi')\n");
//! let program = parser.parse_program().expect("Should parse");
//! assert_eq!(program.functions().count(), 1);
//! ```

mod parser;

pub use parser::Parser;
