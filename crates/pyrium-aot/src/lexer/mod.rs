//! Lexical analysis (tokenization) for mod scripts.
//!
//! The lexer transforms script source text into a stream of tokens that can
//! be consumed by the parser. Indentation is significant, so the token
//! stream carries synthesized `Newline`, `Indent` and `Dedent` tokens.
//!
//! ## Structure
//!
//! - `scanner.rs` - Main `Scanner` struct that produces tokens
//! - `token.rs` - `Token` and `TokenKind` definitions
//!
//! ## Usage
//!
//! ```rust
//! use pyrium_aot::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("log('hello')\n");
//!
//! loop {
//!     let token = scanner.next_token();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{AugOperator, Span, Token, TokenKind};
