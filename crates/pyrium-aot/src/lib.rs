// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # pyrium-aot
//!
//! Ahead-of-time compiler for Pyrium mod scripts.
//!
//! ## Overview
//!
//! Mod scripts are written in a small Python-shaped language. This crate
//! compiles them into PYBC, the flat bytecode container the game-server VM
//! loads:
//!
//! - Scanner and parser for the script language
//! - Lowering of entry-point functions into a flat instruction list
//! - An interning encoder and a validating decoder for PYBC
//! - Async and parallel batch drivers
//!
//! ## Quick Start
//!
//! ```rust
//! use pyrium_aot::Compiler;
//!
//! let compiler = Compiler::new();
//! let bytes = compiler
//!     .compile_source("def on_tick():\n    log('tick executed')\n", "demo")
//!     .unwrap();
//! assert_eq!(&bytes[..4], b"PYBC");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod ast;
pub mod compiler;
pub mod config;
pub mod disasm;
pub mod lexer;
pub mod parser;
pub mod pybc;

#[cfg(any(feature = "async", feature = "parallel"))]
pub mod batch;

pub use compiler::{Lowerer, Module};
pub use config::Config;
pub use pybc::{DecodeError, EncodeError};

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::ast::Program;
use crate::parser::Parser;

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling or loading modules.
#[derive(Error, Debug)]
pub enum Error {
    /// The source text is not a valid script
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        /// What the parser expected or found
        message: String,
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
    },

    /// The module does not fit the PYBC format
    #[error("cannot encode module: {0}")]
    Encode(#[from] EncodeError),

    /// A byte stream is not a valid PYBC module
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Compiles script sources into PYBC modules.
///
/// The compiler itself is stateless between runs; every call parses,
/// lowers and encodes from scratch.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    lowerer: Lowerer,
}

impl Compiler {
    /// Creates a compiler for the default `on_tick` entry point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compiler with a custom lowerer.
    pub fn with_lowerer(lowerer: Lowerer) -> Self {
        Self { lowerer }
    }

    /// Creates a compiler from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_lowerer(config.lowerer())
    }

    /// Returns the lowerer in use.
    pub fn lowerer(&self) -> &Lowerer {
        &self.lowerer
    }

    /// Parses source text into a syntax tree.
    pub fn parse(&self, source: &str) -> Result<Program> {
        Parser::new(source).parse_program()
    }

    /// Parses and lowers source text into a module.
    pub fn lower_source(&self, source: &str, module_name: &str) -> Result<Module> {
        let program = self.parse(source)?;
        Ok(self.lowerer.lower(&program, module_name))
    }

    /// Compiles source text into PYBC bytes.
    pub fn compile_source(&self, source: &str, module_name: &str) -> Result<Vec<u8>> {
        let module = self.lower_source(source, module_name)?;
        let bytes = pybc::encode(&module)?;
        debug!(
            module = module_name,
            functions = module.functions.len(),
            pool = module.string_pool.len(),
            bytes = bytes.len(),
            "compiled module"
        );
        Ok(bytes)
    }

    /// Reads and compiles a script file. The module is named after the
    /// file stem.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        self.compile_source(&source, &artifact::module_name(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "def on_tick():\n    log('tick executed')\n";

    #[test]
    fn test_lower_source() {
        let module = Compiler::new().lower_source(SCRIPT, "demo").unwrap();
        assert_eq!(module.name, "demo");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.string_pool, vec!["tick executed".to_string()]);
    }

    #[test]
    fn test_compile_source_decodes_back() {
        let compiler = Compiler::new();
        let bytes = compiler.compile_source(SCRIPT, "demo").unwrap();
        let module = pybc::decode(&bytes).unwrap();
        assert_eq!(module, compiler.lower_source(SCRIPT, "demo").unwrap());
    }

    #[test]
    fn test_syntax_error_produces_no_module() {
        let err = Compiler::new().lower_source("def on_tick(:\n", "bad").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_compile_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spawner.py");
        std::fs::write(&path, SCRIPT).unwrap();

        let bytes = Compiler::new().compile_file(&path).unwrap();
        let module = pybc::decode(&bytes).unwrap();
        assert_eq!(module.name, "spawner");
    }

    #[test]
    fn test_compile_missing_file() {
        let err = Compiler::new().compile_file("/definitely/not/here.py").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_display() {
        let err = Error::Syntax {
            message: "expected ':'".into(),
            line: 2,
            column: 7,
        };
        assert_eq!(err.to_string(), "syntax error at 2:7: expected ':'");
    }
}
