//! Front end of the Spire shading-language compiler.
//!
//! Turns source text into a syntax tree in three steps:
//!
//! 1. [`tokenize`] splits the text into [`Token`]s,
//! 2. [`preprocess`] applies `#include`, `#define` and conditionals,
//! 3. [`parse`] builds a [`Program`] with panic-mode error recovery.
//!
//! None of the steps fail outright. Problems in the source are reported to
//! a [`spire_ir::DiagnosticSink`] and each step still returns a best-effort
//! result.

pub mod ast;
pub mod cursor;
mod lexer;
mod parser;
mod preprocessor;
pub mod token;

pub use ast::{Program, ScopeTable, dump_ast};
pub use cursor::TokenCursor;
pub use lexer::tokenize;
pub use parser::{ParseOptions, parse};
pub use preprocessor::{Define, IncludeHandler, MAX_INCLUDE_DEPTH, preprocess};
pub use token::{Token, TokenFlags, TokenList, TokenType};
