//! Compile driver for the Spire shading language.
//!
//! A [`Session`] owns the parsed standard library and runs translation
//! units through the pipeline:
//!
//! 1. [`Session::parse`]: lex, preprocess and parse one source file,
//! 2. [`Session::compile`]: semantic check, code generation and backend
//!    emission, with a phase barrier on the error count after each step.
//!
//! Diagnostics from every phase accumulate in the [`CompileResult`]'s sink.
//! The driver only returns `Err` when it refuses to go on; the diagnostics
//! explaining why are still in the result.

mod checker;
mod error;
mod include;
mod options;
mod session;

pub use checker::{ScopeChecker, SemanticChecker};
pub use error::{CompileError, Phase};
pub use include::FileSystemIncludeHandler;
pub use options::CompileOptions;
pub use session::{CompileResult, CompileUnit, Session};
