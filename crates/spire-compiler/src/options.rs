//! Driver configuration.

use std::path::PathBuf;

use spire_backend_core::BackendOptions;
use spire_parser::{Define, ParseOptions};

/// Settings for one compile request.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Directories searched for `#include` files, in order, after the
    /// including file's own directory.
    pub search_dirs: Vec<PathBuf>,
    /// Macros defined before the first line of every unit.
    pub defines: Vec<Define>,
    /// Backend target identifier.
    pub target: String,
    /// Base name for emitted files.
    pub output_name: String,
    /// Keep function bodies unparsed and stop after parsing.
    pub no_checking: bool,
    /// A phase barrier stops the compile once more errors than this have
    /// been reported. Code generation never runs while any error exists.
    pub max_errors: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            defines: Vec::new(),
            target: "il".into(),
            output_name: "program".into(),
            no_checking: false,
            max_errors: 0,
        }
    }
}

impl CompileOptions {
    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push(Define::new(name, value));
        self
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            no_checking: self.no_checking,
        }
    }

    pub(crate) fn backend_options(&self, output_name: String) -> BackendOptions {
        BackendOptions {
            output_name,
            ..BackendOptions::default()
        }
    }
}
