use std::fmt;
use std::path::PathBuf;

use spire_backend_core::BackendError;

/// A pipeline step guarded by an error-count barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Parsing,
    SemanticChecking,
    CodeGeneration,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parsing => "parsing",
            Self::SemanticChecking => "semantic checking",
            Self::CodeGeneration => "code generation",
        })
    }
}

/// Reasons the driver stops a compile.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("compilation stopped after {phase} with {count} error(s)")]
    Errors { phase: Phase, count: usize },
    #[error("the standard library failed to compile:\n{0}")]
    StdLib(String),
    #[error("unknown target '{target}' (available: {available})")]
    UnknownTarget { target: String, available: String },
    #[error("failed to read '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backend '{backend}' failed")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = CompileError::Errors {
            phase: Phase::SemanticChecking,
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "compilation stopped after semantic checking with 3 error(s)"
        );
        let err = CompileError::UnknownTarget {
            target: "glsl".into(),
            available: "il, il-dump".into(),
        };
        assert_eq!(err.to_string(), "unknown target 'glsl' (available: il, il-dump)");
    }
}
