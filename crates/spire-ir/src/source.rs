//! Source positions.

use std::fmt;
use std::sync::Arc;

/// A location in a source file.
///
/// Lines and columns start at 1; `pos` is the byte offset from the start of
/// the file. The file name is shared between all positions of one file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodePosition {
    pub line: u32,
    pub col: u32,
    pub pos: u32,
    pub file: Arc<str>,
}

impl CodePosition {
    pub fn new(line: u32, col: u32, pos: u32, file: Arc<str>) -> Self {
        Self {
            line,
            col,
            pos,
            file,
        }
    }

    /// A position with no file and no line, used for compiler-synthesized nodes.
    pub fn unknown() -> Self {
        Self::new(0, 0, 0, Arc::from(""))
    }
}

impl Default for CodePosition {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.file, self.line)
    }
}
