//! `#include` resolution against the file system.

use std::path::{Path, PathBuf};

use spire_parser::IncludeHandler;

/// Looks for include files next to the including file first, then in each
/// search directory in order.
#[derive(Clone, Debug, Default)]
pub struct FileSystemIncludeHandler {
    search_dirs: Vec<PathBuf>,
}

impl FileSystemIncludeHandler {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    fn candidates(&self, path: &str, included_from: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(self.search_dirs.len() + 1);
        let own_dir = Path::new(included_from)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        candidates.push(own_dir.join(path));
        candidates.extend(self.search_dirs.iter().map(|dir| dir.join(path)));
        candidates
    }
}

impl IncludeHandler for FileSystemIncludeHandler {
    fn try_find_include_file(&self, path: &str, included_from: &str) -> Option<(String, String)> {
        for candidate in self.candidates(path, included_from) {
            match std::fs::read_to_string(&candidate) {
                Ok(source) => {
                    log::debug!("include '{path}' resolved to {}", candidate.display());
                    return Some((candidate.to_string_lossy().into_owned(), source));
                }
                Err(err) => {
                    log::trace!("include candidate {}: {err}", candidate.display());
                }
            }
        }
        None
    }
}
