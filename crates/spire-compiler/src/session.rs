use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use spire_backend_core::{BackendOutput, BackendRegistry, OutputFile};
use spire_ir::{DiagnosticCallback, DiagnosticSink, IlProgram};
use spire_parser::{IncludeHandler, Program, parse, preprocess, tokenize};

use crate::checker::SemanticChecker;
use crate::error::{CompileError, Phase};
use crate::include::FileSystemIncludeHandler;
use crate::options::CompileOptions;

/// File name reported for standard-library positions.
const STDLIB_FILE_NAME: &str = "<stdlib>";

/// One parsed translation unit.
#[derive(Clone, Debug)]
pub struct CompileUnit {
    pub file_name: String,
    pub program: Program,
}

/// Everything a compile request produced so far.
#[derive(Debug, Default)]
pub struct CompileResult {
    pub sink: DiagnosticSink,
    /// Lowered IL per unit file name, once code generation has run.
    pub programs: BTreeMap<String, IlProgram>,
    /// Backend output per target name.
    pub sources: BTreeMap<String, BackendOutput>,
}

impl CompileResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result whose diagnostics are also streamed to `callback`.
    pub fn with_callback(callback: DiagnosticCallback) -> Self {
        Self {
            sink: DiagnosticSink::with_callback(callback),
            ..Self::default()
        }
    }

    /// Files emitted for `target`, in unit order.
    pub fn files(&self, target: &str) -> &[OutputFile] {
        self.sources
            .get(target)
            .map(|o| o.files.as_slice())
            .unwrap_or(&[])
    }

    /// The text of the first emitted file for `target`, if any.
    pub fn source_text(&self, target: &str) -> Option<&str> {
        self.files(target).first().and_then(|f| f.content.as_text())
    }

    /// All diagnostics formatted one per line.
    pub fn diagnostic_text(&self) -> &str {
        self.sink.output()
    }
}

/// Compiler state shared by every compile request.
///
/// The standard library is parsed once in [`Session::new`] and never
/// modified afterwards; clones share it.
#[derive(Clone, Debug)]
pub struct Session {
    predefined: Arc<Program>,
}

impl Session {
    /// Parses `stdlib` as the predefined unit.
    pub fn new(stdlib: &str) -> Result<Self, CompileError> {
        let mut sink = DiagnosticSink::new();
        let tokens = tokenize(STDLIB_FILE_NAME, stdlib, &mut sink);
        let program = parse(
            &tokens,
            &mut sink,
            STDLIB_FILE_NAME,
            None,
            &Default::default(),
        );
        if sink.has_errors() {
            return Err(CompileError::StdLib(sink.output().to_owned()));
        }
        log::debug!(
            "standard library: {} declaration(s)",
            program.members.len()
        );
        Ok(Self {
            predefined: Arc::new(program),
        })
    }

    /// A session without standard library declarations.
    pub fn empty() -> Self {
        Self {
            predefined: Arc::new(Program::new(STDLIB_FILE_NAME)),
        }
    }

    pub fn predefined(&self) -> &Program {
        &self.predefined
    }

    /// Lexes, preprocesses and parses `source`. Problems are reported to
    /// `result`; the unit is always returned.
    pub fn parse(
        &self,
        result: &mut CompileResult,
        options: &CompileOptions,
        source: &str,
        file_name: &str,
        include_handler: Option<&dyn IncludeHandler>,
    ) -> CompileUnit {
        log::info!("parsing '{file_name}'");
        let sink = &mut result.sink;
        let tokens = tokenize(file_name, source, sink);
        let tokens = preprocess(&tokens, file_name, &options.defines, include_handler, sink);
        log::debug!("'{file_name}': {} token(s) after preprocessing", tokens.len());
        let program = parse(
            &tokens,
            sink,
            file_name,
            Some(&*self.predefined),
            &options.parse_options(),
        );
        CompileUnit {
            file_name: file_name.to_owned(),
            program,
        }
    }

    /// Reads and parses the file at `path`, resolving includes against its
    /// directory and the option's search directories.
    pub fn parse_file(
        &self,
        result: &mut CompileResult,
        options: &CompileOptions,
        path: &Path,
    ) -> Result<CompileUnit, CompileError> {
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_owned(),
            source,
        })?;
        let handler = FileSystemIncludeHandler::new(options.search_dirs.clone());
        Ok(self.parse(
            result,
            options,
            &source,
            &path.to_string_lossy(),
            Some(&handler),
        ))
    }

    /// Runs semantic checking, code generation and backend emission over
    /// `units`.
    ///
    /// Each phase runs over all units before the error count is compared
    /// with `options.max_errors`; the first barrier that fails stops the
    /// compile with [`CompileError::Errors`]. A nonzero `max_errors` lets
    /// checking run over a unit with parse errors, but code generation
    /// never sees a tree with errors. In no-checking mode only the parse
    /// barrier runs.
    pub fn compile(
        &self,
        result: &mut CompileResult,
        units: &mut [CompileUnit],
        options: &CompileOptions,
        checker: &mut dyn SemanticChecker,
        registry: &BackendRegistry,
    ) -> Result<(), CompileError> {
        barrier(result, options, Phase::Parsing)?;
        if options.no_checking {
            log::info!("no-checking mode: stopping after parsing");
            return Ok(());
        }

        let mut shaders = Vec::with_capacity(units.len());
        for unit in units.iter_mut() {
            log::info!("checking '{}'", unit.file_name);
            shaders.push(checker.check(unit, &self.predefined, &mut result.sink));
        }
        barrier(result, options, Phase::SemanticChecking)?;
        let count = result.sink.error_count();
        if count > 0 {
            log::warn!("skipping code generation: {count} error(s) reported");
            return Err(CompileError::Errors {
                phase: Phase::SemanticChecking,
                count,
            });
        }

        for (unit, shaders) in units.iter().zip(&shaders) {
            log::info!(
                "generating code for '{}' ({} shader(s))",
                unit.file_name,
                shaders.len()
            );
            let il = spire_codegen::generate(&unit.program, shaders, &mut result.sink);
            result.programs.insert(unit.file_name.clone(), il);
        }
        barrier(result, options, Phase::CodeGeneration)?;

        let backend = registry
            .find(&options.target)
            .ok_or_else(|| CompileError::UnknownTarget {
                target: options.target.clone(),
                available: registry.list_targets().join(", "),
            })?;
        let single = result.programs.len() == 1;
        let mut emitted = BackendOutput::default();
        for (file_name, il) in &result.programs {
            let output_name = if single {
                options.output_name.clone()
            } else {
                unit_stem(file_name)
            };
            let output = backend
                .compile(il, &options.backend_options(output_name))
                .map_err(|source| CompileError::Backend {
                    backend: backend.name().to_owned(),
                    source,
                })?;
            for diag in &output.diagnostics {
                log::info!("{}: {diag}", backend.name());
            }
            emitted.files.extend(output.files);
            emitted.diagnostics.extend(output.diagnostics);
        }
        log::info!("{}: {emitted}", backend.name());
        result.sources.insert(options.target.clone(), emitted);
        Ok(())
    }
}

fn barrier(result: &CompileResult, options: &CompileOptions, phase: Phase) -> Result<(), CompileError> {
    let count = result.sink.error_count();
    if count > options.max_errors {
        log::warn!("{phase} reported {count} error(s)");
        return Err(CompileError::Errors { phase, count });
    }
    log::debug!("{phase} finished with {count} error(s)");
    Ok(())
}

fn unit_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_owned())
}
