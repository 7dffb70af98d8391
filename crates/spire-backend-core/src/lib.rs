#![warn(missing_docs)]
//! Backend seam for Spire.
//!
//! Defines the [`Backend`] trait that target-language emitters implement,
//! the types they exchange with the driver ([`BackendOptions`],
//! [`BackendOutput`], [`BackendError`]) and a [`BackendRegistry`] used to
//! dispatch on a target name. The only built-in backend is
//! [`IlDumpBackend`], which writes the IL text dump.

use std::fmt::{self, Debug};

use spire_ir::IlProgram;

/// A backend that turns a lowered IL program into target output.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "IL Dump").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Emits `program`. Only called for programs whose diagnostics
    /// contain no errors.
    fn compile(
        &self,
        program: &IlProgram,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Options passed to a backend during emission.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    /// Base name for the emitted files, without extension.
    pub output_name: String,
    /// Restrict emission to these shaders; empty means all of them.
    pub shaders: Vec<String>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            output_name: "program".into(),
            shaders: Vec::new(),
        }
    }
}

impl BackendOptions {
    /// Whether the shader called `name` should be emitted.
    pub fn wants_shader(&self, name: &str) -> bool {
        self.shaders.is_empty() || self.shaders.iter().any(|s| s == name)
    }
}

impl fmt::Display for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackendOptions {{ output_name: {}, shaders: [{}] }}",
            self.output_name,
            self.shaders.join(", ")
        )
    }
}

/// The output produced by a backend.
#[derive(Clone, Debug, Default)]
pub struct BackendOutput {
    /// One or more output files.
    pub files: Vec<OutputFile>,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for BackendOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s), {} diagnostic(s)",
            self.files.len(),
            self.diagnostics.len()
        )
    }
}

/// A single output file.
#[derive(Clone, Debug)]
pub struct OutputFile {
    /// Suggested file name (e.g. "program.il").
    pub name: String,
    /// The file content.
    pub content: OutputContent,
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Content of an output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputContent {
    /// UTF-8 text.
    Text(String),
    /// SPIR-V style word stream.
    Binary(Vec<u32>),
}

impl OutputContent {
    /// The text, when this is a text file.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }
}

impl fmt::Display for OutputContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text({} chars)", s.len()),
            Self::Binary(b) => write!(f, "Binary({} words)", b.len()),
        }
    }
}

/// A non-fatal message from a backend.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity level.
    pub level: DiagnosticLevel,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Severity level for backend diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// A warning that does not prevent emission.
    Warning,
    /// An informational note.
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "Warning",
            Self::Info => "Info",
        })
    }
}

/// Errors that can occur during emission.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The program uses an IL feature this backend cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A requested shader is not in the program.
    #[error("no shader named '{0}'")]
    UnknownShader(String),
    /// A general backend error.
    #[error("{0}")]
    Other(String),
}

/// Registry of available backends, used for `--target` dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.list_targets()).finish()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with the built-in backends.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(IlDumpBackend));
        reg
    }

    /// Registers a backend. Later registrations do not shadow earlier ones.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend writing the IL text dump ([`spire_ir::dump_program`]).
#[derive(Debug)]
pub struct IlDumpBackend;

impl Backend for IlDumpBackend {
    fn name(&self) -> &str {
        "IL Dump"
    }

    fn targets(&self) -> &[&str] {
        &["il", "il-dump"]
    }

    fn compile(
        &self,
        program: &IlProgram,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        if let Some(missing) = opts
            .shaders
            .iter()
            .find(|s| !program.shaders.contains_key(s.as_str()))
        {
            return Err(BackendError::UnknownShader(missing.clone()));
        }
        let mut filtered;
        let program = if opts.shaders.is_empty() {
            program
        } else {
            filtered = program.clone();
            filtered.shaders.retain(|name, _| opts.wants_shader(name));
            &filtered
        };
        let text = spire_ir::dump_program(program);
        let mut diagnostics = Vec::new();
        if program.shaders.is_empty() {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Info,
                message: "program contains no shaders".into(),
            });
        }
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: format!("{}.il", opts.output_name),
                content: OutputContent::Text(text),
            }],
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use spire_ir::{CodePosition, IlShader};

    use super::*;

    fn program_with_shader(name: &str) -> IlProgram {
        let mut program = IlProgram::new();
        program.shaders.insert(
            name.into(),
            IlShader {
                name: name.into(),
                position: CodePosition::unknown(),
                worlds: Vec::new(),
                module_param_sets: Default::default(),
                stages: Default::default(),
            },
        );
        program
    }

    #[test]
    fn il_dump_backend_targets() {
        let backend = IlDumpBackend;
        assert_eq!(backend.name(), "IL Dump");
        assert!(backend.targets().contains(&"il"));
        assert!(backend.targets().contains(&"il-dump"));
    }

    #[test]
    fn il_dump_backend_compile() {
        let program = IlProgram::new();
        let output = IlDumpBackend
            .compile(&program, &BackendOptions::default())
            .unwrap();
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, "program.il");
        let text = output.files[0].content.as_text().expect("text output");
        assert!(text.is_empty(), "{text}");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].level, DiagnosticLevel::Info);
    }

    #[test]
    fn il_dump_backend_filters_shaders() {
        let mut program = program_with_shader("Lit");
        program.shaders.extend(program_with_shader("Unlit").shaders);
        let opts = BackendOptions {
            output_name: "out".into(),
            shaders: vec!["Unlit".into()],
        };
        let output = IlDumpBackend.compile(&program, &opts).unwrap();
        assert_eq!(output.files[0].name, "out.il");
        let text = output.files[0].content.as_text().unwrap();
        assert!(text.contains("Shaders:\n  shader Unlit {"), "{text}");
        assert!(!text.contains("shader Lit {"), "{text}");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn il_dump_backend_rejects_unknown_shader() {
        let opts = BackendOptions {
            shaders: vec!["Missing".into()],
            ..BackendOptions::default()
        };
        let err = IlDumpBackend
            .compile(&IlProgram::new(), &opts)
            .unwrap_err();
        assert_eq!(err.to_string(), "no shader named 'Missing'");
    }

    #[test]
    fn registry_find_builtin() {
        let reg = BackendRegistry::with_builtins();
        assert!(reg.find("il").is_some());
        assert!(reg.find("il-dump").is_some());
        assert!(reg.find("glsl").is_none());
    }

    #[test]
    fn registry_custom_backend() {
        #[derive(Debug)]
        struct WordBackend;
        impl Backend for WordBackend {
            fn name(&self) -> &str {
                "words"
            }
            fn targets(&self) -> &[&str] {
                &["spirv"]
            }
            fn compile(
                &self,
                _program: &IlProgram,
                _opts: &BackendOptions,
            ) -> Result<BackendOutput, BackendError> {
                Ok(BackendOutput {
                    files: vec![OutputFile {
                        name: "a.spv".into(),
                        content: OutputContent::Binary(vec![0x0723_0203]),
                    }],
                    diagnostics: vec![],
                })
            }
        }

        let mut reg = BackendRegistry::with_builtins();
        reg.register(Box::new(WordBackend));
        assert_eq!(reg.list_targets(), ["il", "il-dump", "spirv"]);
        let output = reg
            .find("spirv")
            .unwrap()
            .compile(&IlProgram::new(), &BackendOptions::default())
            .unwrap();
        assert_eq!(output.files[0].content, OutputContent::Binary(vec![0x0723_0203]));
    }

    #[test]
    fn registry_default_is_empty() {
        assert!(BackendRegistry::default().list_targets().is_empty());
    }

    #[test]
    fn display_impls() {
        let output = BackendOutput {
            files: vec![
                OutputFile {
                    name: "a.spv".into(),
                    content: OutputContent::Binary(vec![1, 2, 3]),
                },
                OutputFile {
                    name: "b.il".into(),
                    content: OutputContent::Text("hello".into()),
                },
            ],
            diagnostics: vec![Diagnostic {
                level: DiagnosticLevel::Warning,
                message: "unused world".into(),
            }],
        };
        assert_eq!(format!("{output}"), "2 file(s), 1 diagnostic(s)");
        assert_eq!(format!("{}", output.files[0]), "a.spv");
        assert_eq!(format!("{}", output.files[0].content), "Binary(3 words)");
        assert_eq!(format!("{}", output.files[1].content), "Text(5 chars)");
        assert_eq!(format!("{}", output.diagnostics[0]), "[Warning] unused world");
        assert_eq!(
            format!("{}", BackendOptions::default()),
            "BackendOptions { output_name: program, shaders: [] }"
        );
    }

    #[test]
    fn backend_error_display() {
        assert_eq!(
            BackendError::Unsupported("geometry worlds".into()).to_string(),
            "unsupported: geometry worlds"
        );
        assert_eq!(BackendError::Other("boom".into()).to_string(), "boom");
    }
}
