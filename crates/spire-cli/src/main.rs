use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use spire_backend_core::{BackendRegistry, OutputContent, OutputFile};
use spire_compiler::{
    CompileOptions, CompileResult, FileSystemIncludeHandler, ScopeChecker, Session,
};
use spire_ir::{DiagnosticSink, ShaderLibFile};
use spire_parser::{Define, dump_ast};

/// Spire shading-language compiler
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input source files (ShaderLib files with --shader-lib)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Define a preprocessor macro
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Add a directory to the include search path
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Target backend
    #[arg(short, long, default_value = "il")]
    target: String,

    /// Output path (default: stdout); a directory when several files are emitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Standard library source parsed before every input
    #[arg(long)]
    stdlib: Option<PathBuf>,

    /// Print the preprocessed tokens to stderr
    #[arg(long)]
    emit_tokens: bool,

    /// Print the syntax tree to stderr
    #[arg(long)]
    emit_ast: bool,

    /// Parse only; keep function bodies as raw tokens
    #[arg(long)]
    no_checking: bool,

    /// Errors tolerated before a phase barrier stops the compile; code
    /// generation still needs an error-free input
    #[arg(long, default_value_t = 0)]
    max_errors: usize,

    /// Read the inputs as ShaderLib files and write them back normalised
    #[arg(long)]
    shader_lib: bool,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    if cli.shader_lib {
        return normalise_shader_libs(&cli);
    }

    // 1. Session with the standard library.
    let session = match &cli.stdlib {
        Some(path) => {
            let stdlib = read(path)?;
            Session::new(&stdlib)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to load {}", path.display()))?
        }
        None => Session::empty(),
    };

    let options = CompileOptions {
        search_dirs: cli.include_dirs.clone(),
        defines: cli.defines.iter().map(|d| Define::parse(d)).collect(),
        target: cli.target.clone(),
        output_name: output_name(&cli),
        no_checking: cli.no_checking,
        max_errors: cli.max_errors,
    };

    // 2. Optionally dump tokens.
    if cli.emit_tokens {
        for input in &cli.inputs {
            emit_tokens(input, &options)?;
        }
    }

    // 3. Parse every input.
    let mut result = CompileResult::new();
    let mut units = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let unit = session
            .parse_file(&mut result, &options, input)
            .into_diagnostic()?;
        if cli.emit_ast {
            eprintln!("{}", dump_ast(&unit.program));
        }
        units.push(unit);
    }

    // 4. Check, lower and emit.
    let outcome = session.compile(
        &mut result,
        &mut units,
        &options,
        &mut ScopeChecker,
        &BackendRegistry::with_builtins(),
    );
    eprint!("{}", result.diagnostic_text());
    outcome.into_diagnostic().wrap_err("compilation failed")?;

    // 5. Write output.
    write_files(result.files(&options.target), cli.output.as_deref())
}

fn read(path: &Path) -> miette::Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// Base name of the emitted file: the output file's stem, else the input's.
fn output_name(cli: &Cli) -> String {
    cli.output
        .iter()
        .chain(cli.inputs.first())
        .find_map(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".into())
}

fn emit_tokens(input: &Path, options: &CompileOptions) -> miette::Result<()> {
    let source = read(input)?;
    let file_name = input.to_string_lossy();
    let handler = FileSystemIncludeHandler::new(options.search_dirs.clone());
    // Diagnostics are reported again by the real parse.
    let mut sink = DiagnosticSink::new();
    let tokens = spire_parser::tokenize(&file_name, &source, &mut sink);
    let tokens = spire_parser::preprocess(
        &tokens,
        &file_name,
        &options.defines,
        Some(&handler),
        &mut sink,
    );
    for token in tokens.iter() {
        eprintln!("{}: {} '{}'", token.position, token.ty, token.content);
    }
    Ok(())
}

fn normalise_shader_libs(cli: &Cli) -> miette::Result<()> {
    let mut files = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let lib = ShaderLibFile::from_text(&read(input)?)
            .into_diagnostic()
            .wrap_err_with(|| format!("invalid ShaderLib file {}", input.display()))?;
        log::info!(
            "{}: {} parameter set(s), {} source(s)",
            lib.name,
            lib.parameter_sets.len(),
            lib.sources.len()
        );
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.shaderlib", lib.name));
        files.push(OutputFile {
            name,
            content: OutputContent::Text(lib.to_text()),
        });
    }
    write_files(&files, cli.output.as_deref())
}

fn write_files(files: &[OutputFile], output: Option<&Path>) -> miette::Result<()> {
    for file in files {
        let path = match output {
            Some(dir) if files.len() > 1 => {
                std::fs::create_dir_all(dir)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
                Some(dir.join(&file.name))
            }
            other => other.map(Path::to_path_buf),
        };
        match (path, &file.content) {
            (Some(path), OutputContent::Text(text)) => {
                std::fs::write(&path, text)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
            (Some(path), OutputContent::Binary(words)) => {
                let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
                std::fs::write(&path, bytes)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
            (None, OutputContent::Text(text)) => {
                print!("{text}");
            }
            (None, OutputContent::Binary(_)) => {
                return Err(miette::miette!(
                    "backend produced binary output but no --output path was specified"
                ));
            }
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Logging
// ----------------------------------------------------------------------

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
