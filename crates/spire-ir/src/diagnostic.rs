//! Diagnostic catalogue and the sink every compiler phase reports into.
//!
//! User-source problems never abort a phase. They are recorded here with a
//! position, a stable id and a severity, and the driver inspects
//! [`DiagnosticSink::error_count`] at each phase boundary.

use std::fmt;

use crate::source::CodePosition;

/// How serious a diagnostic is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
    Internal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal error",
            Self::Internal => "internal error",
        })
    }
}

/// Every diagnostic the compiler can produce.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticKind {
    // Lexer
    #[error("illegal character '{0}'")]
    IllegalCharacterPrint(char),
    #[error("illegal character with code 0x{0:02X}")]
    IllegalCharacterHex(u32),
    #[error("illegal character literal")]
    IllegalCharacterLiteral,

    // Preprocessor
    #[error("unknown preprocessor directive '#{0}'")]
    UnknownDirective(String),
    #[error("expected a quoted file name after '#include'")]
    ExpectedIncludePath,
    #[error("cannot find include file '{0}'")]
    IncludeNotFound(String),
    #[error("no include handler is available to resolve '{0}'")]
    NoIncludeHandler(String),
    #[error("include nesting is too deep while including '{0}'")]
    IncludeDepthExceeded(String),
    #[error("expected a macro name after '#{0}'")]
    ExpectedMacroName(String),
    #[error("'#{0}' without a matching conditional")]
    DirectiveWithoutConditional(String),
    #[error("conditional directive is never closed by '#endif'")]
    UnterminatedConditional,

    // Parser
    #[error("syntax error")]
    SyntaxError,
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedTokenExpectedTokenType { found: String, expected: String },
    #[error("unexpected {found}, expected '{expected}'")]
    UnexpectedTokenExpectedTokenName { found: String, expected: String },
    #[error("type name expected but found {0}")]
    TypeNameExpected(String),
    #[error("'{0}' cannot be used as an operator name")]
    InvalidOperator(String),

    // Semantic checking
    #[error("undefined identifier '{0}'")]
    UndefinedIdentifier(String),
    #[error("type '{0}' is defined in terms of itself")]
    RecursiveType(String),

    // Code generation
    #[error("binding location '{binding}' is already occupied by module '{module}'")]
    BindingAlreadyOccupiedByModule { binding: i32, module: String },
    #[error("see using of '{0}'")]
    SeeUsingOf(String),
    #[error(
        "top level module '{0}' is being used without specifying binding location; use the 'Binding' attribute to provide a location"
    )]
    TopLevelModuleUsedWithoutSpecifyingBinding(String),
    #[error("binding location '{binding}' is already occupied by component '{component}'")]
    BindingAlreadyOccupiedByComponent { binding: i32, component: String },
    #[error("see definition of '{0}'")]
    SeeDefinitionOf(String),
    #[error("binding value '{0}' is out of the valid range")]
    InvalidBindingValue(i32),
    #[error("binding location '{binding}' assigned to '{component}' exceeds the limit of {limit} slots")]
    BindingExceedsLimit {
        binding: i32,
        component: String,
        limit: u32,
    },
    #[error("see module '{module}' being used in binding '{binding}'")]
    SeeModuleBeingUsedIn { module: String, binding: String },
    #[error("invalid type cast from '{from}' to '{to}'")]
    InvalidTypeCast { from: String, to: String },
    #[error("'{0}' is too large to fit in a buffer")]
    BufferTooLarge(String),
    #[error("array '{name}' has {len} elements, more than the supported maximum")]
    ArrayTooLarge { name: String, len: u32 },

    // Driver
    #[error("{0} is not implemented")]
    Unimplemented(String),
}

impl DiagnosticKind {
    /// Stable numeric id, printed in front of the message.
    pub fn id(&self) -> i32 {
        match self {
            Self::IllegalCharacterPrint(_) => 10000,
            Self::IllegalCharacterHex(_) => 10001,
            Self::IllegalCharacterLiteral => 10002,

            Self::UnknownDirective(_) => 15000,
            Self::ExpectedIncludePath => 15001,
            Self::IncludeNotFound(_) => 15002,
            Self::NoIncludeHandler(_) => 15003,
            Self::IncludeDepthExceeded(_) => 15004,
            Self::ExpectedMacroName(_) => 15005,
            Self::DirectiveWithoutConditional(_) => 15006,
            Self::UnterminatedConditional => 15007,

            Self::UnexpectedTokenExpectedTokenType { .. } => 20001,
            Self::UnexpectedTokenExpectedTokenName { .. } => 20001,
            Self::TypeNameExpected(_) => 20001,
            Self::SyntaxError => 20002,
            Self::UnexpectedToken(_) => 20003,
            Self::InvalidOperator(_) => 20004,

            Self::UndefinedIdentifier(_) => 30015,
            Self::RecursiveType(_) => 30016,

            Self::BindingAlreadyOccupiedByModule { .. } => 39000,
            Self::TopLevelModuleUsedWithoutSpecifyingBinding(_) => 39001,
            Self::BindingAlreadyOccupiedByComponent { .. } => 39002,
            Self::InvalidBindingValue(_) => 39003,
            Self::BindingExceedsLimit { .. } => 39004,
            Self::InvalidTypeCast { .. } => 39005,
            Self::BufferTooLarge(_) => 39006,
            Self::ArrayTooLarge { .. } => 39007,
            Self::SeeUsingOf(_) | Self::SeeDefinitionOf(_) | Self::SeeModuleBeingUsedIn { .. } => {
                -1
            }

            Self::Unimplemented(_) => 99999,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SeeUsingOf(_) | Self::SeeDefinitionOf(_) | Self::SeeModuleBeingUsedIn { .. } => {
                Severity::Note
            }
            Self::BindingExceedsLimit { .. } => Severity::Warning,
            Self::Unimplemented(_) => Severity::Internal,
            _ => Severity::Error,
        }
    }
}

/// A single recorded diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: CodePosition,
    pub kind: DiagnosticKind,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}: {}",
            self.position,
            self.severity,
            self.kind.id(),
            self.kind
        )
    }
}

/// Callback invoked for every diagnostic as soon as it is produced.
pub type DiagnosticCallback = Box<dyn FnMut(&Diagnostic) + Send>;

/// Accumulates diagnostics together with a running error count and a
/// formatted message buffer.
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    output: String,
    error_count: usize,
    callback: Option<DiagnosticCallback>,
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("diagnostics", &self.diagnostics)
            .field("error_count", &self.error_count)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that also streams every diagnostic to `callback`.
    pub fn with_callback(callback: DiagnosticCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::default()
        }
    }

    /// Records a diagnostic at `position`.
    pub fn diagnose(&mut self, position: &CodePosition, kind: DiagnosticKind) {
        let severity = kind.severity();
        let diagnostic = Diagnostic {
            position: position.clone(),
            kind,
            severity,
        };
        if severity >= Severity::Error {
            self.error_count += 1;
        }
        self.output.push_str(&diagnostic.to_string());
        self.output.push('\n');
        if let Some(callback) = self.callback.as_mut() {
            callback(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// All diagnostics formatted one per line.
    pub fn output(&self) -> &str {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn pos(line: u32) -> CodePosition {
        CodePosition::new(line, 1, 0, Arc::from("shader.spire"))
    }

    #[test]
    fn notes_do_not_count_as_errors() {
        let mut sink = DiagnosticSink::new();
        sink.diagnose(&pos(3), DiagnosticKind::SeeUsingOf("Lighting".into()));
        sink.diagnose(
            &pos(4),
            DiagnosticKind::BindingExceedsLimit {
                binding: 40,
                component: "albedo".into(),
                limit: 32,
            },
        );
        assert_eq!(sink.error_count(), 0);
        sink.diagnose(&pos(5), DiagnosticKind::SyntaxError);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.diagnostics().len(), 3);
    }

    #[test]
    fn output_buffer_formats_position_severity_and_id() {
        let mut sink = DiagnosticSink::new();
        sink.diagnose(&pos(7), DiagnosticKind::IllegalCharacterPrint('$'));
        assert_eq!(
            sink.output(),
            "shader.spire(7): error 10000: illegal character '$'\n"
        );
    }

    #[test]
    fn callback_sees_each_diagnostic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let mut sink = DiagnosticSink::with_callback(Box::new(move |d| {
            sink_seen.lock().unwrap().push(d.kind.id());
        }));
        sink.diagnose(&pos(1), DiagnosticKind::IllegalCharacterHex(0x7f));
        sink.diagnose(&pos(2), DiagnosticKind::IllegalCharacterLiteral);
        assert_eq!(*seen.lock().unwrap(), vec![10001, 10002]);
    }
}
