mod common;

use common::{AttributeChecker, compile};
use spire_compiler::{CompileError, Phase, ScopeChecker, Session};
use spire_ir::{DiagnosticKind, Severity};

#[test]
fn parse_errors_are_all_reported_in_one_pass() {
    let session = Session::empty();
    let (result, outcome) = compile(
        &session,
        "float f() { return 1.0 + ; }\n\
         float g() { float x = ; return x; }\n\
         float h() { return 2.0; }",
        &mut ScopeChecker,
    );
    match outcome {
        Err(CompileError::Errors {
            phase: Phase::Parsing,
            count,
        }) => assert!(count >= 2, "{}", result.diagnostic_text()),
        other => panic!("unexpected outcome {other:?}"),
    }
    let lines: Vec<u32> = result
        .sink
        .diagnostics()
        .iter()
        .map(|d| d.position.line)
        .collect();
    assert!(lines.contains(&1) && lines.contains(&2), "{lines:?}");
    assert!(!lines.contains(&3), "{lines:?}");
    // Nothing past the barrier runs.
    assert!(result.programs.is_empty());
    assert!(result.sources.is_empty());
}

#[test]
fn undefined_names_stop_before_code_generation() {
    let session = Session::empty();
    let (result, outcome) = compile(
        &session,
        "float f(float a) { return a * gain; }",
        &mut ScopeChecker,
    );
    assert!(matches!(
        outcome,
        Err(CompileError::Errors {
            phase: Phase::SemanticChecking,
            count: 1
        })
    ));
    assert_eq!(
        result.sink.diagnostics()[0].kind,
        DiagnosticKind::UndefinedIdentifier("gain".into())
    );
    assert!(result.programs.is_empty());
}

#[test]
fn duplicate_bindings_fail_code_generation() {
    let session = Session::empty();
    let (result, outcome) = compile(
        &session,
        "[Param] [Binding(2)] Texture2D albedo;\n\
         [Param] [Binding(2)] Texture2D normalMap;\n\
         [Input(vs)] float3 pos;\n\
         [World(vs)] [Output] float3 outPos = pos;",
        &mut AttributeChecker::new("Lit"),
    );
    assert!(
        matches!(
            outcome,
            Err(CompileError::Errors {
                phase: Phase::CodeGeneration,
                ..
            })
        ),
        "{outcome:?}"
    );
    let diagnostics = result.sink.diagnostics();
    assert!(diagnostics.iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::BindingAlreadyOccupiedByComponent { binding: 2, component } if component == "albedo"
    )), "{}", result.diagnostic_text());
    // The note points at the first definition.
    assert!(diagnostics.iter().any(|d| d.severity < Severity::Error
        && d.kind == DiagnosticKind::SeeDefinitionOf("albedo".into())));
    assert!(result.sources.is_empty());
}

#[test]
fn unbound_module_with_parameters_is_rejected() {
    let session = Session::empty();
    let mut checker = AttributeChecker::new("Lit");
    checker.binding_index = None;
    let (result, outcome) = compile(
        &session,
        "[Param] float3 tint;\n\
         [Input(vs)] float3 pos;\n\
         [World(vs)] [Output] float3 outPos = pos * tint;",
        &mut checker,
    );
    assert!(outcome.is_err());
    assert!(
        result.sink.diagnostics().iter().any(|d| matches!(
            d.kind,
            DiagnosticKind::TopLevelModuleUsedWithoutSpecifyingBinding(_)
        )),
        "{}",
        result.diagnostic_text()
    );
}

#[test]
fn diagnostic_text_is_one_line_per_diagnostic() {
    let session = Session::empty();
    let (result, _) = compile(&session, "float f() { return y; }", &mut ScopeChecker);
    let text = result.diagnostic_text();
    assert_eq!(text.lines().count(), result.sink.diagnostics().len());
    assert!(text.contains("error"), "{text}");
    assert!(text.contains("undefined identifier 'y'"), "{text}");
}
