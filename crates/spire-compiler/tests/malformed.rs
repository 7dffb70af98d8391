use spire_backend_core::BackendRegistry;
use spire_compiler::{CompileError, CompileOptions, CompileResult, Phase, ScopeChecker, Session};
use spire_ir::{DiagnosticKind, Severity};

/// Inputs that must be rejected with diagnostics, never with a panic.
const REJECTED: &[&str] = &[
    "float f() { return 1 + ; }",
    "float f() { float x = ; return x; }",
    "float f() { return 1.0 $ }",
    "void f() { { { {",
    "float f( { return; }",
    "struct S { float v; ",
    "typedef Foo Foo; Foo x;",
    "typedef A A;",
    "typedef A B; typedef B A; A v;",
    "struct S { float v; S inner; }; S s;",
    "struct A { B b; }; struct B { A a; }; A x;",
    "typedef Foo Foo; float f(Foo x) { return 1 + ; }",
    "float f() { return missing; }",
    "float g = g;",
    "float a = b; float b = 1.0;",
    "float f() { return f; }",
    "float f() { return PI; }",
    "float huge[3000000000];",
    "typedef float[4000000000] Huge; Huge h;",
    "float f() { int a[4000000000]; return 1.0; }",
    "#include \"missing.spire\"\nfloat f() { return 1.0; }",
    "#if 1\nfloat x;",
    "#endif\n",
    "\u{1}float x;",
    "Map<Key<int>> m = 1 >> ;",
    "float f() { n < m >> ; }",
];

/// Inputs that look odd but are valid.
const ACCEPTED: &[&str] = &[
    "",
    ";;;",
    "float big[268435456];",
    "float f() { return scale; } float scale = 2.0;",
    "struct Node { float v; }; typedef Node Leaf; typedef Leaf Tip; Tip t;",
];

const MAX_ERRORS: [usize; 3] = [0, 1, 100];

fn compile(source: &str, max_errors: usize) -> (CompileResult, Result<(), CompileError>) {
    let session = Session::empty();
    let options = CompileOptions {
        max_errors,
        ..CompileOptions::default()
    };
    let mut result = CompileResult::new();
    let unit = session.parse(&mut result, &options, source, "malformed.spire", None);
    let outcome = session.compile(
        &mut result,
        &mut [unit],
        &options,
        &mut ScopeChecker,
        &BackendRegistry::with_builtins(),
    );
    (result, outcome)
}

fn is_code_generation_error(kind: &DiagnosticKind) -> bool {
    matches!(
        kind,
        DiagnosticKind::BufferTooLarge(_)
            | DiagnosticKind::ArrayTooLarge { .. }
            | DiagnosticKind::InvalidTypeCast { .. }
            | DiagnosticKind::Unimplemented(_)
    )
}

#[test]
fn rejected_inputs_report_errors_at_every_error_limit() {
    for source in REJECTED {
        for max_errors in MAX_ERRORS {
            let (result, outcome) = compile(source, max_errors);
            assert!(
                result.sink.error_count() > 0,
                "{source:?} (max_errors {max_errors}) reported no error"
            );
            if max_errors == 0 {
                assert!(outcome.is_err(), "{source:?} compiled");
            }
        }
    }
}

#[test]
fn code_generation_only_sees_error_free_trees() {
    for source in REJECTED {
        for max_errors in MAX_ERRORS {
            let (result, outcome) = compile(source, max_errors);
            let early_errors = result
                .sink
                .diagnostics()
                .iter()
                .any(|d| d.severity >= Severity::Error && !is_code_generation_error(&d.kind));
            if early_errors {
                assert!(
                    result.programs.is_empty(),
                    "{source:?} (max_errors {max_errors}) was lowered"
                );
                assert!(matches!(
                    outcome,
                    Err(CompileError::Errors {
                        phase: Phase::Parsing | Phase::SemanticChecking,
                        ..
                    })
                ));
            }
        }
    }
}

#[test]
fn accepted_inputs_compile_cleanly() {
    for source in ACCEPTED {
        for max_errors in MAX_ERRORS {
            let (result, outcome) = compile(source, max_errors);
            assert!(
                outcome.is_ok() && result.sink.error_count() == 0,
                "{source:?}: {}",
                result.diagnostic_text()
            );
        }
    }
}

#[test]
fn deep_nesting_is_rejected() {
    let depth = 500;
    let expression = format!("{}1.0{}", "(".repeat(depth), ")".repeat(depth));
    let blocks = format!("void f() {{{}{}", "{".repeat(depth), "}".repeat(depth + 1));
    for source in [format!("float f() {{ return {expression}; }}"), blocks] {
        for max_errors in MAX_ERRORS {
            let (result, outcome) = compile(&source, max_errors);
            assert!(result.sink.error_count() > 0);
            assert!(outcome.is_err());
            assert!(result.programs.is_empty());
        }
    }
}

#[test]
fn oversized_array_is_reported_by_code_generation() {
    let (result, outcome) = compile("float huge[3000000000];", 0);
    assert!(matches!(
        outcome,
        Err(CompileError::Errors {
            phase: Phase::CodeGeneration,
            count: 1
        })
    ));
    assert_eq!(
        result.sink.diagnostics()[0].kind,
        DiagnosticKind::ArrayTooLarge {
            name: "huge".into(),
            len: 3_000_000_000
        }
    );
}
