use std::sync::{Arc, Mutex};

use spire_backend_core::BackendRegistry;
use spire_compiler::{CompileOptions, CompileResult, ScopeChecker, Session};
use spire_ir::{Diagnostic, Severity};

const STDLIB: &str = "__intrinsic float saturate(float x);\n__intrinsic float dot(float3 a, float3 b);";

#[test]
fn diagnostics_stream_to_the_callback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let mut result = CompileResult::with_callback(Box::new(move |d: &Diagnostic| {
        sink_seen.lock().unwrap().push(d.to_string());
    }));
    let session = Session::empty();
    let options = CompileOptions::default();
    let unit = session.parse(&mut result, &options, "float f() { return 1.0 $ }", "cb.spire", None);
    let outcome = session.compile(
        &mut result,
        &mut [unit],
        &options,
        &mut ScopeChecker,
        &BackendRegistry::with_builtins(),
    );
    assert!(outcome.is_err());
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert_eq!(seen.join("\n") + "\n", result.diagnostic_text());
    assert!(
        result
            .sink
            .diagnostics()
            .iter()
            .all(|d| d.severity >= Severity::Error)
    );
}

#[test]
fn one_session_serves_concurrent_compiles() {
    let session = Session::new(STDLIB).unwrap();
    let sources = [
        "float a(float x) { return saturate(x); }",
        "float b(float3 n, float3 l) { return dot(n, l); }",
        "float c(float v) { return saturate(v * 2.0); }",
    ];
    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let session = session.clone();
                scope.spawn(move || {
                    let options = CompileOptions::default();
                    let mut result = CompileResult::new();
                    let name = format!("unit{i}.spire");
                    let unit = session.parse(&mut result, &options, source, &name, None);
                    session
                        .compile(
                            &mut result,
                            &mut [unit],
                            &options,
                            &mut ScopeChecker,
                            &BackendRegistry::with_builtins(),
                        )
                        .unwrap();
                    result.source_text("il").unwrap().to_owned()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(outputs[0].contains("fn a(x: float) -> float {"));
    assert!(outputs[1].contains("= call dot("));
    assert!(outputs[2].contains("= call saturate("));
    // The shared standard library is untouched.
    assert_eq!(session.predefined().members.len(), 2);
}

#[test]
fn parse_file_reports_missing_files() {
    let session = Session::empty();
    let mut result = CompileResult::new();
    let err = session
        .parse_file(
            &mut result,
            &CompileOptions::default(),
            std::path::Path::new("/nonexistent/dir/shader.spire"),
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to read '/nonexistent/dir/shader.spire'"));
}
