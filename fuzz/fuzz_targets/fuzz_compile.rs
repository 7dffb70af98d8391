#![no_main]

use libfuzzer_sys::fuzz_target;
use spire_backend_core::BackendRegistry;
use spire_compiler::{CompileOptions, CompileResult, ScopeChecker, Session};

fuzz_target!(|data: &[u8]| {
    // The first byte picks the error limit; the rest is the source.
    let Some((&limit, rest)) = data.split_first() else {
        return;
    };
    let Ok(source) = std::str::from_utf8(rest) else {
        return;
    };
    let session = Session::empty();
    let options = CompileOptions {
        max_errors: usize::from(limit % 4),
        ..CompileOptions::default()
    };
    let mut result = CompileResult::new();
    let unit = session.parse(&mut result, &options, source, "fuzz.spire", None);
    let outcome = session.compile(
        &mut result,
        &mut [unit],
        &options,
        &mut ScopeChecker,
        &BackendRegistry::with_builtins(),
    );
    if outcome.is_ok() {
        assert!(result.sink.error_count() <= options.max_errors);
    }
});
