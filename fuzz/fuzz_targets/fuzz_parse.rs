#![no_main]

use libfuzzer_sys::fuzz_target;
use spire_ir::DiagnosticSink;
use spire_parser::{ParseOptions, parse, preprocess, tokenize};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // Lexing, preprocessing and parsing report errors; they never panic.
        let mut sink = DiagnosticSink::new();
        let tokens = tokenize("fuzz.spire", source, &mut sink);
        let tokens = preprocess(&tokens, "fuzz.spire", &[], None, &mut sink);
        let _ = parse(&tokens, &mut sink, "fuzz.spire", None, &ParseOptions::default());
    }
});
