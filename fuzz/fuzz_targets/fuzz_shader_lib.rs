#![no_main]

use libfuzzer_sys::fuzz_target;
use spire_ir::ShaderLibFile;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Anything that reads must also read back after being written.
        if let Ok(lib) = ShaderLibFile::from_text(text) {
            let written = lib.to_text();
            assert!(ShaderLibFile::from_text(&written).is_ok(), "{written}");
        }
    }
});
