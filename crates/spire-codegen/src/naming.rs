/// Turns an arbitrary name into an identifier backends can emit.
///
/// Every run of characters outside `[0-9A-Za-z]` (underscores included)
/// becomes `_`, `_I_`, `_I_I_`, ...; a trailing run is closed with `I`, so
/// distinct inputs keep distinct outputs.
pub fn escape_code_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            in_run = false;
            out.push(ch);
        } else {
            out.push_str(if in_run { "I_" } else { "_" });
            in_run = true;
        }
    }
    if in_run {
        out.push('I');
    }
    out
}
