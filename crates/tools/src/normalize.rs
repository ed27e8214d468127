//! Content normalization applied before anything is written.
//!
//! Models frequently emit file content with line breaks encoded as the two
//! characters `\` `n` instead of a real newline. `decode_escapes` turns those
//! back into control characters.

/// Decode `\\`, `\n`, `\r` and `\t` in one left-to-right pass.
///
/// An escaped backslash is consumed as a unit, so `\\n` yields a backslash
/// followed by `n`, never a newline. Any other escape (`\"`, `\u`, a trailing
/// lone `\`) is kept verbatim.
pub fn decode_escapes(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            _ => out.push('\\'),
        }
    }
    out
}
