use std::borrow::Cow;

/// Decode the literal two-character sequences `\n`, `\t`, `\r`, `\\` and `\"`.
///
/// Any other backslash sequence (`\x41`, `\u0041`, a trailing lone `\`) is
/// copied through untouched. Input without a backslash is returned borrowed.
pub fn decode(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let replacement = match chars.peek() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('\\') => '\\',
            Some('"') => '"',
            _ => {
                out.push('\\');
                continue;
            }
        };
        chars.next();
        out.push(replacement);
    }
    Cow::Owned(out)
}
