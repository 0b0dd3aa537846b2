//! Linear field scanner for tool results that do not parse as JSON.
//!
//! Legacy backends sometimes persisted truncated or otherwise invalid JSON.
//! The scanner looks for `"field": "value"` pairs directly in the text and
//! decodes the string literal by hand, so whatever prefix survived is still
//! recoverable.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedFields {
    pub command: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub output: Option<String>,
}

impl ScannedFields {
    pub fn recovered(&self) -> usize {
        [&self.command, &self.title, &self.summary, &self.output]
            .into_iter()
            .filter(|field| field.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.recovered() == 0
    }
}

/// Scan `text` for the known fields.
///
/// When `text` is itself a JSON string literal wrapping the payload, the
/// inner text is scanned as well and wins only if it recovered strictly
/// more fields than the outer scan.
pub fn scan(text: &str) -> ScannedFields {
    let outer = scan_once(text);
    if let Some(inner_text) = unwrap_json_string(text) {
        let inner = scan_once(&inner_text);
        if inner.recovered() > outer.recovered() {
            return inner;
        }
    }
    outer
}

fn scan_once(text: &str) -> ScannedFields {
    ScannedFields {
        command: scan_field(text, "command"),
        title: scan_field(text, "title"),
        summary: scan_field(text, "summary"),
        output: scan_field(text, "output"),
    }
}

/// Find the first `"field"` key followed by `:` and a string literal, and
/// return the decoded literal. Empty values count as absent.
pub fn scan_field(text: &str, field: &str) -> Option<String> {
    let needle = format!("\"{field}\"");
    let mut from = 0;
    while let Some(offset) = text[from..].find(&needle) {
        let after_key = from + offset + needle.len();
        from = after_key;

        let rest = text[after_key..].trim_start();
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let Some(body) = rest.trim_start().strip_prefix('"') else {
            continue;
        };
        let value = read_string_literal(body);
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// If `text` looks like a JSON string literal, return its decoded contents.
/// A literal cut off before its closing quote is decoded up to the cut.
pub fn unwrap_json_string(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('"')?;
    if let Ok(decoded) = serde_json::from_str::<String>(trimmed) {
        return Some(decoded);
    }
    Some(read_string_literal(body))
}

/// Decode a JSON string literal body (the text after the opening quote),
/// stopping at the first unescaped quote or at end of input.
pub fn read_string_literal(body: &str) -> String {
    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('b') => out.push('\u{8}'),
                Some('f') => out.push('\u{c}'),
                Some('/') => out.push('/'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some('u') => {
                    let Some(code) = read_hex4(&mut chars) else {
                        break;
                    };
                    out.push(decode_code_unit(code, &mut chars));
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            _ => out.push(ch),
        }
    }
    out
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut code = 0;
    for _ in 0..4 {
        let digit = chars.next()?.to_digit(16)?;
        code = code * 16 + digit;
    }
    Some(code)
}

/// Turn one `\uXXXX` code unit into a char, consuming a trailing low
/// surrogate escape when `code` is a high surrogate.
fn decode_code_unit(code: u32, chars: &mut std::str::Chars<'_>) -> char {
    if (0xD800..=0xDBFF).contains(&code) {
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('\\')
            && lookahead.next() == Some('u')
            && let Some(low) = read_hex4(&mut lookahead)
            && (0xDC00..=0xDFFF).contains(&low)
        {
            *chars = lookahead;
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER);
        }
        return char::REPLACEMENT_CHARACTER;
    }
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}
