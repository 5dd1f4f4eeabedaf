//! Conversion of authored tag names into physical identifiers.

/// Convert a tag name into an upper-case, underscore-delimited identifier.
///
/// - a camelCase boundary (lower-case letter followed by upper-case) gets an
///   underscore: `camelCase` -> `CAMEL_CASE`
/// - `-`, `.` and `_` each become one underscore
/// - letters are upper-cased, digits kept, anything else becomes `_`
/// - a leading digit is prefixed with `_`
///
/// Distinct tags can map to the same identifier (`Name`, `name`, `NAME`);
/// name resolution disambiguates them.
pub fn sanitize_identifier(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len() + 4);
    let mut prev: Option<char> = None;

    for c in tag.chars() {
        match c {
            'A'..='Z' => {
                if prev.is_some_and(|p| p.is_ascii_lowercase()) {
                    out.push('_');
                }
                out.push(c);
            }
            'a'..='z' => out.push(c.to_ascii_uppercase()),
            '0'..='9' => {
                if out.is_empty() {
                    out.push('_');
                }
                out.push(c);
            }
            _ => out.push('_'),
        }
        prev = Some(c);
    }

    out
}
