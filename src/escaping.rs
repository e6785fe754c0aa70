// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reversible percent-encoding of the characters that carry meaning in
//! build-file expressions.
//!
//! The engine keeps every intermediate string in escaped form so that a
//! `;` coming from a property value can never be mistaken for an item
//! list separator. Only the final rendering step unescapes.

use std::borrow::Cow;

/// Characters that are encoded by [`escape`].
pub const SPECIAL_CHARS: [char; 7] = ['%', '*', '?', '@', '$', ';', '\''];

fn is_special(ch: char) -> bool {
    SPECIAL_CHARS.contains(&ch)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Encode every special character as `%xx` (lowercase hex).
///
/// Borrows the input when there is nothing to encode. Not idempotent:
/// escaping twice encodes the `%` introduced by the first pass.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_special) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        if is_special(ch) {
            out.push_str(&format!("%{:02x}", ch as u32));
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

/// Decode every `%` followed by two hex digits.
///
/// A `%` that is not followed by two hex digits is kept verbatim.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('%') {
        return Cow::Borrowed(s);
    }

    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut changed = false;
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2])) {
                let decoded = (hi << 4) | lo;
                if decoded.is_ascii() {
                    out.push(decoded);
                } else {
                    // Latin-1 code point; re-encode as UTF-8.
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(char::from(decoded).encode_utf8(&mut buf).as_bytes());
                }
                idx += 3;
                changed = true;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }

    if !changed {
        return Cow::Borrowed(s);
    }

    match String::from_utf8(out) {
        Ok(decoded) => Cow::Owned(decoded),
        // Only whole UTF-8 sequences are copied and ASCII/Latin-1 is re-encoded.
        Err(_) => Cow::Borrowed(s),
    }
}

/// Whether the string contains an escaped `*` or `?`.
pub fn contains_escaped_wildcards(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.contains("%2a") || lower.contains("%3f")
}

/// Split on raw semicolons, trimming whitespace and dropping empty entries.
///
/// Escaped semicolons (`%3b`) are ordinary characters here.
pub fn split_semicolon_separated_list(s: &str) -> Vec<&str> {
    s.split(';')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape("a;b"), "a%3bb");
        assert_eq!(escape("$(x)@'%*?"), "%24(x)%40%27%25%2a%3f");
        assert!(matches!(escape("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn escape_is_not_idempotent() {
        let once = escape("50%");
        let twice = escape(&once);
        assert_eq!(once, "50%25");
        assert_eq!(twice, "50%2525");
    }

    #[test]
    fn unescape_round_trip() {
        for s in ["", "a;b;c", "%", "100% sure", "$(Foo)", "it's @(x)", "naïve ;?*"] {
            assert_eq!(unescape(&escape(s)), s);
        }
    }

    #[test]
    fn unescape_leaves_malformed_sequences() {
        assert_eq!(unescape("%zz%4"), "%zz%4");
        assert_eq!(unescape("%41%3B%3b"), "A;;");
        assert!(matches!(unescape("no escapes"), Cow::Borrowed(_)));
    }

    #[test]
    fn split_list() {
        assert_eq!(
            split_semicolon_separated_list(" a ; b%3bc;;\t"),
            vec!["a", "b%3bc"]
        );
        assert!(split_semicolon_separated_list(" ; ").is_empty());
    }

    #[test]
    fn escaped_wildcards() {
        assert!(contains_escaped_wildcards("a%2Ab"));
        assert!(contains_escaped_wildcards("a%3fb"));
        assert!(!contains_escaped_wildcards("a*b"));
    }
}
