//! Identifier scanning for C and C++ source text.
//!
//! Only what symbol renaming needs: identifier tokens outside comments,
//! literals and `#include` lines. Numbers are skipped whole, digit
//! separators included, so `1'000` or `0x1Fu` never read as identifiers
//! or open a character literal.

use std::ops::Range;

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier<'a> {
    pub text: &'a str,
    /// Byte range in the scanned source.
    pub span: Range<usize>,
    /// 1-based line number.
    pub line: usize,
}

/// Every identifier in `source`, in order.
pub fn identifiers(source: &str) -> Vec<Identifier<'_>> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    if bytes[i] == b'\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b'#' if is_include_directive(&bytes[i + 1..]) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' | b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    match bytes[i] {
                        b'\\' => i += 1,
                        b'\n' => line += 1,
                        _ => {}
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
            }
            b'0'..=b'9' => {
                while i < bytes.len() {
                    let separator = bytes[i] == b'\''
                        && bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphanumeric());
                    if is_ident_continue(bytes[i]) || bytes[i] == b'.' || separator {
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            _ if is_ident_start(b) => {
                let start = i;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                let text = &source[start..i];
                if bytes.get(i) == Some(&b'"') && is_raw_string_prefix(text) {
                    i = skip_raw_string(bytes, i + 1, &mut line);
                    continue;
                }
                out.push(Identifier {
                    text,
                    span: start..i,
                    line,
                });
            }
            _ => i += 1,
        }
    }
    out
}

fn is_raw_string_prefix(text: &str) -> bool {
    matches!(text, "R" | "LR" | "uR" | "UR" | "u8R")
}

/// Skip `delim( ... )delim"` starting just after the opening quote.
///
/// Returns the index after the closing quote, or the end of input.
fn skip_raw_string(bytes: &[u8], start: usize, line: &mut usize) -> usize {
    let Some(open) = bytes[start..].iter().position(|b| *b == b'(') else {
        return bytes.len();
    };
    let delimiter = &bytes[start..start + open];
    let mut i = start + open + 1;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            *line += 1;
        } else if bytes[i] == b')'
            && bytes[i + 1..].starts_with(delimiter)
            && bytes.get(i + 1 + delimiter.len()) == Some(&b'"')
        {
            return i + delimiter.len() + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// `include <a/b.h>` names a header, not symbols.
fn is_include_directive(rest: &[u8]) -> bool {
    let start = rest
        .iter()
        .position(|b| *b != b' ' && *b != b'\t')
        .unwrap_or(rest.len());
    let rest = &rest[start..];
    ["include", "import"].iter().any(|directive| {
        rest.starts_with(directive.as_bytes())
            && !rest
                .get(directive.len())
                .is_some_and(|b| is_ident_continue(*b))
    })
}

/// Whether `name` is a valid C identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if is_ident_start(first) => bytes.all(is_ident_continue),
        _ => false,
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
