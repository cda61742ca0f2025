// SPDX-License-Identifier: AGPL-3.0

//! Parsing solver stdout back into models.

use crate::adapter::Model;
use cpex_symbolic::{Sort, SymValue};

/// The `check-sat` answer: the first non-empty line of stdout.
pub fn check_sat_answer(stdout: &str) -> &str {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Parse standard `(get-value (<name>))` replies, one per line:
/// `((x 5))`, `((x (- 5)))`, `((x "foo"))`.
pub fn parse_get_value(stdout: &str, vars: &[(String, Sort)]) -> Model {
    let mut model = Model::new();

    for line in stdout.lines() {
        let line = line.trim();
        let Some(inner) = line.strip_prefix("((").and_then(|l| l.strip_suffix("))")) else {
            continue;
        };
        let Some((name, value_text)) = inner.split_once(' ') else {
            continue;
        };
        let name = name.trim_matches('|');
        let Some((_, sort)) = vars.iter().find(|(n, _)| n == name) else {
            continue;
        };
        let value = match sort {
            Sort::Int => parse_int_value(value_text).map(SymValue::Int),
            Sort::Str => parse_string_value(value_text).map(SymValue::Str),
            Sort::Bool => None,
        };
        if let Some(value) = value {
            model.insert(name.to_string(), value);
        }
    }

    model
}

fn parse_int_value(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("(-").and_then(|t| t.strip_suffix(')')) {
        return inner.trim().parse::<i64>().ok().map(|v| -v);
    }
    text.parse().ok()
}

/// Decode an SMT-LIB string literal: doubled quotes and `\u{..}` escapes.
fn parse_string_value(text: &str) -> Option<String> {
    let text = text.trim();
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;

    let mut out = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                // Doubled quote inside the literal.
                if chars.peek() == Some(&'"') {
                    chars.next();
                }
                out.push('"');
            }
            '\\' => {
                if chars.peek() == Some(&'u') {
                    chars.next();
                    if let Some(decoded) = decode_unicode_escape(&mut chars) {
                        out.push(decoded);
                        continue;
                    }
                    out.push('\\');
                    out.push('u');
                } else {
                    out.push('\\');
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// `{XXXX}` or a bare 4-digit form after `\u` has been consumed.
fn decode_unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<char> {
    let mut digits = String::new();
    if chars.peek() == Some(&'{') {
        chars.next();
        for c in chars.by_ref() {
            if c == '}' {
                break;
            }
            digits.push(c);
        }
    } else {
        for _ in 0..4 {
            digits.push(*chars.peek()?);
            chars.next();
        }
    }
    let code = u32::from_str_radix(&digits, 16).ok()?;
    char::from_u32(code)
}
