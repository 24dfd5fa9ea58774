//! Macro replacement-list parsing.
//!
//! Only object-like macros with a single literal are accepted: an empty body,
//! an integer, `true`/`false`, or a bare identifier (an enumerated symbol).

use crate::is_identifier;

/// The literal value of a `#define`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// `#define NAME` with no replacement list
    Empty,
    Int(i64),
    Bool(bool),
    /// A symbolic constant such as `PJ_SSL_SOCK_IMP_APPLE`
    Ident(String),
}

/// Parse a replacement list into a [`RawValue`].
///
/// Returns a human-readable reason on failure; the caller attaches the line.
pub fn parse_value(text: &str) -> Result<RawValue, String> {
    let mut body = text.trim();
    if body.is_empty() {
        return Ok(RawValue::Empty);
    }

    // Peel redundant parentheses: `((1))` -> `1`
    while body.starts_with('(') && body.ends_with(')') {
        body = body[1..body.len() - 1].trim();
    }
    if body.is_empty() {
        return Err("empty parenthesized value".to_string());
    }

    match body {
        "true" => return Ok(RawValue::Bool(true)),
        "false" => return Ok(RawValue::Bool(false)),
        _ => {}
    }

    if is_identifier(body) {
        return Ok(RawValue::Ident(body.to_string()));
    }

    parse_int(body)
        .map(RawValue::Int)
        .ok_or_else(|| format!("unsupported macro value '{}'", text.trim()))
}

/// Parse a C integer literal: optional sign, decimal or `0x` hex, optional
/// `u`/`l` suffixes.
fn parse_int(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };

    let digits = unsigned.trim_end_matches(['u', 'U', 'l', 'L']);

    // Digits are checked up front; `from_str_radix` would accept a sign
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u64>().ok()?
    };

    // Widen so that i64::MIN's magnitude fits before negation
    let value = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(value).ok()
}
