//! Lexer for preprocessor-style configuration headers.
//!
//! Turns the text of a `config_site.h`-like file into an ordered list of
//! `#define` / `#undef` / `#include` directives. Conditional compilation is
//! not evaluated: the only conditional accepted is a whole-file include guard.

mod comments;
mod value;

pub use comments::strip_comments;
pub use value::{parse_value, RawValue};

use regex_lite::Regex;
use std::sync::OnceLock;

/// Errors produced while lexing a directive file. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("line {line}: malformed directive: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: unsupported construct: {construct}")]
    Unsupported { line: usize, construct: String },
}

/// One directive together with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub line: usize,
    pub kind: DirectiveKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    Define { name: String, value: RawValue },
    Undef { name: String },
    /// `#include` target with `<>` or `""` stripped
    Include { target: String },
}

/// A lexed directive file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveFile {
    /// Include guard macro, if the file had one
    pub guard: Option<String>,
    pub directives: Vec<Directive>,
}

impl DirectiveFile {
    /// Targets of every `#include`, in order.
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().filter_map(|d| match &d.kind {
            DirectiveKind::Include { target } => Some(target.as_str()),
            _ => None,
        })
    }
}

/// Check whether `name` is a C identifier.
pub fn is_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"))
        .is_match(name)
}

fn directive_regex() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| {
        Regex::new(r"^#\s*([A-Za-z_]+)\s*(.*)$").expect("valid directive pattern")
    })
}

/// A directive line before interpretation.
struct RawLine<'a> {
    line: usize,
    word: &'a str,
    rest: &'a str,
}

const CONDITIONALS: &[&str] = &["if", "ifdef", "ifndef", "elif", "else", "endif"];

/// Lex a directive file.
pub fn parse(text: &str) -> Result<DirectiveFile, DirectiveError> {
    let stripped = strip_comments(text)?;
    let raw = split_lines(&stripped)?;
    let (guard, body) = strip_include_guard(&raw);

    let mut directives = Vec::with_capacity(body.len());
    for raw_line in body {
        directives.push(interpret(raw_line)?);
    }

    Ok(DirectiveFile { guard, directives })
}

fn split_lines(text: &str) -> Result<Vec<RawLine<'_>>, DirectiveError> {
    let mut out = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.ends_with('\\') {
            return Err(DirectiveError::Unsupported {
                line: line_no,
                construct: "line continuation".to_string(),
            });
        }

        let caps = directive_regex()
            .captures(trimmed)
            .ok_or_else(|| DirectiveError::Malformed {
                line: line_no,
                reason: format!("expected a preprocessor directive, found '{}'", trimmed),
            })?;

        let word = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
        out.push(RawLine {
            line: line_no,
            word,
            rest,
        });
    }

    Ok(out)
}

/// Detect `#ifndef G` / `#define G` ... `#endif` wrapping the whole file.
fn strip_include_guard<'a, 'b>(lines: &'b [RawLine<'a>]) -> (Option<String>, &'b [RawLine<'a>]) {
    if lines.len() < 3 {
        return (None, lines);
    }

    let first = &lines[0];
    let second = &lines[1];
    let last = &lines[lines.len() - 1];

    let is_guard = first.word == "ifndef"
        && is_identifier(first.rest)
        && second.word == "define"
        && second.rest == first.rest
        && last.word == "endif";

    if is_guard {
        (Some(first.rest.to_string()), &lines[2..lines.len() - 1])
    } else {
        (None, lines)
    }
}

fn interpret(raw: &RawLine<'_>) -> Result<Directive, DirectiveError> {
    let line = raw.line;
    let malformed = |reason: String| DirectiveError::Malformed { line, reason };

    let kind = match raw.word {
        "define" => {
            let name_len = raw
                .rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(raw.rest.len());
            let (name, body) = raw.rest.split_at(name_len);

            if !is_identifier(name) {
                return Err(malformed(format!("invalid macro name in '#define {}'", raw.rest)));
            }
            if body.starts_with('(') {
                return Err(DirectiveError::Unsupported {
                    line,
                    construct: format!("function-like macro '{}'", name),
                });
            }

            let value = parse_value(body).map_err(malformed)?;
            DirectiveKind::Define {
                name: name.to_string(),
                value,
            }
        }
        "undef" => {
            if !is_identifier(raw.rest) {
                return Err(malformed(format!("invalid macro name in '#undef {}'", raw.rest)));
            }
            DirectiveKind::Undef {
                name: raw.rest.to_string(),
            }
        }
        "include" => {
            let target = raw
                .rest
                .trim_start_matches(['<', '"'])
                .trim_end_matches(['>', '"'])
                .trim();
            if target.is_empty() {
                return Err(malformed("empty #include target".to_string()));
            }
            DirectiveKind::Include {
                target: target.to_string(),
            }
        }
        word if CONDITIONALS.contains(&word) => {
            return Err(DirectiveError::Unsupported {
                line,
                construct: format!("conditional directive '#{}'", word),
            });
        }
        other => {
            return Err(DirectiveError::Unsupported {
                line,
                construct: format!("directive '#{}'", other),
            });
        }
    };

    Ok(Directive { line, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn define(name: &str, value: RawValue) -> DirectiveKind {
        DirectiveKind::Define {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_define_and_undef() {
        let file = parse("#undef FOO\n#define FOO 1\n").unwrap();
        assert_eq!(file.guard, None);
        assert_eq!(
            file.directives,
            vec![
                Directive {
                    line: 1,
                    kind: DirectiveKind::Undef {
                        name: "FOO".to_string()
                    }
                },
                Directive {
                    line: 2,
                    kind: define("FOO", RawValue::Int(1)),
                },
            ]
        );
    }

    #[test]
    fn test_include_guard_is_stripped() {
        let text = "#ifndef __CFG_H__\n#define __CFG_H__\n#define A 1\n#endif /* __CFG_H__ */\n";
        let file = parse(text).unwrap();
        assert_eq!(file.guard.as_deref(), Some("__CFG_H__"));
        assert_eq!(file.directives.len(), 1);
        assert_eq!(file.directives[0].kind, define("A", RawValue::Int(1)));
        assert_eq!(file.directives[0].line, 3);
    }

    #[test]
    fn test_include_is_recorded() {
        let file = parse("#define A 1\n#include <pj/config_site_sample.h>\n").unwrap();
        let includes: Vec<_> = file.includes().collect();
        assert_eq!(includes, vec!["pj/config_site_sample.h"]);
    }

    #[test]
    fn test_spacing_after_hash() {
        let file = parse("#  define   A   2").unwrap();
        assert_eq!(file.directives[0].kind, define("A", RawValue::Int(2)));
    }

    #[test]
    fn test_empty_define() {
        let file = parse("#define PJ_AUTOCONF").unwrap();
        assert_eq!(file.directives[0].kind, define("PJ_AUTOCONF", RawValue::Empty));
    }

    #[test]
    fn test_conditional_rejected() {
        let err = parse("#define A 1\n#ifdef A\n#define B 1\n#endif\n").unwrap_err();
        assert!(matches!(err, DirectiveError::Unsupported { line: 2, .. }));
    }

    #[test]
    fn test_function_like_macro_rejected() {
        let err = parse("#define MAX(a,b) ((a)>(b)?(a):(b))").unwrap_err();
        assert!(matches!(err, DirectiveError::Unsupported { line: 1, .. }));
    }

    #[test]
    fn test_line_continuation_rejected() {
        let err = parse("#define A \\\n  1").unwrap_err();
        assert!(matches!(err, DirectiveError::Unsupported { line: 1, .. }));
    }

    #[test]
    fn test_plain_text_rejected() {
        let err = parse("\n\nint x = 1;").unwrap_err();
        assert!(matches!(err, DirectiveError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_pragma_rejected() {
        let err = parse("#pragma once").unwrap_err();
        assert!(matches!(err, DirectiveError::Unsupported { .. }));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("PJ_M_ARM"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("A-B"));
        assert!(!is_identifier(""));
    }
}
