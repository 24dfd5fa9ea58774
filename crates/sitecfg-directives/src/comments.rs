//! C comment stripping.
//!
//! Removes `//` and `/* ... */` comments while keeping every newline, so line
//! numbers reported by the parser still match the input.

use crate::DirectiveError;

/// Strip comments from `text`, preserving line structure.
pub fn strip_comments(text: &str) -> Result<String, DirectiveError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut line = 1usize;
    // Line on which the currently open block comment started
    let mut block_start: Option<usize> = None;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            out.push('\n');
            continue;
        }

        if block_start.is_some() {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                block_start = None;
                // A block comment separates tokens like whitespace does
                out.push(' ');
            }
            continue;
        }

        if c == '/' {
            match chars.peek() {
                Some('*') => {
                    chars.next();
                    block_start = Some(line);
                    continue;
                }
                Some('/') => {
                    // Skip to end of line, leaving the newline for the outer loop
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                    continue;
                }
                _ => {}
            }
        }

        out.push(c);
    }

    if let Some(start) = block_start {
        return Err(DirectiveError::Malformed {
            line: start,
            reason: "unterminated block comment".to_string(),
        });
    }

    Ok(out)
}
