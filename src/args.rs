//! Argument-list parsing for macro call sites.
//!
//! A call-site argument list is a parenthesized, comma-separated list in
//! which `«…»`, `⟦…⟧` and `"…"` protect their content (commas and parens
//! inside them are plain text) and bare parens nest. Errors never abort
//! the scan: [`ParsedArgs`] always carries the text consumed so far, so
//! the tokenizer can keep an ill-formed call site as literal text while
//! callers that care (argument binding) surface the error.

use thiserror::Error;

/// Malformed argument list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("argument list does not start with `(`")]
    MissingOpen,
    #[error("no end `)`")]
    Unterminated,
    #[error("no `{0}` found")]
    Unclosed(char),
}

/// Result of scanning one argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    /// Raw argument strings, trimmed, protecting delimiters kept.
    pub args: Vec<String>,
    /// Exact input prefix the scan consumed, including both parens.
    pub consumed: String,
    pub error: Option<ArgError>,
}

/// Split the leading `(...)` of `text` into raw arguments.
///
/// A list of exactly one empty argument is normalized to no arguments, so
/// `()` and `(  )` both yield an empty `args`.
pub fn parse_args(text: &str) -> ParsedArgs {
    if !text.starts_with('(') {
        return ParsedArgs { args: Vec::new(), consumed: String::new(), error: Some(ArgError::MissingOpen) };
    }

    let mut consumed = String::from("(");
    let mut args: Vec<String> = Vec::new();
    let mut arg = String::new();
    let mut closer: Option<char> = None;
    let mut nest = 0usize;
    let mut error = Some(ArgError::Unterminated);

    for ch in text[1..].chars() {
        consumed.push(ch);

        if let Some(c) = closer {
            arg.push(ch);
            if c == ch {
                closer = None;
            }
            continue;
        }
        match ch {
            ')' => {
                if nest == 0 {
                    error = None;
                    args.push(arg.trim().to_string());
                    break;
                }
                arg.push(ch);
                nest -= 1;
            }
            '(' => {
                arg.push(ch);
                nest += 1;
            }
            '«' => {
                arg.push(ch);
                closer = Some('»');
            }
            '⟦' => {
                arg.push(ch);
                closer = Some('⟧');
            }
            '"' => {
                arg.push(ch);
                closer = Some('"');
            }
            ',' => {
                if nest == 0 {
                    args.push(arg.trim().to_string());
                    arg.clear();
                    continue;
                }
                arg.push(ch);
            }
            _ => arg.push(ch),
        }
    }

    if args.len() == 1 && args[0].is_empty() {
        args.clear();
    }
    if let Some(c) = closer {
        error = Some(ArgError::Unclosed(c));
    }

    ParsedArgs { args, consumed, error }
}

/// Trim an argument and strip one level of `«»` or `⟦⟧` wrapping.
pub fn clean_arg(s: &str) -> String {
    let s = s.trim();
    if s.is_empty() {
        return String::new();
    }
    if let Some(rest) = s.strip_prefix('«') {
        return rest.strip_suffix('»').unwrap_or(rest).to_string();
    }
    if let Some(rest) = s.strip_prefix('⟦') {
        return rest.strip_suffix('⟧').unwrap_or(rest).to_string();
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str) -> (Vec<String>, String) {
        let parsed = parse_args(text);
        assert_eq!(parsed.error, None, "unexpected error for {:?}", text);
        (parsed.args, parsed.consumed)
    }

    #[test]
    fn plain_lists() {
        let (args, consumed) = ok("(a, b, c)");
        assert_eq!(args, vec!["a", "b", "c"]);
        assert_eq!(consumed, "(a, b, c)");

        let (args, _) = ok("( spaced , out )");
        assert_eq!(args, vec!["spaced", "out"]);
    }

    #[test]
    fn empty_list_is_normalized() {
        assert_eq!(ok("()").0, Vec::<String>::new());
        assert_eq!(ok("(   )").0, Vec::<String>::new());
        // Two empty arguments are real arguments.
        assert_eq!(ok("(,)").0, vec!["", ""]);
    }

    #[test]
    fn nesting_protects_commas() {
        let (args, _) = ok("(f(x, y), z)");
        assert_eq!(args, vec!["f(x, y)", "z"]);

        let (args, _) = ok("((a, (b, c)), d)");
        assert_eq!(args, vec!["(a, (b, c))", "d"]);
    }

    #[test]
    fn delimiters_protect_everything() {
        let (args, _) = ok("(«a, b)», c)");
        assert_eq!(args, vec!["«a, b)»", "c"]);

        let (args, _) = ok("(⟦x,(y⟧, z)");
        assert_eq!(args, vec!["⟦x,(y⟧", "z"]);

        let (args, _) = ok(r#"("a,b", c)"#);
        assert_eq!(args, vec![r#""a,b""#, "c"]);
    }

    #[test]
    fn consumed_stops_at_the_closing_paren() {
        let (args, consumed) = ok("(a, b) and the rest");
        assert_eq!(args, vec!["a", "b"]);
        assert_eq!(consumed, "(a, b)");
    }

    #[test]
    fn errors() {
        assert_eq!(parse_args("no paren").error, Some(ArgError::MissingOpen));
        assert_eq!(parse_args("(a, b").error, Some(ArgError::Unterminated));
        assert_eq!(parse_args("(a, «b)").error, Some(ArgError::Unclosed('»')));
        assert_eq!(parse_args(r#"("abc)"#).error, Some(ArgError::Unclosed('"')));
        // Even on error the consumed prefix is kept.
        assert_eq!(parse_args("(a, b").consumed, "(a, b");
    }

    #[test]
    fn clean_arg_strips_one_wrapping() {
        assert_eq!(clean_arg("  plain "), "plain");
        assert_eq!(clean_arg("«a, b»"), "a, b");
        assert_eq!(clean_arg("⟦x(y⟧"), "x(y");
        assert_eq!(clean_arg("«nested «inner»»"), "nested «inner»");
        assert_eq!(clean_arg(""), "");
    }
}
