//! Guard evaluation.
//!
//! A guard arrives as a flat postfix token stream (the surface grammar
//! parser lives upstream): `%project /a/bc sortsAfter` means
//! `%project sortsAfter "/a/bc"`. Evaluation is total by design — an
//! absent environment key reads as the empty string, an unknown operator
//! or malformed stream evaluates to `false` — so a guard can never abort
//! a scan.

use globset::Glob;
use regex::Regex;

use crate::Env;

/// The closed set of comparison operators.
///
/// Every operator also exists in a `not-`-prefixed negated form, handled
/// before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    SortsAfter,
    SortsBefore,
    Contains,
    IsEqualTo,
    FileMatches,
    RegexpMatches,
    IsIn,
    IsInstanceOf,
    IsEqualTrueAs,
    IsPrefixOf,
    IsSuffixOf,
    StartsWith,
    EndsWith,
}

impl Op {
    /// Map an operator token to its `Op`, `None` for unknown names.
    pub fn parse(token: &str) -> Option<Op> {
        match token {
            "sortsAfter" => Some(Op::SortsAfter),
            "sortsBefore" => Some(Op::SortsBefore),
            "contains" => Some(Op::Contains),
            "isEqualTo" => Some(Op::IsEqualTo),
            "fileMatches" => Some(Op::FileMatches),
            "regexpMatches" => Some(Op::RegexpMatches),
            "isIn" => Some(Op::IsIn),
            "isInstanceOf" => Some(Op::IsInstanceOf),
            "isEqualTrueAs" => Some(Op::IsEqualTrueAs),
            "isPrefixOf" => Some(Op::IsPrefixOf),
            "isSuffixOf" => Some(Op::IsSuffixOf),
            "startsWith" => Some(Op::StartsWith),
            "endsWith" => Some(Op::EndsWith),
            _ => None,
        }
    }
}

/// The `isInstanceOf` sub-kinds: shapes of the legacy expression
/// language a value can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Empty,
    IntLit,
    NumLit,
    StrLit,
    Name,
    Lvn,
    Gvn,
    Glvn,
    ExprItem,
    ActualName,
    Actual,
}

impl Class {
    fn parse(token: &str) -> Option<Class> {
        match token {
            "empty" => Some(Class::Empty),
            "intlit" => Some(Class::IntLit),
            "numlit" => Some(Class::NumLit),
            "strlit" => Some(Class::StrLit),
            "name" => Some(Class::Name),
            "lvn" => Some(Class::Lvn),
            "gvn" => Some(Class::Gvn),
            "glvn" => Some(Class::Glvn),
            "expritem" => Some(Class::ExprItem),
            "actualname" => Some(Class::ActualName),
            "actual" => Some(Class::Actual),
            _ => None,
        }
    }
}

/// Evaluate a postfix guard against `env`. The empty guard is true.
///
/// `true`/`false` push a literal; a bare token first fills the pending
/// term, then the pending value; an operator token consumes the pending
/// pair and pushes the comparison result; `not` flips the top of stack;
/// `and`/`or` combine the two topmost entries. Both operands of a
/// connective are already on the stack, so there is no short-circuit.
pub fn eval(guard: &[String], env: &Env) -> bool {
    if guard.is_empty() {
        return true;
    }

    let mut stack: Vec<bool> = Vec::new();
    let mut term = String::new();
    let mut value = String::new();
    for token in guard {
        match token.as_str() {
            "not" => {
                if let Some(top) = stack.last_mut() {
                    *top = !*top;
                }
            }
            "and" => {
                if let Some(top) = stack.pop() {
                    if let Some(under) = stack.last_mut() {
                        *under = top && *under;
                    }
                }
            }
            "or" => {
                if let Some(top) = stack.pop() {
                    if let Some(under) = stack.last_mut() {
                        *under = top || *under;
                    }
                }
            }
            "true" => stack.push(true),
            "false" => stack.push(false),
            t if Op::parse(t).is_some() || t.starts_with("not-") => {
                let result = compare(&term, t, &value, env);
                term.clear();
                value.clear();
                stack.push(result);
            }
            t => {
                if term.is_empty() {
                    term = t.to_string();
                } else {
                    value = t.to_string();
                }
            }
        }
    }
    stack.first().copied().unwrap_or(false)
}

fn compare(term: &str, operator: &str, value: &str, env: &Env) -> bool {
    if let Some(base) = operator.strip_prefix("not-") {
        return !compare(term, base, value, env);
    }
    let Some(op) = Op::parse(operator) else {
        log::debug!("unknown guard operator `{operator}` evaluates to false");
        return false;
    };
    let termc = env.get(term).map(String::as_str).unwrap_or("");
    match op {
        Op::FileMatches => Glob::new(value).map(|g| g.compile_matcher().is_match(termc)).unwrap_or(false),
        Op::RegexpMatches => Regex::new(value).map(|re| re.is_match(termc)).unwrap_or(false),
        Op::IsEqualTo => value == termc,
        Op::SortsAfter => termc > value,
        Op::SortsBefore => termc < value,
        Op::Contains => termc.contains(value),
        Op::IsPrefixOf => value.starts_with(termc),
        Op::StartsWith => termc.starts_with(value),
        Op::IsSuffixOf => value.ends_with(termc),
        Op::EndsWith => termc.ends_with(value),
        Op::IsIn => value.contains(termc),
        Op::IsEqualTrueAs => truthy(value) == truthy(termc),
        Op::IsInstanceOf => is_instance(termc, value),
    }
}

fn is_instance(termc: &str, class: &str) -> bool {
    let Some(class) = Class::parse(class) else {
        return false;
    };
    if class == Class::Empty {
        return termc.is_empty();
    }
    if termc.is_empty() {
        return false;
    }
    match class {
        Class::Empty => unreachable!(),
        Class::IntLit => regex!(r"^[+-]?[0-9]+$").is_match(termc),
        Class::NumLit => {
            if termc.matches('.').count() > 1 || termc.matches('E').count() > 1 {
                return false;
            }
            let stripped = termc.replace('.', "");
            regex!(r"^[+-]?[0-9]+$").is_match(&stripped)
                || regex!(r"^[+-]?[0-9]*E[+-]?[0-9]+$").is_match(&stripped)
        }
        Class::StrLit => termc.starts_with('"') && termc.ends_with('"'),
        Class::Name => regex!(r"^[%a-zA-Z][a-zA-Z0-9]*$").is_match(termc),
        Class::Lvn => lvn(termc),
        Class::Gvn => termc.starts_with('^') || termc.starts_with('@'),
        Class::Glvn => termc.starts_with('^') || termc.starts_with('@') || lvn(termc),
        Class::ExprItem => {
            if lvn(termc) {
                return false;
            }
            let reduced = reduce(termc);
            if reduced.starts_with('^') {
                return false;
            }
            !regex!(r"^\.[@a-zA-Z%]").is_match(&reduced)
        }
        Class::ActualName => regex!(r"^[%a-zA-Z][a-zA-Z0-9]*$").is_match(termc) || termc.starts_with('@'),
        Class::Actual => {
            if let Some(rest) = termc.strip_prefix('.') {
                if rest.is_empty() {
                    return false;
                }
                return regex!(r"^[%a-zA-Z][a-zA-Z0-9]*$").is_match(rest) || rest.starts_with('@');
            }
            let reduced = reduce(termc);
            !reduced.starts_with('(') && !reduced.contains(',')
        }
    }
}

/// Local-variable-name shape: `@…` indirection, or a letter/`%` head
/// whose collapsed form is purely alphanumeric.
fn lvn(term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if term != "@" && term.starts_with('@') {
        return true;
    }
    let first = term.as_bytes()[0];
    if !(first.is_ascii_alphabetic() || first == b'%') {
        return false;
    }
    let reduced = reduce(term);
    regex!(r"^[%a-zA-Z0-9]*$").is_match(&reduced)
}

/// Collapse quoted substrings to `"1"` and balanced parenthesized groups
/// to `a`, leaving only the top-level structure of the expression.
fn reduce(term: &str) -> String {
    let mut t = regex!(r#""[^"]*""#).replace_all(term, "\"1\"").into_owned();
    t = regex!(r#""1"+"#).replace_all(&t, "\"1\"").into_owned();
    loop {
        let collapsed = regex!(r"\([^()]*\)").replace_all(&t, "a").into_owned();
        if collapsed == t {
            break;
        }
        t = collapsed;
    }
    t
}

/// A value is truthy when its first character is one of `j y 1 t`,
/// case-insensitively.
fn truthy(value: &str) -> bool {
    value.chars().next().map(|c| "jy1t".contains(c.to_ascii_lowercase())).unwrap_or(false)
}

/// Rebuild the canonical infix text of a postfix guard: the inverse of
/// [`eval`]'s consumption order, used for canonical rendering only.
/// Embedded quotes in values are doubled.
pub fn infix(guard: &[String]) -> String {
    if guard.is_empty() {
        return String::new();
    }

    let mut pfix: Vec<String> = Vec::new();
    let mut term = String::new();
    let mut value = String::new();
    let mut stadium = 0u8;
    for token in guard {
        match token.as_str() {
            "not" | "and" | "or" => {
                pfix.push(format!(" {token} "));
                term.clear();
                value.clear();
                stadium = 0;
            }
            "true" | "false" => {
                pfix.push(token.clone());
                term.clear();
                value.clear();
                stadium = 0;
            }
            _ => {
                if stadium == 0 {
                    stadium = 1;
                    term = token.clone();
                    continue;
                }
                if stadium == 1 {
                    stadium = 2;
                    value = token.clone();
                    continue;
                }
                let quoted = value.replace('"', "\"\"");
                pfix.push(format!("{term} {token} \"{quoted}\""));
                term.clear();
                value.clear();
                stadium = 0;
            }
        }
    }

    let mut stack: Vec<String> = Vec::new();
    for piece in pfix {
        match piece.as_str() {
            " not " => {
                if let Some(top) = stack.last_mut() {
                    *top = format!("{piece}{top}");
                }
            }
            " and " | " or " => {
                if let Some(top) = stack.pop() {
                    if let Some(under) = stack.last_mut() {
                        *under = format!("({under}{piece}{top})");
                    }
                }
            }
            _ => stack.push(piece),
        }
    }
    stack.first().map(|s| s.trim().to_string()).unwrap_or_default()
}
