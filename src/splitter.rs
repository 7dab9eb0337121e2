//! Object-reference tokenizing.
//!
//! [`split`] scans arbitrary text for embedded object references (macro
//! calls `m4_X`, includes `i4_X`, translations `t4_X`, registry values
//! `r4_x`, language codes `l4_A_x`) and returns alternating
//! literal/reference segments. The tokenizer never fails: anything that
//! does not pass the starter rules stays literal, and concatenating the
//! segments always reproduces the input byte for byte.
//!
//! Disambiguation around the `4_` marker is the delicate part: `m4_m4`
//! is one reference while `m4_m4_m4` is a literal `m4_` followed by the
//! reference `m4_m4`. [`is_starter`] settles this with a bounded
//! lookahead walk over the window instead of the unbounded recursion a
//! direct reading of the rules would suggest.

use crate::args::parse_args;

/// Split `text` into alternating literal/reference segments.
///
/// Even indices hold literal text, odd indices hold references; the
/// result always starts and ends with a literal (possibly empty). After
/// a macro reference the following segment carries its parenthesized
/// argument list when one is present, and stays otherwise a plain
/// literal.
pub fn split(text: &str) -> Vec<String> {
    let mut result = vec![String::new()];
    let mut rest = text;

    loop {
        if rest.is_empty() {
            break;
        }
        let Some(k) = rest.find("4_") else {
            result.last_mut().unwrap().push_str(rest);
            break;
        };
        if k == 0 {
            result.last_mut().unwrap().push_str("4_");
            rest = &rest[2..];
            continue;
        }
        if k + 2 == rest.len() {
            result.last_mut().unwrap().push_str(rest);
            break;
        }
        let bytes = rest.as_bytes();
        if !is_starter(&bytes[k - 1..]) {
            // The marker byte `4` is ASCII, so both cuts sit on char
            // boundaries even in the middle of multibyte text.
            result.last_mut().unwrap().push_str(&rest[..k + 2]);
            rest = &rest[k + 2..];
            continue;
        }

        result.last_mut().unwrap().push_str(&rest[..k - 1]);
        rest = &rest[k - 1..];
        let kind = rest.as_bytes()[0];
        let tail = &rest.as_bytes()[3..];
        let len = match kind {
            b'm' | b'i' | b't' => gobble_name(tail),
            b'r' => gobble_registry(tail),
            b'l' => gobble_lgcode(tail),
            _ => 0,
        };
        result.push(rest[..3 + len].to_string());
        rest = &rest[3 + len..];
        if kind == b'm' && rest.starts_with('(') {
            let parsed = parse_args(rest);
            rest = &rest[parsed.consumed.len()..];
            result.push(parsed.consumed);
        } else {
            result.push(String::new());
        }
    }
    result
}

/// Return true when `text` is exactly one object reference and nothing
/// else.
pub fn is_object_name(text: &str) -> bool {
    let parts = split(text);
    parts.len() == 3 && parts[0].is_empty() && parts[2].is_empty()
}

/// Return true when `window` opens a genuine object reference.
///
/// The window must start with the kind byte, i.e. one position before
/// the `4_` marker. A window whose reference is immediately shadowed by
/// a nested starter one kind-byte later is rejected; that rule is what
/// keeps `m4_m4_m4` from being read as starting with `m4_m4_`.
///
/// Implemented as a parity walk: step forward while the kind-specific
/// window shape holds, then the window is a starter exactly when the
/// chain has odd length. This is equivalent to the recursive rule
/// `starter(w) = shape(w) && !starter(w + step)` but terminates by
/// construction and is bounded by the window length.
pub fn is_starter(window: &[u8]) -> bool {
    let mut w = window;
    let mut depth = 0usize;
    while let Some(step) = starter_shape(w) {
        depth += 1;
        w = &w[step..];
    }
    depth % 2 == 1
}

/// One step of the starter walk: how far to the next candidate window,
/// or `None` when `w` does not have a valid reference shape.
fn starter_shape(w: &[u8]) -> Option<usize> {
    if w.len() < 4 || w[1] != b'4' || w[2] != b'_' {
        return None;
    }
    match w[0] {
        b'm' | b'i' | b't' => {
            if w[3].is_ascii_alphabetic() { Some(3) } else { None }
        }
        b'r' => {
            if w[3].is_ascii_lowercase() { Some(3) } else { None }
        }
        b'l' => {
            if !w[3].is_ascii_alphabetic() {
                return None;
            }
            // Language codes need the full two-segment shape: a valid
            // algorithm segment and a non-empty name after the
            // underscore. `l4_A` or `l4_N_` never start a reference.
            let len = gobble_lgcode(&w[3..]);
            if len == 0 {
                return None;
            }
            let obj = &w[3..3 + len];
            match obj.iter().position(|&b| b == b'_') {
                Some(p) if p + 1 < obj.len() => Some(4),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Consume a macro/include/translation identifier: the maximal ASCII
/// alphanumeric run, trimmed when its `…4` tail turns out to open a
/// nested reference.
fn gobble_name(rest: &[u8]) -> usize {
    if !rest.first().is_some_and(|b| b.is_ascii_alphabetic()) {
        return 0;
    }
    let len = rest.iter().take_while(|b| b.is_ascii_alphanumeric()).count();
    if rest[len - 1] == b'4' && len >= 2 && is_starter(&rest[len - 2..]) {
        return len - 2;
    }
    len
}

/// Consume a registry identifier: lowercase alphanumerics and
/// underscores, truncated at a literal `--` marker and at a nested
/// starter.
fn gobble_registry(rest: &[u8]) -> usize {
    if !rest.first().is_some_and(|b| b.is_ascii_lowercase()) {
        return 0;
    }
    let mut len = rest
        .iter()
        .take_while(|&&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        .count();
    if let Some(k) = find(&rest[..len], b"--") {
        len = k;
    }
    if let Some(k) = find(&rest[..len], b"4_") {
        if is_starter(&rest[k - 1..]) {
            return k - 1;
        }
    }
    len
}

/// Consume a language-code identifier: `Algo_Name` where the algorithm
/// segment is one of `N E D F U` plus an optional `js`/`py`/`php`
/// suffix. Identifiers with more than two segments keep only the first
/// two; malformed shapes consume nothing.
fn gobble_lgcode(rest: &[u8]) -> usize {
    let len = rest.iter().take_while(|&&b| b.is_ascii_alphanumeric() || b == b'_').count();
    if len == 0 {
        return 0;
    }
    let mut obj = &rest[..len];
    let underscores = obj.iter().filter(|&&b| b == b'_').count();
    if underscores > 1 {
        let first = obj.iter().position(|&b| b == b'_').unwrap();
        let second = first + 1 + obj[first + 1..].iter().position(|&b| b == b'_').unwrap();
        obj = &obj[..second];
    }
    if let Some(first) = obj.iter().position(|&b| b == b'_') {
        if first == 0 {
            return 0;
        }
        if !b"NEFDU".contains(&obj[0]) {
            return 0;
        }
        let algo = &obj[1..first];
        if !(algo.is_empty() || algo == b"js" || algo == b"py" || algo == b"php") {
            return 0;
        }
    }
    obj.len()
}

/// Strip the algorithm segment from a two-segment language code, so
/// `l4_Njs_greeting` becomes `l4_greeting`. Returns the canonical name
/// and the removed segment (empty when nothing was stripped).
pub fn strip_lgcode(objname: &str) -> (String, String) {
    if objname.starts_with("l4_") && objname.matches('_').count() == 2 {
        let parts: Vec<&str> = objname.splitn(3, '_').collect();
        let algo = parts[1];
        if algo.starts_with(|c| "NEDFU".contains(c)) {
            let suffix = &algo[1..];
            if suffix.is_empty() || suffix == "php" || suffix == "py" || suffix == "js" {
                return (format!("l4_{}", parts[2]), algo.to_string());
            }
        }
    }
    (objname.to_string(), String::new())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
