//! Definition-file container.
//!
//! A `DefFile` holds the parsed content of one definition file: a
//! comment preamble plus an ordered list of objects. The container never
//! touches the filesystem; callers hand it text and take text back.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::object::Object;

/// Cross-file parameter documentation, keyed by bare parameter name
/// (no `$` sigil).
///
/// An immutable snapshot built by the caller, typically from a shared
/// JSON document. [`DefFile::backfill_docs`] copies it into a working
/// map and never writes back, so one snapshot can serve many files
/// concurrently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocCache {
    docs: HashMap<String, String>,
}

impl DocCache {
    pub fn new() -> DocCache {
        DocCache::default()
    }

    pub fn insert(&mut self, param: impl Into<String>, doc: impl Into<String>) {
        self.docs.insert(param.into(), doc.into());
    }

    pub fn get(&self, param: &str) -> Option<&str> {
        self.docs.get(param).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The working copy the backfill pass mutates, keyed with sigils the
    /// way parameter ids are written.
    fn sigiled(&self) -> HashMap<String, String> {
        self.docs.iter().map(|(k, v)| (format!("${k}"), v.clone())).collect()
    }
}

impl FromIterator<(String, String)> for DocCache {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> DocCache {
        DocCache { docs: iter.into_iter().collect() }
    }
}

/// One parsed definition file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefFile {
    pub preamble: String,
    pub objects: Vec<Object>,
    /// Originating file.
    pub source: String,
    pub release: String,
}

impl DefFile {
    /// Render the canonical file text: normalized preamble, then each
    /// object in canonical form, blank-line separated, one trailing
    /// newline.
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let preamble = comment(&self.preamble);
        if !preamble.is_empty() {
            parts.push(preamble);
        }
        parts.extend(self.objects.iter().map(|o| o.format()));
        if parts.is_empty() {
            return String::new();
        }
        let mut out = parts.join("\n\n");
        out.push('\n');
        out
    }

    /// Propagate the file's `source` and `release` onto every object.
    pub fn stamp(&mut self) {
        for obj in &mut self.objects {
            obj.set_source(&self.source);
            obj.set_release(&self.release);
        }
    }

    /// Fill empty parameter docs from the shared cache.
    ///
    /// Walks the objects in order with a working copy of `cache`:
    /// non-empty docs are harvested along the way (so a parameter
    /// documented early in the file documents its later namesakes),
    /// except for ids made of only `$` and digits, which are too generic
    /// to share.
    pub fn backfill_docs(&mut self, cache: &DocCache) {
        let mut cmt = cache.sigiled();
        for obj in &mut self.objects {
            let Object::Macro(m) = obj else { continue };
            for param in &mut m.params {
                let doc = param.doc.trim().to_string();
                let generic = param.id.trim_matches(|c: char| c == '$' || c.is_ascii_digit()).is_empty();
                if !doc.is_empty() {
                    if !generic {
                        cmt.insert(param.id.clone(), doc);
                    }
                    continue;
                }
                param.doc = cmt.get(&param.id).cloned().unwrap_or_default();
            }
        }
    }

    /// Deduplicate and regroup the objects so that the `is`/`get`/`gen`/
    /// `set`/`upd`/`del` variants of one stem sit together, in that
    /// order. Objects whose name carries no such prefix (or is shorter
    /// than 4 characters) keep their relative position.
    pub fn sort(&mut self) {
        let objs = std::mem::take(&mut self.objects);
        let mut sorted: Vec<Object> = Vec::new();
        let mut found: HashSet<String> = HashSet::new();
        for (i, obj) in objs.iter().enumerate() {
            let name = obj.name().to_string();
            if found.contains(&name) {
                continue;
            }
            if name.len() < 4 {
                sorted.push(obj.clone());
                found.insert(name);
                continue;
            }
            let (prefix, stem) = match name.find(|c: char| c.is_ascii_uppercase()) {
                Some(k) => name.split_at(k),
                None => ("", ""),
            };
            if !matches!(prefix, "is" | "get" | "gen" | "set" | "del" | "upd") {
                sorted.push(obj.clone());
                found.insert(name);
                continue;
            }
            for prefix in ["is", "get", "gen", "set", "upd", "del"] {
                let search = format!("{prefix}{stem}");
                if found.contains(&search) {
                    continue;
                }
                for oj in &objs[i..] {
                    if oj.name() == search {
                        sorted.push(oj.clone());
                        found.insert(search.clone());
                    }
                }
            }
        }
        self.objects = sorted;
    }
}

/// Rewrite a leading comment block (`//` lines, `'''…'''` or `"""…"""`)
/// into the canonical `// About:` preamble, leaving the rest of the text
/// untouched. Text that does not open with a comment block comes back
/// unchanged.
pub fn about(text: &str) -> String {
    let mut comment: Vec<String> = Vec::new();
    let mut body = String::new();
    let mut delim = "";

    let mut lines = text.split_inclusive('\n');
    while let Some(line) = lines.next() {
        if delim == "??" {
            body.push_str(line);
            for rest in lines.by_ref() {
                body.push_str(rest);
            }
            break;
        }
        let mut s = line.replace("-*- coding: utf-8 -*-", "").replace("About:", " ");
        let mut t = s.trim().to_string();
        if delim == "//" && !t.starts_with("//") {
            body.push_str(line);
            delim = "??";
            continue;
        }
        if delim.is_empty() {
            if t.is_empty() {
                continue;
            }
            if t.starts_with("//") {
                delim = "//";
            } else if let Some(rest) = t.strip_prefix("'''") {
                delim = "'''";
                s = rest.to_string();
                t = s.trim().to_string();
            } else if let Some(rest) = t.strip_prefix("\"\"\"") {
                delim = "\"\"\"";
                s = rest.to_string();
                t = s.trim().to_string();
            }
            if delim.is_empty() {
                return text.to_string();
            }
        }
        if delim != "//" && t.contains(delim) {
            s = s.splitn(2, delim).next().unwrap_or_default().to_string();
            delim = "??";
        }
        comment.push(s);
    }

    let mut cmt: Vec<String> = Vec::new();
    for s in comment {
        let s = s.trim_end();
        let t = s.trim();
        if t.starts_with("//") {
            let s = t.trim_start_matches('/').trim_end();
            if cmt.is_empty() && s.is_empty() {
                continue;
            }
            cmt.push(s.trim().to_string());
            continue;
        }
        if cmt.is_empty() && t.is_empty() {
            continue;
        }
        let s = if cmt.is_empty() { t } else { s };
        if let Some(last) = cmt.last() {
            if last.trim() == t {
                continue;
            }
        }
        cmt.push(s.to_string());
    }
    if cmt.is_empty() {
        return body;
    }

    cmt[0] = format!("About: {}", cmt[0]);
    let cmt: Vec<String> = cmt
        .into_iter()
        .map(|s| {
            if s.is_empty() {
                "//".to_string()
            } else if s.starts_with(' ') {
                format!("//{s}")
            } else {
                format!("// {s}")
            }
        })
        .collect();
    let mut result = cmt.join("\n").trim().to_string();
    result.push_str("\n\n");
    result.push_str(body.trim());
    result.push('\n');
    result
}

/// Extract the first `About:` line from a `//` preamble; empty when the
/// text does not open with comment lines.
pub fn about_line(text: &str) -> String {
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with("//") {
            return String::new();
        }
        if let Some(k) = line.find("About:") {
            return line[k + 6..].trim().to_string();
        }
    }
    String::new()
}

/// Normalize a preamble to `//` comment lines: consecutive duplicates
/// collapse, blank comment lines become bare `//`, and trailing bare
/// `//` lines are cut. Empty when no line carries content.
pub fn comment(cmt: &str) -> String {
    let mut c: Vec<String> = Vec::new();
    let mut found = 0usize;
    for line in cmt.split('\n') {
        let trimmed = line.trim_end_matches(['\t', '\r', ' ']).trim_start_matches([' ', '\t']);
        let bare = trimmed.trim_start_matches('/');
        if bare.is_empty() && c.is_empty() {
            continue;
        }
        let mut l = if bare.is_empty() { "//".to_string() } else { trimmed.to_string() };
        if l.len() > 2 && l.is_char_boundary(2) && !l[2..].starts_with(' ') {
            l = format!("// {}", &l[2..]);
        }
        if c.last() == Some(&l) {
            continue;
        }
        let keep = l.len() > 3;
        c.push(l);
        if keep {
            found = c.len();
        }
    }
    if found == 0 {
        return String::new();
    }
    c[..found].join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Include, Macro, Param};

    fn mac(id: &str, params: Vec<Param>) -> Object {
        Object::Macro(Macro { id: id.to_string(), params, ..Macro::default() })
    }

    fn par(id: &str, doc: &str) -> Param {
        Param { id: id.to_string(), doc: doc.to_string(), ..Param::default() }
    }

    #[test]
    fn format_joins_preamble_and_objects() {
        let df = DefFile {
            preamble: "  // Greets the world \n//".to_string(),
            objects: vec![
                Object::Include(Include {
                    id: "Head".to_string(),
                    content: "w ^ZHEAD".to_string(),
                    ..Include::default()
                }),
                mac("Empty", Vec::new()),
            ],
            ..DefFile::default()
        };
        let text = df.format();
        assert!(text.starts_with("// Greets the world\n\ninclude Head:\n«w ^ZHEAD»\n\n"));
        assert!(text.ends_with("\n"));
        assert_eq!(DefFile::default().format(), "");
    }

    #[test]
    fn stamp_propagates_source_and_release() {
        let mut df = DefFile {
            objects: vec![mac("A", Vec::new()), mac("B", Vec::new())],
            source: "/application/greet.d".to_string(),
            release: "6.30".to_string(),
            ..DefFile::default()
        };
        df.stamp();
        for obj in &df.objects {
            let Object::Macro(m) = obj else { panic!() };
            assert_eq!(m.source, "/application/greet.d");
            assert_eq!(m.release, "6.30");
        }
    }

    #[test]
    fn backfill_fills_from_cache_and_earlier_macros() {
        let mut cache = DocCache::new();
        cache.insert("cloi", "object identifier");
        let mut df = DefFile {
            objects: vec![
                mac("First", vec![par("$data", "record data"), par("$0", "positional")]),
                mac("Second", vec![par("$data", ""), par("$cloi", ""), par("$0", "")]),
            ],
            ..DefFile::default()
        };
        df.backfill_docs(&cache);
        let Object::Macro(second) = &df.objects[1] else { panic!() };
        assert_eq!(second.params[0].doc, "record data");
        assert_eq!(second.params[1].doc, "object identifier");
        // `$0` is too generic to harvest, so the empty doc stays empty.
        assert_eq!(second.params[2].doc, "");
        // The snapshot itself is untouched.
        assert_eq!(cache.get("data"), None);
    }

    #[test]
    fn sort_groups_stem_variants() {
        let names = ["getPart", "xyz", "isPart", "delPart", "genOther", "xyz"];
        let mut df = DefFile {
            objects: names.iter().map(|n| mac(n, Vec::new())).collect(),
            ..DefFile::default()
        };
        df.sort();
        let sorted: Vec<&str> = df.objects.iter().map(|o| o.name()).collect();
        assert_eq!(sorted, vec!["isPart", "getPart", "delPart", "xyz", "genOther"]);
    }

    #[test]
    fn about_rewrites_docstring_preambles() {
        assert_eq!(
            about("'''\nGreeting macros\n'''\nmacro X:\n    body\n"),
            "// About: Greeting macros\n//\n\nmacro X:\n    body\n"
        );
        assert_eq!(about("// About: quick\nmacro X:\n"), "// About: quick\n\nmacro X:\n");
        // An existing slash preamble is re-labelled, not duplicated.
        assert_eq!(about("// quick\nmacro X:\n"), "// About: quick\n\nmacro X:\n");
    }

    #[test]
    fn about_leaves_uncommented_text_alone() {
        assert_eq!(about("plain text\nmore\n"), "plain text\nmore\n");
        assert_eq!(about(""), "");
    }

    #[test]
    fn about_line_reads_the_first_about() {
        assert_eq!(about_line("// About: greeting tools\n// more\n"), "greeting tools");
        assert_eq!(about_line("\n// first\n// About: late\n"), "late");
        assert_eq!(about_line("macro X:\n"), "");
        assert_eq!(about_line(""), "");
    }

    #[test]
    fn comment_normalizes_preambles() {
        assert_eq!(comment("  // hello \n//\n//"), "// hello");
        assert_eq!(comment("// a\n// a\n"), "// a");
        assert_eq!(comment("//packed"), "// packed");
        assert_eq!(comment(""), "");
        assert_eq!(comment("//\n//\n"), "");
    }

    #[test]
    fn doc_cache_serializes_as_a_plain_map() {
        let mut cache = DocCache::new();
        cache.insert("cloi", "object identifier");
        let json = serde_json::to_string(&cache).unwrap();
        assert_eq!(json, r#"{"cloi":"object identifier"}"#);
        let back: DocCache = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cache);
    }
}
