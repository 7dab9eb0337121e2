//! The macro/include data model.
//!
//! `Macro` and `Include` values are produced by the upstream structural
//! parser; this module renders them back to canonical text, selects and
//! applies expansions ([`Macro::replacer`]) and binds call-site argument
//! lists to declared parameters ([`Macro::bind_args`]).

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Env;
use crate::args::{ArgError, clean_arg, parse_args};
use crate::guard::{eval, infix};

/// One declared macro parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    #[serde(rename = "name")]
    pub id: String,
    /// Identifier of the parameter this one aliases. At most one
    /// parameter may carry a reference, and only the second one, to the
    /// first ([`Macro::lint`]).
    #[serde(rename = "ref")]
    pub reference: String,
    pub default: String,
    pub doc: String,
    /// Whether the call site must use `name=value` form.
    pub named: bool,
}

/// One candidate expansion: a guarded body in binary form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Alternating literal/parameter segments; even indices are
    /// literals.
    pub binary: Vec<String>,
    /// Inverts the guard.
    pub unless: bool,
    /// Postfix guard token stream; empty means unconditionally true.
    pub guard: Vec<String>,
}

impl Action {
    /// Render the body with its guard clause. `continuation` indents the
    /// guard line.
    fn render(&self, continuation: &str) -> String {
        let act = self.binary.concat();
        let g = infix(&self.guard);
        let (a, b) = if act.contains(['«', '»']) || g.contains(['«', '»']) { ("⟦", "⟧") } else { ("«", "»") };
        if g.is_empty() {
            return format!("{a}{act}{b}");
        }
        let clause = if self.unless { "unless" } else { "if" };
        format!("{a}{act}{b}\n{continuation}{clause} {a}{g}{b}")
    }
}

/// A macro definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub id: String,
    pub synopsis: String,
    pub params: Vec<Param>,
    pub actions: Vec<Action>,
    pub examples: Vec<String>,
    /// Defining file.
    pub source: String,
    #[serde(skip)]
    pub line: String,
    #[serde(skip)]
    pub release: String,
}

/// An include definition: a name bound to one literal content block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Include {
    pub id: String,
    pub content: String,
    pub source: String,
    #[serde(skip)]
    pub line: String,
    #[serde(skip)]
    pub release: String,
}

/// Call-site binding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("too many arguments")]
    TooManyArguments,
    #[error("parameter `{0}` should be named")]
    MustBeNamed(String),
    #[error("parameter `{0}` occurs twice")]
    BoundTwice(String),
    #[error("parameter `{0}` is not specified")]
    UnknownParameter(String),
    #[error(transparent)]
    Args(#[from] ArgError),
}

/// Result of binding one argument list against declared parameters.
///
/// `values` always maps every declared parameter to something (its
/// default when unbound), and `rest` is the input after the consumed
/// list, even when `error` is set.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    pub values: HashMap<String, String>,
    pub rest: String,
    pub error: Option<BindError>,
}

/// Definition-level problems surfaced by [`Macro::lint`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LintError {
    #[error("no synopsis for `{0}`")]
    MissingSynopsis(String),
    #[error("no comment for `{param}` in `{object}`")]
    UndocumentedParam { object: String, param: String },
    #[error("only the second parameter can have a reference")]
    MisplacedReference,
    #[error("the reference should be to the first parameter `{0}`")]
    WrongReference(String),
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m4_{}", self.id)
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i4_{}", self.id)
    }
}

impl Macro {
    /// Render the canonical definition text.
    pub fn format(&self) -> String {
        let mut header = format!("macro {}", self.id);
        let mut prms: Vec<String> = Vec::new();
        for param in &self.params {
            let mut prm = String::new();
            if param.named {
                prm.push('*');
            }
            prm.push_str(&param.id);
            let def = param.default.as_str();
            let mut bare = def;
            if bare.len() > 1 && bare.starts_with('"') && bare.ends_with('"') {
                bare = &bare[1..bare.len() - 1];
            }
            if bare.contains(['"', '(', ')', ',', ' ']) {
                prm.push_str(&format!("=«{def}»"));
            } else if !def.is_empty() {
                prm.push_str(&format!("={def}"));
            }
            prms.push(prm);
        }
        if !prms.is_empty() {
            header.push_str(&format!("({})", prms.join(", ")));
        }
        header.push(':');

        let mut result = vec![header, "    '''".to_string()];
        result.extend(collect(&self.synopsis, "$synopsis"));
        let width = self.params.iter().map(|p| p.id.len()).max().unwrap_or(0);
        for param in &self.params {
            let prefix = format!("{:<width$}", param.id);
            result.extend(collect(&param.doc, &prefix));
        }
        for example in &self.examples {
            result.extend(collect(example, "$example"));
        }
        result.push("    '''".to_string());

        for action in &self.actions {
            result.push(format!("    {}", action.render("        ")));
        }
        result.join("\n")
    }

    /// Compute the expansion for a call site.
    ///
    /// The first action whose guard, XOR'd with `unless`, is true under
    /// `env` wins; no winner yields the empty string. Parameter segments
    /// read `env` first, then the declared default; when neither exists
    /// the `original` text is returned untouched, signalling that the
    /// call site cannot be substituted safely.
    pub fn replacer(&self, env: &Env, original: &str) -> String {
        let mut selected: Option<&Action> = None;
        for action in &self.actions {
            if eval(&action.guard, env) != action.unless {
                selected = Some(action);
                break;
            }
        }
        let Some(action) = selected else {
            return String::new();
        };
        if action.binary.is_empty() {
            return String::new();
        }

        let defaults: HashMap<&str, &str> =
            self.params.iter().map(|p| (p.id.as_str(), p.default.as_str())).collect();
        let mut result = String::new();
        for (i, segment) in action.binary.iter().enumerate() {
            if i % 2 == 0 {
                result.push_str(segment);
                continue;
            }
            if let Some(v) = env.get(segment) {
                result.push_str(v);
            } else if let Some(v) = defaults.get(segment.as_str()) {
                result.push_str(v);
            } else {
                return original.to_string();
            }
        }
        result
    }

    /// Bind the leading argument list of `original` to the declared
    /// parameters.
    ///
    /// Arguments bind positionally unless they carry a `=`, in which
    /// case the left side names the target parameter, with or without
    /// its sigil. Without a leading `(` nothing is consumed and nothing
    /// binds.
    pub fn bind_args(&self, original: &str) -> BoundArgs {
        if !original.starts_with('(') {
            return BoundArgs { values: HashMap::new(), rest: original.to_string(), error: None };
        }
        let parsed = parse_args(original);
        let mut values: HashMap<String, String> =
            self.params.iter().map(|p| (p.id.clone(), p.default.clone())).collect();
        let mut done: HashSet<String> = HashSet::new();
        let mut error: Option<BindError> = parsed.error.clone().map(Into::into);

        if error.is_none() {
            for (i, raw) in parsed.args.iter().enumerate() {
                if i >= self.params.len() {
                    error = Some(BindError::TooManyArguments);
                    break;
                }
                let eq = raw.find('=');
                if eq.is_none() && self.params[i].named {
                    error = Some(BindError::MustBeNamed(self.params[i].id.clone()));
                    break;
                }
                let (mut key, value) = match eq {
                    Some(k) => (raw[..k].trim().to_string(), raw[k + 1..].to_string()),
                    None => (self.params[i].id.clone(), raw.clone()),
                };
                if !values.contains_key(&key) {
                    let sigiled = format!("${key}");
                    if values.contains_key(&sigiled) {
                        key = sigiled;
                    } else {
                        error = Some(BindError::UnknownParameter(key));
                        break;
                    }
                }
                if done.contains(&key) {
                    error = Some(BindError::BoundTwice(key));
                    break;
                }
                values.insert(key.clone(), clean_arg(&value));
                done.insert(key);
            }
        }

        let rest = original[parsed.consumed.len()..].to_string();
        BoundArgs { values, rest, error }
    }

    /// Render the action bodies and guards, the text dependency
    /// extraction works from.
    pub fn deps(&self) -> String {
        let mut out = String::new();
        for action in &self.actions {
            out.push('\n');
            out.push_str(&action.render(""));
        }
        out
    }

    /// Check definition-level invariants.
    pub fn lint(&self) -> Vec<LintError> {
        let mut errors = Vec::new();
        if self.synopsis.trim().is_empty() {
            errors.push(LintError::MissingSynopsis(self.to_string()));
        }
        for param in &self.params {
            if param.doc.trim().is_empty() {
                errors.push(LintError::UndocumentedParam {
                    object: self.to_string(),
                    param: param.id.clone(),
                });
            }
        }
        let first = self.params.first().map(|p| p.id.clone()).unwrap_or_default();
        for (i, param) in self.params.iter().enumerate() {
            if param.reference.is_empty() {
                continue;
            }
            if i != 1 {
                errors.push(LintError::MisplacedReference);
                continue;
            }
            if param.reference != first {
                errors.push(LintError::WrongReference(first.clone()));
            }
        }
        errors
    }
}

impl Include {
    /// Render the canonical definition text.
    pub fn format(&self) -> String {
        let (a, b) = if self.content.contains(['«', '»']) { ("⟦", "⟧") } else { ("«", "»") };
        format!("include {}:\n{a}{}{b}", self.id, self.content)
    }

    /// An include always expands to its content, whatever the call site
    /// looked like.
    pub fn replacer(&self) -> &str {
        &self.content
    }

    pub fn deps(&self) -> String {
        self.content.clone()
    }
}

/// A definition-file object: macros and includes share the definition
/// container and most bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Object {
    Macro(Macro),
    Include(Include),
}

impl Object {
    pub fn name(&self) -> &str {
        match self {
            Object::Macro(m) => &m.id,
            Object::Include(i) => &i.id,
        }
    }

    /// The reference-kind prefix: `m4` for macros, `i4` for includes.
    pub fn type_code(&self) -> &'static str {
        match self {
            Object::Macro(_) => "m4",
            Object::Include(_) => "i4",
        }
    }

    pub fn format(&self) -> String {
        match self {
            Object::Macro(m) => m.format(),
            Object::Include(i) => i.format(),
        }
    }

    pub fn replacer(&self, env: &Env, original: &str) -> String {
        match self {
            Object::Macro(m) => m.replacer(env, original),
            Object::Include(i) => i.replacer().to_string(),
        }
    }

    pub fn deps(&self) -> String {
        match self {
            Object::Macro(m) => m.deps(),
            Object::Include(i) => i.deps(),
        }
    }

    pub fn lint(&self) -> Vec<LintError> {
        match self {
            Object::Macro(m) => m.lint(),
            Object::Include(_) => Vec::new(),
        }
    }

    pub fn set_source(&mut self, source: &str) {
        match self {
            Object::Macro(m) => m.source = source.to_string(),
            Object::Include(i) => i.source = source.to_string(),
        }
    }

    pub fn set_release(&mut self, release: &str) {
        match self {
            Object::Macro(m) => m.release = release.to_string(),
            Object::Include(i) => i.release = release.to_string(),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Macro(m) => m.fmt(f),
            Object::Include(i) => i.fmt(f),
        }
    }
}

/// Split a raw template into the alternating literal/parameter binary
/// form, slicing on the longest identifiers first so a short parameter
/// never matches inside a longer one.
pub fn binary(template: &str, params: &[Param]) -> Vec<String> {
    if params.is_empty() {
        return vec![template.to_string()];
    }
    let mut pars: Vec<&str> = params.iter().map(|p| p.id.as_str()).collect();
    pars.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut result = vec![template.to_string()];
    for p in pars {
        let mut next = Vec::new();
        let mut literal = false;
        for s in result {
            literal = !literal;
            if literal {
                next.extend(param_split(&s, p));
            } else {
                next.push(s);
            }
        }
        result = next;
    }
    result
}

fn param_split(s: &str, p: &str) -> Vec<String> {
    if !s.contains(p) {
        return vec![s.to_string()];
    }
    let mut result = Vec::new();
    for (i, part) in s.split(p).enumerate() {
        if i > 0 {
            result.push(p.to_string());
        }
        result.push(part.to_string());
    }
    result
}

/// Lay out one doc-block entry: `    prefix: first line`, continuation
/// lines indented to align under the value.
fn collect(value: &str, prefix: &str) -> Vec<String> {
    if value.is_empty() {
        return vec![format!("    {prefix}:")];
    }
    let keyed = format!("    {prefix}: ");
    let pad = " ".repeat(keyed.len());
    let mut result = Vec::new();
    for (i, line) in value.split('\n').enumerate() {
        if i == 0 {
            result.push(format!("{keyed}{}", line.trim()));
        } else {
            result.push(format!("{pad}{line}"));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greet_macro() -> Macro {
        Macro {
            id: "Greet".to_string(),
            synopsis: "say hello".to_string(),
            params: vec![
                Param {
                    id: "$who".to_string(),
                    default: "world".to_string(),
                    doc: "target of the greeting".to_string(),
                    ..Param::default()
                },
                Param {
                    id: "$mark".to_string(),
                    default: "!, really".to_string(),
                    named: true,
                    ..Param::default()
                },
            ],
            actions: vec![Action {
                binary: vec!["Hello ".to_string(), "$who".to_string(), String::new()],
                ..Action::default()
            }],
            examples: vec!["m4_Greet(moon)".to_string()],
            ..Macro::default()
        }
    }

    #[test]
    fn format_canonical_macro() {
        let expected = "\
macro Greet($who=world, *$mark=«!, really»):
    '''
    $synopsis: say hello
    $who : target of the greeting
    $mark:
    $example: m4_Greet(moon)
    '''
    «Hello $who»";
        assert_eq!(greet_macro().format(), expected);
    }

    #[test]
    fn format_guarded_actions() {
        let mut m = greet_macro();
        m.actions.push(Action {
            binary: vec!["Hallo ".to_string(), "$who".to_string(), String::new()],
            unless: true,
            guard: vec!["%osname".to_string(), "linux".to_string(), "isEqualTo".to_string()],
        });
        let text = m.format();
        assert!(text.ends_with("    «Hallo $who»\n        unless «%osname isEqualTo \"linux\"»"));
    }

    #[test]
    fn format_falls_back_to_bracket_delimiters() {
        let inc = Include {
            id: "Quote".to_string(),
            content: "a «quoted» thing".to_string(),
            ..Include::default()
        };
        assert_eq!(inc.format(), "include Quote:\n⟦a «quoted» thing⟧");
    }

    #[test]
    fn replacer_substitutes_and_defaults() {
        let m = greet_macro();
        let mut env = Env::new();
        env.insert("$who".to_string(), "moon".to_string());
        assert_eq!(m.replacer(&env, "m4_Greet(moon)"), "Hello moon");
        // Unbound parameter falls back to its default.
        assert_eq!(m.replacer(&Env::new(), "m4_Greet"), "Hello world");
    }

    #[test]
    fn replacer_is_stable_under_reapplication() {
        let m = greet_macro();
        let mut env = Env::new();
        env.insert("$who".to_string(), "moon".to_string());
        let once = m.replacer(&env, "m4_Greet(moon)");
        assert!(!once.contains("$who"));
        assert_eq!(m.replacer(&env, &once), once);
    }

    #[test]
    fn replacer_guard_selection() {
        let pick = |value: &str| {
            let m = Macro {
                id: "Pick".to_string(),
                actions: vec![
                    Action {
                        binary: vec!["unix".to_string()],
                        guard: vec!["%osname".to_string(), "linux".to_string(), "isEqualTo".to_string()],
                        ..Action::default()
                    },
                    Action { binary: vec!["other".to_string()], ..Action::default() },
                ],
                ..Macro::default()
            };
            let mut env = Env::new();
            env.insert("%osname".to_string(), value.to_string());
            m.replacer(&env, "m4_Pick")
        };
        assert_eq!(pick("linux"), "unix");
        assert_eq!(pick("windows"), "other");
    }

    #[test]
    fn replacer_without_matching_action_is_empty() {
        let m = Macro {
            id: "Never".to_string(),
            actions: vec![Action {
                binary: vec!["body".to_string()],
                guard: vec!["false".to_string()],
                ..Action::default()
            }],
            ..Macro::default()
        };
        assert_eq!(m.replacer(&Env::new(), "m4_Never"), "");
    }

    #[test]
    fn replacer_keeps_original_on_unresolvable_parameter() {
        let m = Macro {
            id: "Hole".to_string(),
            actions: vec![Action {
                binary: vec![String::new(), "$gone".to_string(), String::new()],
                ..Action::default()
            }],
            ..Macro::default()
        };
        assert_eq!(m.replacer(&Env::new(), "m4_Hole(x)"), "m4_Hole(x)");
    }

    fn data_cloi_macro() -> Macro {
        Macro {
            id: "Rec".to_string(),
            params: vec![
                Param { id: "$data".to_string(), ..Param::default() },
                Param {
                    id: "$cloi".to_string(),
                    default: "default".to_string(),
                    named: true,
                    ..Param::default()
                },
            ],
            ..Macro::default()
        }
    }

    #[test]
    fn bind_args_positional_and_named() {
        let m = data_cloi_macro();
        let bound = m.bind_args("(A, cloi=B) tail");
        assert_eq!(bound.error, None);
        assert_eq!(bound.values["$data"], "A");
        assert_eq!(bound.values["$cloi"], "B");
        assert_eq!(bound.rest, " tail");
    }

    #[test]
    fn bind_args_defaults_apply() {
        let m = data_cloi_macro();
        let bound = m.bind_args("(A)");
        assert_eq!(bound.error, None);
        assert_eq!(bound.values["$data"], "A");
        assert_eq!(bound.values["$cloi"], "default");
    }

    #[test]
    fn bind_args_errors() {
        let m = data_cloi_macro();
        assert_eq!(m.bind_args("(A, B)").error, Some(BindError::MustBeNamed("$cloi".to_string())));
        assert_eq!(m.bind_args("(A, cloi=B, C)").error, Some(BindError::TooManyArguments));
        assert_eq!(
            m.bind_args("(data=A, data=B)").error,
            Some(BindError::BoundTwice("$data".to_string()))
        );
        assert_eq!(
            m.bind_args("(nope=A)").error,
            Some(BindError::UnknownParameter("nope".to_string()))
        );
        assert_eq!(m.bind_args("(A").error, Some(BindError::Args(ArgError::Unterminated)));
    }

    #[test]
    fn bind_args_without_list_binds_nothing() {
        let m = data_cloi_macro();
        let bound = m.bind_args("no parens");
        assert_eq!(bound.error, None);
        assert!(bound.values.is_empty());
        assert_eq!(bound.rest, "no parens");
    }

    #[test]
    fn bind_args_cleans_wrapped_values() {
        let m = data_cloi_macro();
        let bound = m.bind_args("(«A, B», cloi=⟦C⟧)");
        assert_eq!(bound.error, None);
        assert_eq!(bound.values["$data"], "A, B");
        assert_eq!(bound.values["$cloi"], "C");
    }

    #[test]
    fn binary_prefers_longest_identifiers() {
        let params = vec![
            Param { id: "$a".to_string(), ..Param::default() },
            Param { id: "$ab".to_string(), ..Param::default() },
        ];
        assert_eq!(
            binary("pre $a mid $ab post", &params),
            vec!["pre ", "$a", " mid ", "$ab", " post"]
        );
        assert_eq!(binary("no params here", &params), vec!["no params here"]);
        assert_eq!(binary("text", &[]), vec!["text"]);
    }

    #[test]
    fn lint_flags_definition_problems() {
        let mut m = greet_macro();
        assert!(m.lint().iter().any(|e| matches!(e, LintError::UndocumentedParam { param, .. } if param == "$mark")));

        m.params[1].doc = "punctuation".to_string();
        assert!(m.lint().is_empty());

        m.params[1].reference = "$who".to_string();
        assert!(m.lint().is_empty());
        m.params[1].reference = "$other".to_string();
        assert_eq!(m.lint(), vec![LintError::WrongReference("$who".to_string())]);
        m.params[0].reference = "$mark".to_string();
        assert!(m.lint().contains(&LintError::MisplacedReference));
    }

    #[test]
    fn objects_serialize_with_legacy_field_names() {
        let m = greet_macro();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["id"], "Greet");
        assert_eq!(json["params"][0]["name"], "$who");
        assert_eq!(json["params"][0]["ref"], "");
        let back: Macro = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let obj = Object::Include(Include {
            id: "Head".to_string(),
            content: "text".to_string(),
            ..Include::default()
        });
        let json = serde_json::to_string(&obj).unwrap();
        let back: Object = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obj);
        assert_eq!(obj.type_code(), "i4");
        assert_eq!(obj.to_string(), "i4_Head");
    }
}
