//! Macro and object-reference preprocessing for legacy definition files.
//!
//! The crate covers the text layer of a definition pipeline: splitting
//! source text into literal and object-reference segments
//! ([`splitter`]), scanning call-site argument lists ([`args`]),
//! evaluating postfix guards ([`guard`]), modelling and substituting
//! macro/include definitions ([`object`]), holding whole definition
//! files ([`container`]) and fast containment search over file blobs
//! ([`search`]). Everything works on in-memory text; no I/O happens
//! here.

extern crate self as objref;

use std::collections::HashMap;

#[macro_use]
mod macros;

pub mod args;
pub mod container;
pub mod guard;
pub mod object;
pub mod search;
pub mod splitter;

pub use args::{ArgError, ParsedArgs, clean_arg, parse_args};
pub use container::{DefFile, DocCache, about, about_line, comment};
pub use guard::{Op, eval, infix};
pub use object::{
    Action, BindError, BoundArgs, Include, LintError, Macro, Object, Param, binary,
};
pub use search::Finder;
pub use splitter::{is_object_name, is_starter, split, strip_lgcode};

/// Evaluation and substitution environment.
///
/// Guards and replacers treat a missing key as the empty string, so an
/// empty map is a valid environment.
pub type Env = HashMap<String, String>;
