//! Inline macros expanded inside document bodies.
//!
//! Before markdown rendering, each body is executed as a Tera template that
//! sees no site data at all, only a table of named functions:
//!
//! ```text
//! Some text, then an embedded snippet:
//!
//! {{ gist(id="user/28949e1d5ee2273f9fd3", file="foo.rb") }}
//! ```
//!
//! Every function receives its arguments as strings ([`MacroArgs`]) and
//! returns a markup fragment. The table is built by the caller, so sites can
//! register their own functions next to (or instead of) [`MacroTable::builtin`].

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tera::{Context, Tera};
use thiserror::Error;

/// Name the body is registered under inside the throwaway Tera instance.
/// It has no `.html` suffix, so function output is not escaped.
const BODY_TEMPLATE: &str = "__body__";

/// Failure reported by a macro function itself.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{name}: {message}")]
pub struct MacroCallError {
    pub name: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum MacroError {
    /// Syntax error, unknown function, or a function that returned an error.
    /// The message is the whole Tera error chain, innermost cause last.
    #[error("macro expansion failed: {0}")]
    Expansion(String),
}

impl From<tera::Error> for MacroError {
    fn from(err: tera::Error) -> Self {
        MacroError::Expansion(error_chain(&err))
    }
}

/// Join an error and all of its sources into one line-separated message.
///
/// Tera reports "Failed to render" at the top and keeps the useful part
/// (parse location, function error) in the source chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push('\n');
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Arguments passed to a macro, by name.
pub type MacroArgs = BTreeMap<String, String>;

type MacroFn = dyn Fn(&MacroArgs) -> Result<String, MacroCallError> + Send + Sync;

/// Named functions available to document bodies.
#[derive(Clone, Default)]
pub struct MacroTable {
    functions: BTreeMap<String, Arc<MacroFn>>,
}

impl fmt::Debug for MacroTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl MacroTable {
    /// A table with no functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The functions shipped with styx: currently just `gist`.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.register("gist", gist);
        table
    }

    /// Register (or replace) a function.
    pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&MacroArgs) -> Result<String, MacroCallError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Expand every macro call in `body`.
    pub fn expand(&self, body: &str) -> Result<String, MacroError> {
        let mut tera = Tera::default();
        for (name, f) in &self.functions {
            let f = Arc::clone(f);
            let fn_name = name.clone();
            tera.register_function(name, move |args: &HashMap<String, Value>| {
                let args = string_args(&fn_name, args)?;
                f(&args)
                    .map(Value::String)
                    .map_err(|e| tera::Error::msg(e.to_string()))
            });
        }
        tera.add_raw_template(BODY_TEMPLATE, body)?;
        Ok(tera.render(BODY_TEMPLATE, &Context::new())?)
    }
}

fn string_args(name: &str, args: &HashMap<String, Value>) -> tera::Result<MacroArgs> {
    args.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            other => Err(tera::Error::msg(format!(
                "{name}: argument `{key}` must be a string, got {other}"
            ))),
        })
        .collect()
}

const GIST_USAGE: &str = r#"invalid arguments
valid examples:
{{ gist(id="user/28949e1d5ee2273f9fd3") }}
{{ gist(id="user/28949e1d5ee2273f9fd3", file="foo.rb") }}
{{ gist(id="28949e1d5ee2273f9fd3") }}
{{ gist(id="28949e1d5ee2273f9fd3", file="foo.rb") }}"#;

/// Embed a GitHub gist: the whole gist, or one file of it.
pub fn gist(args: &MacroArgs) -> Result<String, MacroCallError> {
    let usage = || MacroCallError {
        name: "gist".to_string(),
        message: GIST_USAGE.to_string(),
    };

    let id = args.get("id").filter(|id| !id.is_empty()).ok_or_else(usage)?;
    match (args.len(), args.get("file")) {
        (1, None) => Ok(format!(
            "<script src=\"https://gist.github.com/{id}.js\"></script>"
        )),
        (2, Some(file)) => Ok(format!(
            "<script src=\"https://gist.github.com/{id}.js?file={}\"></script>",
            urlencoding::encode(file)
        )),
        _ => Err(usage()),
    }
}
