//! Key pattern engine
//!
//! Compiles key templates such as `user_{{id}}` or `order_{{shop}}-{{num}}`
//! into a list of matchers. A compiled pattern parses concrete keys into an
//! [`ExecContext`] and renders keys back from any [`ValueSource`].

mod context;
mod matcher;

pub use context::{ExecContext, ValueSource};
pub(crate) use context::json_text;

use matcher::{Extract, Matcher};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]*)\}\}").expect("variable regex is valid"));

/// Piece of a template, shared with query templating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Var(&'a str),
}

/// Split a template into literal text and `{{name}}` variables
///
/// Empty text between adjacent variables is not emitted.
pub(crate) fn tokenize(template: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in VAR_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            tokens.push(Token::Text(&template[last..whole.start()]));
        }
        tokens.push(Token::Var(name.as_str()));
        last = whole.end();
    }

    if last < template.len() {
        tokens.push(Token::Text(&template[last..]));
    }

    tokens
}

/// Compiled key template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    template: String,
    matchers: Vec<Matcher>,
}

impl Pattern {
    /// Compile a template
    ///
    /// A variable followed by a constant stops at the first occurrence of
    /// that constant (or at the end of input when the constant closes the
    /// template). A variable followed by another variable, or by nothing,
    /// takes the rest of the input. Repeated variables must match the value
    /// bound by their first occurrence.
    pub fn compile(template: &str) -> Self {
        let tokens = tokenize(template);
        let mut matchers = Vec::with_capacity(tokens.len());
        let mut seen = HashSet::new();

        for (i, token) in tokens.iter().enumerate() {
            match *token {
                Token::Text(text) => matchers.push(Matcher::Const(text.to_string())),
                Token::Var(name) if !seen.insert(name) => {
                    matchers.push(Matcher::Ref(name.to_string()));
                }
                Token::Var(name) => {
                    let extract = match tokens.get(i + 1) {
                        Some(Token::Text(next)) if i + 2 == tokens.len() => {
                            Extract::Suffix(next.to_string())
                        }
                        Some(Token::Text(next)) => Extract::Until(next.to_string()),
                        _ => Extract::ToEnd,
                    };
                    matchers.push(Matcher::Var {
                        name: name.to_string(),
                        extract,
                    });
                }
            }
        }

        Pattern {
            template: template.to_string(),
            matchers,
        }
    }

    /// Source template as configured
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match a concrete key, binding variables into `ctx`
    ///
    /// The whole key must be consumed. On failure `ctx` may hold partial
    /// bindings that callers are expected to discard.
    pub fn matches(&self, key: &str, ctx: &mut ExecContext) -> bool {
        let mut rest = key;
        for matcher in &self.matchers {
            match matcher.consume(rest, ctx) {
                Some(len) if len > 0 => rest = &rest[len..],
                _ => return false,
            }
        }
        rest.is_empty()
    }

    /// Render a key, substituting every variable from `values`
    ///
    /// Absent values render as an empty string.
    pub fn format(&self, values: &dyn ValueSource) -> String {
        let mut out = String::with_capacity(self.template.len());
        for matcher in &self.matchers {
            match matcher {
                Matcher::Const(text) => out.push_str(text),
                Matcher::Var { name, .. } | Matcher::Ref(name) => {
                    if let Some(value) = values.value_of(name) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out
    }

    /// Variable names in first-seen order
    pub fn keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.matchers
            .iter()
            .filter_map(Matcher::var_name)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Literal rendering: constants followed by bare variable names
///
/// `user_{{id}}` displays as `user_id`, which is what glob listing
/// patterns are matched against.
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for matcher in &self.matchers {
            match matcher {
                Matcher::Const(text) => f.write_str(text)?,
                Matcher::Var { name, .. } | Matcher::Ref(name) => f.write_str(name)?,
            }
        }
        Ok(())
    }
}
