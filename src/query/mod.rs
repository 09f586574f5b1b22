//! Query templating
//!
//! Turns operation templates like `SELECT * FROM users WHERE id = {{id}}`
//! into positional statements (`... WHERE id = $1`) plus the ordered list of
//! variables that fill the placeholders.

mod syntax;

pub use syntax::{syntax_for, AnsiSyntax, MysqlSyntax, Syntax};

use crate::pattern::{tokenize, ExecContext, Token};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static SELECT_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*select\s+.*?\s+from\s+([^\s,;()]+)").expect("select regex is valid")
});
static INSERT_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(?:insert|replace)\s+into\s+([^\s,;()]+)").expect("insert regex is valid")
});
static DELETE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*delete\s+from\s+([^\s,;()]+)").expect("delete regex is valid")
});

/// Parsed operation template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    statement: String,
    table: Option<String>,
    arguments: Vec<String>,
}

impl Query {
    /// Parse a template, `None` for blank input
    ///
    /// Each distinct variable gets the placeholder number of its first
    /// occurrence, so `{{id}} ... {{id}}` becomes `$1 ... $1`.
    pub fn parse(template: &str) -> Option<Query> {
        if template.trim().is_empty() {
            return None;
        }

        let mut statement = String::with_capacity(template.len());
        let mut arguments: Vec<String> = Vec::new();

        for token in tokenize(template) {
            match token {
                Token::Text(text) => statement.push_str(text),
                Token::Var(name) => {
                    let index = match arguments.iter().position(|arg| arg == name) {
                        Some(index) => index,
                        None => {
                            arguments.push(name.to_string());
                            arguments.len() - 1
                        }
                    };
                    statement.push('$');
                    statement.push_str(&(index + 1).to_string());
                }
            }
        }

        let table = table_name(&statement);
        Some(Query {
            statement,
            table,
            arguments,
        })
    }

    /// Backend-ready statement text
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Table targeted by the statement, when it could be detected
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Variable names in placeholder order
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Resolve placeholder values; missing variables become `None`
    pub fn args(&self, ctx: &ExecContext) -> Vec<Option<String>> {
        self.arguments
            .iter()
            .map(|name| ctx.get(name).map(str::to_string))
            .collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.statement)
    }
}

/// Best-effort detection of the statement's table, used to route change
/// notifications. Quotes and schema qualifiers are stripped.
fn table_name(statement: &str) -> Option<String> {
    let lowered = statement.trim_start().to_ascii_lowercase();
    let regex = if lowered.starts_with("select") {
        &*SELECT_TABLE
    } else if lowered.starts_with("insert") || lowered.starts_with("replace") {
        &*INSERT_TABLE
    } else if lowered.starts_with("delete") {
        &*DELETE_TABLE
    } else {
        return None;
    };

    let raw = regex.captures(statement)?.get(1)?.as_str();
    let name = raw.rsplit('.').next().unwrap_or(raw);
    let name = name.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'));
    (!name.is_empty()).then(|| name.to_string())
}
