//! SQL dialects used to synthesize templates from a table name
//!
//! Builders emit `{{field}}` templates, which [`super::Query::parse`] then
//! turns into positional statements like any hand-written template.

use std::sync::Arc;

/// Dialect strategy for identifier quoting and upsert phrasing
pub trait Syntax: Send + Sync {
    /// Identifier quote character
    fn quote(&self) -> char;

    fn quote_ident(&self, ident: &str) -> String {
        let q = self.quote();
        format!("{q}{ident}{q}")
    }

    /// ` WHERE "a"={{a}} AND <extra>`, or an empty string
    fn where_clause(&self, fields: &[&str], extra: Option<&str>) -> String {
        let mut conditions: Vec<String> = fields
            .iter()
            .map(|field| format!("{}={{{{{}}}}}", self.quote_ident(field), field))
            .collect();
        if let Some(extra) = extra.filter(|e| !e.trim().is_empty()) {
            conditions.push(extra.to_string());
        }

        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    fn get_query(&self, table: &str, fields: &[&str], extra: Option<&str>) -> String {
        format!(
            "SELECT * FROM {table}{} LIMIT 1",
            self.where_clause(fields, extra)
        )
    }

    fn select_query(&self, table: &str, extra: Option<&str>) -> String {
        format!("SELECT * FROM {table}{}", self.where_clause(&[], extra))
    }

    /// Insert-or-update keyed by `fields`, `None` without key fields
    fn upsert_query(&self, table: &str, fields: &[&str]) -> Option<String>;

    /// `None` when the statement would have no WHERE clause at all
    fn delete_query(&self, table: &str, fields: &[&str], extra: Option<&str>) -> Option<String> {
        let clause = self.where_clause(fields, extra);
        (!clause.is_empty()).then(|| format!("DELETE FROM {table}{clause}"))
    }
}

fn columns(syntax: &dyn Syntax, fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| syntax.quote_ident(field))
        .collect::<Vec<_>>()
        .join(", ")
}

fn values(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| format!("{{{{{field}}}}}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Standard SQL with `INSERT ... ON CONFLICT ... DO UPDATE`
#[derive(Debug, Clone, Copy)]
pub struct AnsiSyntax {
    quote: char,
}

impl AnsiSyntax {
    pub fn new(quote: char) -> Self {
        AnsiSyntax { quote }
    }
}

impl Default for AnsiSyntax {
    fn default() -> Self {
        Self::new('"')
    }
}

impl Syntax for AnsiSyntax {
    fn quote(&self) -> char {
        self.quote
    }

    fn upsert_query(&self, table: &str, fields: &[&str]) -> Option<String> {
        if fields.is_empty() {
            return None;
        }
        let cols = columns(self, fields);
        let updates = fields
            .iter()
            .map(|field| {
                let col = self.quote_ident(field);
                format!("{col} = EXCLUDED.{col}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        Some(format!(
            "INSERT INTO {table} ({cols}) VALUES ({}) ON CONFLICT ({cols}) DO UPDATE SET {updates}",
            values(fields)
        ))
    }
}

/// MySQL flavour: backtick quoting and `REPLACE INTO`
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlSyntax;

impl Syntax for MysqlSyntax {
    fn quote(&self) -> char {
        '`'
    }

    fn upsert_query(&self, table: &str, fields: &[&str]) -> Option<String> {
        if fields.is_empty() {
            return None;
        }
        Some(format!(
            "REPLACE INTO {table} ({}) VALUES ({})",
            columns(self, fields),
            values(fields)
        ))
    }
}

/// Pick the dialect matching a driver name
pub fn syntax_for(driver: &str) -> Arc<dyn Syntax> {
    match driver.to_ascii_lowercase().as_str() {
        "mysql" => Arc::new(MysqlSyntax),
        "clickhouse" => Arc::new(AnsiSyntax::new('`')),
        _ => Arc::new(AnsiSyntax::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    #[test]
    fn test_get_query() {
        let sx = AnsiSyntax::default();
        assert_eq!(
            sx.get_query("users", &["id"], Some("deleted_at IS NULL")),
            r#"SELECT * FROM users WHERE "id"={{id}} AND deleted_at IS NULL LIMIT 1"#
        );
        assert_eq!(sx.get_query("users", &[], None), "SELECT * FROM users LIMIT 1");
    }

    #[test]
    fn test_get_query_parses_in_key_order() {
        let sx = AnsiSyntax::default();
        let query = Query::parse(&sx.get_query("orders", &["shop", "num"], None)).unwrap();

        assert_eq!(
            query.statement(),
            r#"SELECT * FROM orders WHERE "shop"=$1 AND "num"=$2 LIMIT 1"#
        );
        assert_eq!(query.arguments(), ["shop", "num"]);
        assert_eq!(query.table(), Some("orders"));
    }

    #[test]
    fn test_select_query_uses_extra_filter() {
        let sx = AnsiSyntax::default();
        assert_eq!(sx.select_query("users", None), "SELECT * FROM users");
        assert_eq!(
            sx.select_query("users", Some("active")),
            "SELECT * FROM users WHERE active"
        );
    }

    #[test]
    fn test_upsert_queries() {
        assert_eq!(
            AnsiSyntax::default().upsert_query("users", &["id"]).unwrap(),
            r#"INSERT INTO users ("id") VALUES ({{id}}) ON CONFLICT ("id") DO UPDATE SET "id" = EXCLUDED."id""#
        );
        assert_eq!(
            MysqlSyntax.upsert_query("users", &["id", "org"]).unwrap(),
            "REPLACE INTO users (`id`, `org`) VALUES ({{id}}, {{org}})"
        );
        assert!(MysqlSyntax.upsert_query("users", &[]).is_none());
    }

    #[test]
    fn test_delete_requires_where() {
        let sx = AnsiSyntax::default();
        assert!(sx.delete_query("users", &[], None).is_none());
        assert_eq!(
            sx.delete_query("users", &[], Some("tmp")).unwrap(),
            "DELETE FROM users WHERE tmp"
        );
        assert_eq!(
            sx.delete_query("users", &["id"], None).unwrap(),
            r#"DELETE FROM users WHERE "id"={{id}}"#
        );
    }

    #[test]
    fn test_syntax_for_driver() {
        assert_eq!(syntax_for("mysql").quote(), '`');
        assert_eq!(syntax_for("postgres").quote(), '"');
        assert_eq!(syntax_for("unknown").quote(), '"');
    }
}
