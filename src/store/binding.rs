//! Compiled key family: one pattern mapped to get/list/upsert/delete queries

use super::{glob, BindConfig, Executor};
use crate::error::{Result, StoreError};
use crate::pattern::{ExecContext, Pattern};
use crate::query::{Query, Syntax};
use crate::record::{DatatypeMapping, Record};
use std::sync::Arc;
use tracing::debug;

/// One key pattern bound to backend operations
pub struct Binding {
    dbnum: u32,
    pattern: Pattern,
    get_query: Query,
    list_query: Option<Query>,
    upsert_query: Option<Query>,
    del_query: Option<Query>,
    table: Option<String>,
    reorganize_nested: bool,
    datatype_mapping: Vec<DatatypeMapping>,
    executor: Arc<dyn Executor>,
}

impl Binding {
    /// Compile a bind config
    ///
    /// With a table name the four queries are synthesized through `syntax`;
    /// explicit templates take precedence over synthesized ones. A config
    /// with neither a get template nor a table name is rejected.
    pub fn from_config(
        conf: &BindConfig,
        syntax: &dyn Syntax,
        executor: Arc<dyn Executor>,
    ) -> Result<Binding> {
        let pattern = Pattern::compile(&conf.key);

        let mut get_query = None;
        let mut list_query = None;
        let mut upsert_query = None;
        let mut del_query = None;

        if let Some(table) = &conf.table_name {
            let fields = pattern.keys();
            let extra = conf.where_ext.as_deref();
            get_query = Query::parse(&syntax.get_query(table, &fields, extra));
            list_query = Query::parse(&syntax.select_query(table, extra));
            upsert_query = syntax
                .upsert_query(table, &fields)
                .and_then(|q| Query::parse(&q));
            del_query = syntax
                .delete_query(table, &fields, extra)
                .and_then(|q| Query::parse(&q));
        }

        let explicit = |template: &Option<String>| template.as_deref().and_then(Query::parse);
        get_query = explicit(&conf.get_query).or(get_query);
        list_query = explicit(&conf.list_query).or(list_query);
        upsert_query = explicit(&conf.upsert_query).or(upsert_query);
        del_query = explicit(&conf.del_query).or(del_query);

        let get_query = get_query.ok_or_else(|| {
            StoreError::InvalidBindConfig(format!(
                "bind `{}` needs a get_query or a table_name",
                conf.key
            ))
        })?;

        if conf.readonly {
            upsert_query = None;
            del_query = None;
        }

        let table = conf
            .table_name
            .clone()
            .or_else(|| get_query.table().map(str::to_string))
            .or_else(|| {
                list_query
                    .as_ref()
                    .and_then(|q| q.table().map(str::to_string))
            });

        Ok(Binding {
            dbnum: conf.dbnum,
            pattern,
            get_query,
            list_query,
            upsert_query,
            del_query,
            table,
            reorganize_nested: conf.reorganize_nested,
            datatype_mapping: conf.datatype_mapping.clone(),
            executor,
        })
    }

    pub fn dbnum(&self) -> u32 {
        self.dbnum
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Table used to route change notifications
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn is_readonly(&self) -> bool {
        self.upsert_query.is_none() && self.del_query.is_none()
    }

    pub fn match_key(&self, key: &str, ctx: &mut ExecContext) -> bool {
        self.pattern.matches(key, ctx)
    }

    /// Glob match against the literal rendering of the pattern
    pub fn match_pattern(&self, pattern: &str) -> bool {
        glob::matches(pattern, &self.pattern.to_string())
    }

    pub async fn get(&self, ctx: &ExecContext) -> Result<Record> {
        let args = self.get_query.args(ctx);
        debug!(dbnum = self.dbnum, query = %self.get_query, ?args, "get");

        let rows = self.executor.fetch(&self.get_query, &args).await?;
        let record = rows.into_iter().next().ok_or(StoreError::NotFound)?;
        self.post_process(record)
    }

    pub async fn list(&self, ctx: &ExecContext) -> Result<Vec<Record>> {
        let Some(query) = &self.list_query else {
            return Ok(Vec::new());
        };
        let args = query.args(ctx);
        debug!(dbnum = self.dbnum, query = %query, ?args, "list");

        self.executor
            .fetch(query, &args)
            .await?
            .into_iter()
            .map(|record| self.post_process(record))
            .collect()
    }

    /// Merge a JSON object payload over `ctx` and run the upsert query
    pub async fn upsert(&self, ctx: &mut ExecContext, payload: &[u8]) -> Result<()> {
        let query = self.upsert_query.as_ref().ok_or(StoreError::ReadOnly)?;
        let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(payload)?;
        ctx.merge_json(fields);

        let args = query.args(ctx);
        debug!(dbnum = self.dbnum, query = %query, ?args, "upsert");
        self.executor.execute(query, &args).await?;
        Ok(())
    }

    /// Run the delete query, `NotFound` when nothing was deleted
    pub async fn del(&self, ctx: &ExecContext) -> Result<()> {
        let query = self.del_query.as_ref().ok_or(StoreError::ReadOnly)?;
        let args = query.args(ctx);
        debug!(dbnum = self.dbnum, query = %query, ?args, "del");

        match self.executor.execute(query, &args).await? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    fn post_process(&self, record: Record) -> Result<Record> {
        let mut record = if self.reorganize_nested {
            record.reshape_nested()?
        } else {
            record
        };
        if !self.datatype_mapping.is_empty() {
            record.cast(&self.datatype_mapping)?;
        }
        Ok(record)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("dbnum", &self.dbnum)
            .field("pattern", &self.pattern.template())
            .field("table", &self.table)
            .finish()
    }
}
