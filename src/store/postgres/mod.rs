//! PostgreSQL backend
//!
//! Pooled [`Executor`] over `tokio-postgres`/`deadpool-postgres`, plus a
//! LISTEN/NOTIFY change feed. Arguments travel in text format so the server
//! infers each parameter's type from the statement.

mod decode;
mod notify;

pub use notify::decode_notification;

use super::{BindingStore, ChangeEvent, ConnectContext, Executor, NotificationSource, Store, StoreConnector};
use crate::error::{Result, StoreError};
use crate::query::{syntax_for, Query};
use crate::record::Record;
use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_types::{to_sql_checked, Format, IsNull, ToSql, Type};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_postgres::NoTls;
use tracing::info;

/// `postgres://`, `postgresql://` and `pgx://` URLs
pub struct PostgresConnector;

#[async_trait]
impl StoreConnector for PostgresConnector {
    async fn connect(&self, url: &str, _ctx: &ConnectContext) -> Result<Arc<dyn Store>> {
        let executor = PgExecutor::new(url)?;
        executor.ping().await?;
        Ok(Arc::new(BindingStore::new(
            "postgres",
            Arc::new(executor),
            syntax_for("postgres"),
        )))
    }
}

/// Pooled statement executor
pub struct PgExecutor {
    pool: Pool,
    url: String,
}

impl PgExecutor {
    pub fn new(url: &str) -> Result<Self> {
        let url = normalize_url(url);
        let mut cfg = Config::new();
        cfg.url = Some(url.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(StoreError::backend)?;
        Ok(PgExecutor { pool, url })
    }

    async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await.map_err(StoreError::backend)?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(StoreError::backend)?;
        info!("PostgreSQL pool ready");
        Ok(())
    }
}

/// `pgx://` is an alias of `postgres://`
fn normalize_url(url: &str) -> String {
    match url.strip_prefix("pgx://") {
        Some(rest) => format!("postgres://{rest}"),
        None => url.to_string(),
    }
}

/// Statement argument sent as text, `None` as NULL
#[derive(Debug)]
struct TextArg<'a>(Option<&'a str>);

impl ToSql for TextArg<'_> {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

fn text_args(args: &[Option<String>]) -> Vec<TextArg<'_>> {
    args.iter().map(|arg| TextArg(arg.as_deref())).collect()
}

fn params<'a>(args: &'a [TextArg<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    args.iter().map(|arg| arg as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Executor for PgExecutor {
    async fn fetch(&self, query: &Query, args: &[Option<String>]) -> Result<Vec<Record>> {
        let client = self.pool.get().await.map_err(StoreError::backend)?;
        let args = text_args(args);
        let rows = client
            .query(query.statement(), &params(&args))
            .await
            .map_err(StoreError::backend)?;
        rows.iter().map(decode::record).collect()
    }

    async fn execute(&self, query: &Query, args: &[Option<String>]) -> Result<u64> {
        let client = self.pool.get().await.map_err(StoreError::backend)?;
        let args = text_args(args);
        client
            .execute(query.statement(), &params(&args))
            .await
            .map_err(StoreError::backend)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }

    fn notifications(&self) -> Option<&dyn NotificationSource> {
        Some(self)
    }
}

#[async_trait]
impl NotificationSource for PgExecutor {
    async fn listen(&self, channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
        notify::listen(&self.url, channel, events).await
    }
}
