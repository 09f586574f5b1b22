//! Backend statement execution

use super::ChangeEvent;
use crate::error::Result;
use crate::query::Query;
use crate::record::Record;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Runs parsed queries against one backend connection pool
///
/// Arguments are positional and already resolved; `None` is bound as NULL.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn fetch(&self, query: &Query, args: &[Option<String>]) -> Result<Vec<Record>>;

    /// Number of affected rows
    async fn execute(&self, query: &Query, args: &[Option<String>]) -> Result<u64>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn notifications(&self) -> Option<&dyn NotificationSource> {
        None
    }
}

/// Backend-specific change feed (e.g. LISTEN/NOTIFY)
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn listen(&self, channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()>;
}
