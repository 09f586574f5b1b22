//! Command execution context

use crate::pubsub::Broker;
use crate::store::Store;
use std::sync::Arc;

/// Mutable per-connection state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Namespace selected with `SELECT`
    pub dbnum: u32,
}

/// Everything a command may touch while it runs
///
/// One context lives as long as its connection.
pub struct CommandContext {
    pub store: Arc<dyn Store>,
    pub broker: Arc<Broker>,
    pub state: ConnectionState,
}

impl CommandContext {
    pub fn new(store: Arc<dyn Store>, broker: Arc<Broker>) -> Self {
        CommandContext {
            store,
            broker,
            state: ConnectionState::default(),
        }
    }

    pub fn dbnum(&self) -> u32 {
        self.state.dbnum
    }
}
