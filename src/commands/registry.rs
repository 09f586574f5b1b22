//! Command registry

use super::{admin, hash, key, pubsub, string, Command};
use std::collections::HashMap;
use std::sync::Arc;

/// Every command the gateway answers, keyed by upper-cased name
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut registry = CommandRegistry {
            commands: HashMap::new(),
        };

        // Store-backed reads and writes
        registry.register(Arc::new(string::GetCommand));
        registry.register(Arc::new(string::MGetCommand));
        registry.register(Arc::new(string::SetCommand));
        registry.register(Arc::new(string::MSetCommand));
        registry.register(Arc::new(hash::HGetCommand));
        registry.register(Arc::new(hash::HGetAllCommand));
        registry.register(Arc::new(key::DelCommand));
        registry.register(Arc::new(key::KeysCommand));

        // Publish/subscribe
        registry.register(Arc::new(pubsub::PublishCommand));
        registry.register(Arc::new(pubsub::SubscribeCommand));
        registry.register(Arc::new(pubsub::PSubscribeCommand));
        registry.register(Arc::new(pubsub::UnsubscribeCommand::CHANNELS));
        registry.register(Arc::new(pubsub::UnsubscribeCommand::PATTERNS));

        // Connection
        registry.register(Arc::new(admin::PingCommand));
        registry.register(Arc::new(admin::QuitCommand));
        registry.register(Arc::new(admin::SelectCommand));
        registry.register(Arc::new(admin::ConfigCommand));
        registry.register(Arc::new(admin::ClientCommand));

        registry
    }

    fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name().to_uppercase();
        self.commands.insert(name, command);
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_uppercase()).cloned()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
