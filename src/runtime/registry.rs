//! Command registration and lookup.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use super::traits::CommandHandler;

struct CommandEntry {
    name: String,
    handler: Box<dyn CommandHandler>,
}

/// Maps command names to their handlers.
///
/// Commands are registered once at startup and looked up by a linear scan;
/// registries hold tens of entries at most. Names are expected to be unique,
/// and the first registration wins if they are not.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        let name = name.into();
        if self.contains(&name) {
            warn!("Command '{}' is already registered, ignoring new handler", name);
            return;
        }
        self.commands.push(CommandEntry {
            name,
            handler: Box::new(handler),
        });
    }

    /// Finds the handler registered under `name`.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut (dyn CommandHandler + 'static)> {
        self.commands
            .iter_mut()
            .find(|entry| entry.name == name)
            .map(|entry| entry.handler.as_mut())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.iter().any(|entry| entry.name == name)
    }

    /// Get an iterator over the registered command names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
