use std::{collections::HashMap, error::Error};

use crate::twitch::parse::Tags;

pub mod deaths;
pub mod guesses;
pub mod store;

/// The send side of a chat session, all a command gets to talk back with.
pub trait Chat {
    fn send_privmsg(&mut self, message: &str) -> Result<(), Box<dyn Error>>;
}

/// A chat command such as `!deaths`.
pub trait ChatCommand {
    /// Called with the message tags and the full message text, command name
    /// included.
    fn handle(&mut self, tags: &Tags, text: &str, chat: &mut dyn Chat) -> Result<(), Box<dyn Error>>;

    /// Runs once when the session is torn down.
    fn shutdown(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

#[derive(Default)]
pub struct CommandRouter {
    commands: HashMap<String, Box<dyn ChatCommand>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        CommandRouter::default()
    }

    /// Registers `command` for messages starting with `name`. Registering the
    /// same name again replaces the earlier command.
    pub fn register(&mut self, name: &str, command: Box<dyn ChatCommand>) {
        self.commands.insert(name.to_string(), command);
    }

    #[cfg(test)]
    pub fn is_registered(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Runs the command named by the first word of `text`, if there is one.
    /// Returns whether a command ran.
    pub fn dispatch(&mut self, tags: &Tags, text: &str, chat: &mut dyn Chat) -> Result<bool, Box<dyn Error>> {
        let Some(first_word) = text.split_whitespace().next() else {
            return Ok(false);
        };

        let Some(command) = self.commands.get_mut(first_word) else {
            return Ok(false);
        };

        command.handle(tags, text, chat)?;

        Ok(true)
    }

    /// Shuts every command down. All commands get their turn, the first
    /// error is returned.
    pub fn shutdown(&mut self) -> Result<(), Box<dyn Error>> {
        let mut result = Ok(());
        for command in self.commands.values_mut() {
            let shutdown = command.shutdown();
            if result.is_ok() {
                result = shutdown;
            }
        }

        result
    }
}
