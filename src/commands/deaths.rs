use std::error::Error;

use crate::{output::log, twitch::parse::Tags};

use super::{
    guesses::{CheckResult, GuessRegistry, GuessResult, UpdateResult},
    store::GuessStore,
    Chat, ChatCommand, CommandRouter,
};

pub const DEATHS_COMMAND: &str = "!deaths";

const GUESSING_CLOSED: &str = "Guessing is currently closed. Please wait until the next run starts.";

/// `!deaths`: viewers guess how many times the streamer dies in the next run.
///
/// Anyone can guess with `!deaths <number>` and change it with
/// `!deaths update <number>` while guessing is open. Moderators and the
/// broadcaster also get `open`/`start`, `close`/`stop`, `reset`, `restore`
/// and `check <number>`.
pub struct DeathsCommand<S: GuessStore> {
    registry: GuessRegistry,
    store: S,
    streamer: String,
}

impl<S: GuessStore + 'static> DeathsCommand<S> {
    /// Loads the saved guesses and registers `!deaths` with `router`.
    pub fn register(router: &mut CommandRouter, store: S, streamer: &str) -> Result<(), Box<dyn Error>> {
        let command = DeathsCommand::new(store, streamer)?;
        router.register(DEATHS_COMMAND, Box::new(command));

        Ok(())
    }
}

impl<S: GuessStore> DeathsCommand<S> {
    pub fn new(store: S, streamer: &str) -> Result<Self, Box<dyn Error>> {
        let guesses = store.load()?;

        Ok(DeathsCommand {
            registry: GuessRegistry::new(guesses),
            store,
            streamer: streamer.to_string(),
        })
    }

    pub fn registry(&self) -> &GuessRegistry {
        &self.registry
    }

    fn status(&self) -> String {
        if self.registry.is_open() {
            format!(
                "Guessing is currently open! Type \"!deaths <number>\" to guess the number of times {} will die in the next finished run. Winning user(s) get a free sub!",
                self.streamer
            )
        } else {
            GUESSING_CLOSED.to_string()
        }
    }

    fn guess(&mut self, tags: &Tags, guess: u64) -> Result<String, Box<dyn Error>> {
        let display_name = get_display_name(tags)?;

        Ok(match self.registry.guess(&display_name, guess) {
            GuessResult::Recorded => {
                log(&format!("{display_name} guessed {guess}."), false);
                format!("{display_name}'s guess recorded: {guess}")
            }

            GuessResult::AlreadyGuessed(existing) => format!(
                "{display_name}, you already guessed {existing}! Use \"!deaths update <number>\" to change your guess."
            ),

            GuessResult::Closed => GUESSING_CLOSED.to_string(),
        })
    }

    fn update(&mut self, tags: &Tags, argument: Option<&str>) -> Result<String, Box<dyn Error>> {
        let Some(argument) = argument else {
            return Ok("Usage: \"!deaths update <number>\"".to_string());
        };

        let Some(guess) = parse_number(argument) else {
            return Ok(format!("Invalid argument: {argument}"));
        };

        let display_name = get_display_name(tags)?;

        Ok(match self.registry.update(&display_name, guess) {
            UpdateResult::Updated => {
                log(&format!("{display_name} updated guess to {guess}."), false);
                format!("{display_name}'s guess updated: {guess}")
            }

            UpdateResult::NoGuess => {
                format!("{display_name}, you need to use !deaths <number> to make your initial guess.")
            }

            UpdateResult::Closed => GUESSING_CLOSED.to_string(),
        })
    }

    fn check(&self, args: &[String]) -> String {
        if args.len() != 3 {
            return "Usage: !deaths check <number>".to_string();
        }

        let Some(number) = parse_number(&args[2]) else {
            return "Usage: \"!deaths check <number>\"".to_string();
        };

        match self.registry.check(number) {
            CheckResult::Winners(winners) if winners.len() == 1 => {
                format!("The winning user is: {}", winners[0])
            }

            CheckResult::Winners(winners) => format!("The winning users are: {}", winners.join(", ")),

            CheckResult::Closest(closest) => {
                let nearest = closest
                    .iter()
                    .map(|(name, guess)| format!("{name} ({guess})"))
                    .collect::<Vec<String>>()
                    .join(", ");

                if closest.len() > 1 {
                    format!("No one guessed correctly. The closest were {nearest}.")
                } else {
                    format!("No one guessed correctly. The closest was {nearest}.")
                }
            }

            CheckResult::NoGuesses => "No guesses registered.".to_string(),
        }
    }

    /// Moderator-only arguments. `None` for anything else.
    fn privileged(&mut self, args: &[String]) -> Option<String> {
        let reply = match args[1].as_str() {
            "open" | "start" => {
                self.registry.open();
                log("Guessing opened.", true);
                "Guessing is open.".to_string()
            }

            "close" | "stop" => {
                self.registry.close();
                log("Guessing closed.", true);
                "Guessing is closed.".to_string()
            }

            "reset" => {
                self.registry.reset();
                log("Guesses reset.", true);
                "Guessing has been reset.".to_string()
            }

            "restore" => {
                if !self.registry.restore() {
                    return Some("There are no previous guesses to restore.".to_string());
                }

                log("Guesses restored.", true);
                "Previous guesses has been restored.".to_string()
            }

            "check" => self.check(args),

            _ => return None,
        };

        Some(reply)
    }
}

impl<S: GuessStore> ChatCommand for DeathsCommand<S> {
    fn handle(&mut self, tags: &Tags, text: &str, chat: &mut dyn Chat) -> Result<(), Box<dyn Error>> {
        let args: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

        let Some(argument) = args.get(1) else {
            return chat.send_privmsg(&self.status());
        };

        let reply = if let Some(guess) = parse_number(argument) {
            self.guess(tags, guess)?
        } else if argument == "update" {
            self.update(tags, args.get(2).map(String::as_str))?
        } else if tags.is_privileged() {
            match self.privileged(&args) {
                Some(reply) => reply,
                None => format!("Invalid argument: {argument}"),
            }
        } else {
            format!("Invalid argument: {argument}")
        };

        chat.send_privmsg(&reply)
    }

    fn shutdown(&mut self) -> Result<(), Box<dyn Error>> {
        self.store.save(self.registry.guesses())
    }
}

fn get_display_name(tags: &Tags) -> Result<String, Box<dyn Error>> {
    tags.display_name().ok_or_else(|| "Message has no display-name tag".into())
}

/// Only plain digit strings count as numbers, no signs or spaces.
fn parse_number(argument: &str) -> Option<u64> {
    if argument.is_empty() || !argument.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    argument.parse().ok()
}
