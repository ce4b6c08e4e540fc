use std::path::PathBuf;

use clap::Parser;

use crate::twitch::transport::TransportKind;

/// Runs the !deaths guessing game in a Twitch channel's chat
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Your Twitch username
    #[arg(long, env = "TWITCH_NAME")]
    pub name: String,

    /// Your Twitch OAuth token
    #[arg(long, env = "OAUTH_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Channel to join, defaults to your own
    #[arg(long, env = "TWITCH_CHANNEL")]
    pub channel: Option<String>,

    /// Name used when announcing that guessing is open, defaults to the channel name
    #[arg(long, env = "STREAMER")]
    pub streamer: Option<String>,

    /// File the guesses are saved to between runs
    #[arg(long, env = "GUESSES_FILE")]
    pub guesses_file: Option<PathBuf>,

    /// How to connect to Twitch chat
    #[arg(long, value_enum, default_value_t = TransportKind::Tcp)]
    pub transport: TransportKind,
}

impl Cli {
    pub fn nickname(&self) -> String {
        self.name.to_lowercase()
    }

    /// The channel as `#name`, the way Twitch echoes it back.
    pub fn channel(&self) -> String {
        let channel = self.channel.as_deref().unwrap_or(self.name.as_str()).trim();
        let channel = channel.trim_start_matches('#').to_lowercase();

        format!("#{channel}")
    }

    pub fn streamer(&self) -> String {
        match &self.streamer {
            Some(streamer) => streamer.to_string(),
            None => self.channel().trim_start_matches('#').to_string(),
        }
    }
}
