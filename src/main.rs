use std::{
    error::Error,
    sync::{atomic::AtomicBool, Arc},
};

use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use deathcount::{
    commands::{deaths::DeathsCommand, store::FileGuessStore, CommandRouter},
    interface::cli::Cli,
    twitch::irc::{Credentials, TwitchIRC},
};
use dotenv::dotenv;
use signal_hook::{
    consts::signal::{SIGINT, SIGTERM},
    flag,
};

fn report(error: Box<dyn Error>) -> Report {
    eyre!("{error}")
}

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenv().ok();

    let cli = Cli::parse();

    // Ctrl-C only flips the flag, the chat loop notices within a second
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&shutdown)).wrap_err("Could not listen for Ctrl-C")?;
    flag::register(SIGTERM, Arc::clone(&shutdown)).wrap_err("Could not listen for SIGTERM")?;

    let store = match &cli.guesses_file {
        Some(path) => FileGuessStore::new(path),
        None => FileGuessStore::in_data_directory().map_err(report)?,
    };

    let mut commands = CommandRouter::new();
    DeathsCommand::register(&mut commands, store, &cli.streamer())
        .map_err(report)
        .wrap_err("Could not load the saved guesses")?;

    let credentials = Credentials {
        nickname: cli.nickname(),
        oauth_token: cli.token.clone(),
        channel: cli.channel(),
    };

    println!("Connecting to {}...", credentials.channel);
    let Some(mut twitch_irc) = TwitchIRC::connect(cli.transport, credentials, commands, &shutdown)
        .map_err(report)
        .wrap_err("Could not connect to Twitch chat")?
    else {
        return Ok(());
    };

    twitch_irc.listen(&shutdown).map_err(report)?;

    Ok(())
}
