pub mod commands;
pub mod interface;
pub mod output;
pub mod twitch;
pub mod utils;
