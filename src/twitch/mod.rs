pub mod frame;
pub mod irc;
pub mod parse;
pub mod transport;

#[cfg(test)]
pub mod fixtures;
