use std::collections::HashMap;

use crate::utils::unescape;

pub const PING: &str = "PING :tmi.twitch.tv";
pub const PONG: &str = "PONG :tmi.twitch.tv";

const SERVER_PREFIX: &str = ":tmi.twitch.tv";
const ACTION_PREFIX: &str = "\x01ACTION";
const ACTION_SUFFIX: char = '\x01';

#[derive(Clone, Debug, PartialEq)]
pub enum TwitchMessage {
    PingMessage,
    PrivMessage { message: ChatMessage },
    WhisperMessage { tags: Tags, text: String },
    UnknownMessage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub tags: Tags,
    pub display_name: String,
    pub text: String,
}

/// Message tags as sent by Twitch. Values are kept raw, use
/// [`Tags::get_unescaped`] for the ones that may contain `\s`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tags(HashMap<String, String>);

// This Badge struct is used to figure out what privileges a user has
#[derive(Clone, Debug, PartialEq)]
pub struct Badge {
    pub set_id: String,
    pub version_id: String,
}

impl Tags {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn get_unescaped(&self, name: &str) -> Option<String> {
        self.get(name).map(unescape)
    }

    pub fn display_name(&self) -> Option<String> {
        self.get_unescaped("display-name").filter(|name| !name.is_empty())
    }

    pub fn badges(&self) -> Vec<Badge> {
        let mut badges = vec![];
        if let Some(value) = self.get("badges") {
            set_badges(value, &mut badges);
        }

        badges
    }

    pub fn is_moderator(&self) -> bool {
        self.get("mod").is_some_and(get_bool)
    }

    pub fn is_broadcaster(&self) -> bool {
        self.badges().iter().any(|badge| badge.set_id == "broadcaster")
    }

    /// Moderators and the broadcaster can run the privileged commands.
    pub fn is_privileged(&self) -> bool {
        self.is_moderator() || self.is_broadcaster()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

pub fn parse_tags(tags_str: &str) -> Tags {
    let tags_str = tags_str.trim();
    let Some(tags_str) = tags_str.strip_prefix('@') else {
        return Tags::default();
    };

    tags_str
        .split(';')
        .filter(|tag| !tag.is_empty())
        .map(|tag| tag.split_once('=').unwrap_or((tag, "")))
        .collect()
}

fn set_badges(tag_value: &str, valid_badges: &mut Vec<Badge>) {
    for badge in tag_value.split(',') {
        if let Some((key, value)) = badge.split_once('/') {
            valid_badges.push(Badge {
                set_id: key.to_string(),
                version_id: value.to_string(),
            });
        }
    }
}

fn get_bool(value: &str) -> bool {
    value == "1"
}

/// Finds `channel` as a whole space-delimited token.
fn find_channel(message: &str, channel: &str) -> Option<usize> {
    if channel.is_empty() {
        return None;
    }

    message.match_indices(channel).map(|(index, _)| index).find(|&index| {
        let before = message[..index].ends_with(' ');
        let after = message[index + channel.len()..]
            .chars()
            .next()
            .map_or(true, |c| c == ' ');

        before && after
    })
}

/// Nick from a `:nick!user@host` prefix, used when `display-name` is missing.
fn get_sender_nick(message: &str) -> Option<&str> {
    let prefix = message.split(' ').find(|part| part.starts_with(':'))?;
    let (nick, _) = prefix[1..].split_once('!')?;

    Some(nick)
}

fn strip_action(text: &str) -> &str {
    match text.strip_prefix(ACTION_PREFIX) {
        Some(action) => {
            let action = action.strip_suffix(ACTION_SUFFIX).unwrap_or(action);
            action.strip_prefix(' ').unwrap_or(action)
        }
        None => text,
    }
}

// @badge-info=;badges=broadcaster/1;color=#8A2BE2;display-name=BounceyBoy;mod=0 :bounceyboy!bounceyboy@bounceyboy.tmi.twitch.tv PRIVMSG #bounceyboy :!deaths 5
// @badges=;color=;display-name=Foo;message-id=1;thread-id=1_2;user-id=1 :foo!foo@foo.tmi.twitch.tv WHISPER deathbot :hi there
/// Best-effort decoding of one IRC line. Anything that does not look like a
/// chat message, whisper or ping is [`TwitchMessage::UnknownMessage`].
pub fn parse(message: &str, channel: &str, account_name: &str) -> TwitchMessage {
    if message == PING {
        return TwitchMessage::PingMessage;
    }

    let Some(channel_index) = find_channel(message, channel) else {
        return parse_without_channel(message, account_name);
    };

    let head = &message[..channel_index];
    let tags = parse_tags(head.rfind(':').map_or("", |tags_end| &head[..tags_end]));

    let r#type = head
        .trim_end()
        .rsplit(' ')
        .next()
        .unwrap_or("")
        .trim_start_matches(':');

    if r#type != "PRIVMSG" {
        return TwitchMessage::UnknownMessage;
    }

    let parameters = message[channel_index + channel.len()..].trim_start();
    let text = strip_action(parameters.strip_prefix(':').unwrap_or(parameters)).to_string();
    if text.trim().is_empty() {
        return TwitchMessage::UnknownMessage;
    }

    let display_name = tags
        .display_name()
        .or_else(|| get_sender_nick(head).map(str::to_string))
        .unwrap_or_default();

    TwitchMessage::PrivMessage {
        message: ChatMessage {
            tags,
            display_name,
            text,
        },
    }
}

fn parse_without_channel(message: &str, account_name: &str) -> TwitchMessage {
    if message.starts_with(SERVER_PREFIX) || account_name.is_empty() {
        return TwitchMessage::UnknownMessage;
    }

    let target = format!("WHISPER {account_name}");
    let Some(target_index) = message.find(&target) else {
        return TwitchMessage::UnknownMessage;
    };

    let Some(text) = message[target_index + target.len()..].trim_start().strip_prefix(':') else {
        return TwitchMessage::UnknownMessage;
    };

    // The colon introducing the sender prefix ends the tag block
    let tags_str = message[..target_index]
        .rfind(':')
        .map_or("", |tags_end| &message[..tags_end]);

    TwitchMessage::WhisperMessage {
        tags: parse_tags(tags_str),
        text: text.to_string(),
    }
}
