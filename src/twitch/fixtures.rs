use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    error::Error,
    io,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::commands::Chat;

use super::{parse::Tags, transport::Transport};

pub const CHANNEL: &str = "#chan";
pub const ACCOUNT: &str = "deathbot";

pub const JOIN_CONFIRMATION: &str = ":deathbot!deathbot@deathbot.tmi.twitch.tv JOIN #chan";

pub const FULL_PRIVMSG: &str = "@badge-info=;badges=broadcaster/1,premium/1;client-nonce=98d669c84201118e21161fa8c20c4ed1;color=#8A2BE2;display-name=BounceyBoy;emotes=;first-msg=0;flags=;id=20a7e212-b422-4fcd-8a14-701ec4c43bdf;mod=0;returning-chatter=0;room-id=961536166;subscriber=0;tmi-sent-ts=1707472368016;turbo=0;user-id=961536166;user-type= :bounceyboy!bounceyboy@bounceyboy.tmi.twitch.tv PRIVMSG #chan :this is a message with lots of things to parse";

pub const ACTION_PRIVMSG: &str = "@badges=;color=#FF4500;display-name=vei_bean;mod=0 :vei_bean!vei_bean@vei_bean.tmi.twitch.tv PRIVMSG #chan :\x01ACTION !deaths 12\x01";

pub const ROOMSTATE: &str = "@emote-only=0;followers-only=-1;r9k=0;room-id=961536166;slow=0;subs-only=0 :tmi.twitch.tv ROOMSTATE #chan";

pub const WHISPER: &str = "@badges=;color=;display-name=Foo;emotes=;message-id=1;thread-id=123_456;turbo=0;user-id=123;user-type= :foo!foo@foo.tmi.twitch.tv WHISPER deathbot :hi there: how are you";

pub fn chat_line(tags: &str, nick: &str, text: &str) -> String {
    format!("@{tags} :{nick}!{nick}@{nick}.tmi.twitch.tv PRIVMSG #chan :{text}\r\n")
}

pub fn viewer(name: &str) -> Tags {
    [("badges", ""), ("display-name", name), ("mod", "0")].into_iter().collect()
}

pub fn moderator(name: &str) -> Tags {
    [("badges", "moderator/1"), ("display-name", name), ("mod", "1")].into_iter().collect()
}

pub fn broadcaster(name: &str) -> Tags {
    [("badges", "broadcaster/1,subscriber/0"), ("display-name", name), ("mod", "0")].into_iter().collect()
}

#[derive(Debug, Default)]
pub struct RecordingChat {
    pub sent: Vec<String>,
}

impl Chat for RecordingChat {
    fn send_privmsg(&mut self, message: &str) -> Result<(), Box<dyn Error>> {
        self.sent.push(message.to_string());
        Ok(())
    }
}

/// Plays back scripted reads and records every line sent.
///
/// Once the script runs out it flips `shutdown`, like a Ctrl-C would.
#[derive(Default)]
pub struct ScriptedTransport {
    pub incoming: VecDeque<io::Result<Vec<u8>>>,
    pub sent: Rc<RefCell<Vec<String>>>,
    pub closed: Rc<Cell<bool>>,
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl ScriptedTransport {
    pub fn new(reads: &[&str]) -> Self {
        ScriptedTransport {
            incoming: reads.iter().map(|read| Ok(read.as_bytes().to_vec())).collect(),
            ..ScriptedTransport::default()
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, line: &str) -> io::Result<()> {
        self.sent.borrow_mut().push(line.to_string());
        Ok(())
    }

    fn receive(&mut self, _max_bytes: usize, _wait: Duration) -> io::Result<Vec<u8>> {
        match self.incoming.pop_front() {
            Some(read) => read,
            None => {
                if let Some(shutdown) = &self.shutdown {
                    shutdown.store(true, Ordering::Relaxed);
                }

                Ok(vec![])
            }
        }
    }

    fn close(&mut self) {
        self.closed.set(true);
    }
}
