use std::{
    error::Error,
    io,
    sync::atomic::{AtomicBool, Ordering},
    thread::sleep,
    time::Duration,
};

use crate::{
    commands::{Chat, CommandRouter},
    output::{print_connected, print_message, print_whisper},
    utils::{send_to_error_log, ErrorContext},
};

use super::{
    frame::LineBuffer,
    parse::{parse, TwitchMessage, PONG},
    transport::{self, is_connection_lost, Transport, TransportKind},
};

const CONN_MAX_RETRIES: u8 = 3;
const RECEIVE_BYTES: usize = 1024;
const RECEIVE_WAIT: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

pub struct Credentials {
    pub nickname: String,
    pub oauth_token: String,
    pub channel: String,
}

/// The sending half of a session. Commands get this and nothing else.
pub struct ChatSession {
    transport: Box<dyn Transport>,
    channel: String,
}

impl ChatSession {
    pub fn send_raw(&mut self, message: &str) -> Result<(), Box<dyn Error>> {
        self.transport.send(message)?;

        Ok(())
    }
}

impl Chat for ChatSession {
    fn send_privmsg(&mut self, message: &str) -> Result<(), Box<dyn Error>> {
        let message = format!("PRIVMSG {} :{message}", self.channel);
        self.send_raw(&message)
    }
}

/// A connection to one Twitch channel's chat.
///
/// Teardown runs exactly once: when [`TwitchIRC::listen`] returns, or on
/// drop otherwise.
pub struct TwitchIRC {
    chat: ChatSession,
    credentials: Credentials,
    transport_kind: Option<TransportKind>,
    commands: CommandRouter,
    lines: LineBuffer,
    ready: bool,
    stopped: bool,
}

fn handshake(transport: &mut dyn Transport, credentials: &Credentials) -> io::Result<()> {
    transport.send(&format!("PASS {}", credentials.oauth_token))?;
    transport.send(&format!("NICK {}", credentials.nickname))?;
    transport.send(&format!("JOIN {}", credentials.channel))?;

    // Ask Twitch for message tags, JOIN/PART and its own commands
    transport.send("CAP REQ :twitch.tv/tags")?;
    transport.send("CAP REQ :twitch.tv/membership")?;
    transport.send("CAP REQ :twitch.tv/commands")?;

    Ok(())
}

/// Sleeps `delay` in short slices. Returns false if `shutdown` was set.
fn wait(delay: Duration, shutdown: &AtomicBool) -> bool {
    let mut waited = Duration::ZERO;
    while waited < delay {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }

        let slice = SHUTDOWN_POLL.min(delay - waited);
        sleep(slice);
        waited += slice;
    }

    !shutdown.load(Ordering::Relaxed)
}

/// Opens a transport and sends the handshake, retrying with a growing delay.
/// Returns `None` when `shutdown` is set before a connection is made.
fn connect(
    kind: TransportKind,
    credentials: &Credentials,
    shutdown: &AtomicBool,
    retry: u8,
) -> Result<Option<Box<dyn Transport>>, Box<dyn Error>> {
    if retry == CONN_MAX_RETRIES {
        return Err(format!("Could not connect to Twitch IRC servers, tried {retry} times.").into());
    }

    let delay = 5 * retry;
    if !wait(Duration::from_secs(delay.into()), shutdown) {
        return Ok(None);
    }

    let mut transport = match transport::connect(kind) {
        Ok(transport) => transport,

        Err(conn_error) => {
            send_to_error_log(conn_error.to_string(), "Error during connection to socket".into());

            return connect(kind, credentials, shutdown, retry + 1);
        }
    };

    if let Err(handshake_error) = handshake(transport.as_mut(), credentials) {
        send_to_error_log(handshake_error.to_string(), "Error while sending the handshake".into());
        transport.close();

        return connect(kind, credentials, shutdown, retry + 1);
    }

    Ok(Some(transport))
}

impl TwitchIRC {
    /// Connects to Twitch chat. `None` means `shutdown` was set first.
    pub fn connect(
        kind: TransportKind,
        credentials: Credentials,
        commands: CommandRouter,
        shutdown: &AtomicBool,
    ) -> Result<Option<Self>, Box<dyn Error>> {
        let Some(transport) = connect(kind, &credentials, shutdown, 0)? else {
            return Ok(None);
        };

        Ok(Some(TwitchIRC::new(transport, credentials, commands, Some(kind))))
    }

    /// A session over an already open transport. It cannot reconnect.
    pub fn with_transport(
        mut transport: Box<dyn Transport>,
        credentials: Credentials,
        commands: CommandRouter,
    ) -> Result<Self, Box<dyn Error>> {
        handshake(transport.as_mut(), &credentials)?;

        Ok(TwitchIRC::new(transport, credentials, commands, None))
    }

    fn new(
        transport: Box<dyn Transport>,
        credentials: Credentials,
        commands: CommandRouter,
        transport_kind: Option<TransportKind>,
    ) -> Self {
        TwitchIRC {
            chat: ChatSession {
                transport,
                channel: credentials.channel.clone(),
            },
            credentials,
            transport_kind,
            commands,
            lines: LineBuffer::new(),
            ready: false,
            stopped: false,
        }
    }

    /// Whether Twitch confirmed the channel join.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Reads and handles chat until `shutdown` is set, then tears down.
    pub fn listen(&mut self, shutdown: &AtomicBool) -> Result<(), Box<dyn Error>> {
        let result = self.receive_loop(shutdown);
        self.stop();

        result
    }

    fn receive_loop(&mut self, shutdown: &AtomicBool) -> Result<(), Box<dyn Error>> {
        while !shutdown.load(Ordering::Relaxed) {
            match self.chat.transport.receive(RECEIVE_BYTES, RECEIVE_WAIT) {
                Ok(data) => self.process(&data),

                Err(error) if is_connection_lost(&error) => self.reconnect(error, shutdown)?,

                Err(error) => send_to_error_log(error.to_string(), self.error_context(None)),
            }
        }

        Ok(())
    }

    /// Handles every line completed by `data`. Errors are logged with the
    /// line that caused them.
    pub fn process(&mut self, data: &[u8]) {
        for line in self.lines.feed(data) {
            if let Err(error) = self.handle_line(&line) {
                send_to_error_log(error.to_string(), self.error_context(Some(&line)));
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<(), Box<dyn Error>> {
        if line == self.ready_message() {
            self.ready = true;
            print_connected();

            return Ok(());
        }

        match parse(line, &self.credentials.channel, &self.credentials.nickname) {
            TwitchMessage::PingMessage => self.chat.send_raw(PONG),

            TwitchMessage::PrivMessage { message } => {
                print_message(&message);
                self.commands.dispatch(&message.tags, &message.text, &mut self.chat)?;

                Ok(())
            }

            TwitchMessage::WhisperMessage { tags, text } => {
                print_whisper(&tags, &text);

                Ok(())
            }

            TwitchMessage::UnknownMessage => Ok(()),
        }
    }

    fn ready_message(&self) -> String {
        let nickname = &self.credentials.nickname;

        format!(":{nickname}!{nickname}@{nickname}.tmi.twitch.tv JOIN {}", self.credentials.channel)
    }

    fn reconnect(&mut self, error: io::Error, shutdown: &AtomicBool) -> Result<(), Box<dyn Error>> {
        send_to_error_log(error.to_string(), "Connection closed".to_string());

        let Some(kind) = self.transport_kind else {
            return Err(error.into());
        };

        self.chat.transport.close();

        // Shutting down, the receive loop sees the flag next
        let Some(transport) = connect(kind, &self.credentials, shutdown, 0)? else {
            return Ok(());
        };

        self.chat.transport = transport;
        self.lines = LineBuffer::new();
        self.ready = false;

        Ok(())
    }

    /// Leaves the channel, closes the connection and shuts the commands
    /// down. Only the first call does anything.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let part = format!("PART {}", self.credentials.channel);
        if let Err(part_error) = self.chat.send_raw(&part) {
            send_to_error_log(part_error.to_string(), self.error_context(None));
        }

        self.chat.transport.close();

        if let Err(shutdown_error) = self.commands.shutdown() {
            send_to_error_log(shutdown_error.to_string(), self.error_context(None));
        }
    }

    fn error_context(&self, line: Option<&str>) -> String {
        ErrorContext {
            channel: &self.credentials.channel,
            line,
        }
        .to_json()
    }
}

impl Drop for TwitchIRC {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        error::Error,
        io,
        rc::Rc,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    use super::{connect, Credentials, TwitchIRC};
    use crate::{
        commands::{Chat, ChatCommand, CommandRouter},
        twitch::{
            fixtures::{chat_line, ScriptedTransport, ACCOUNT, CHANNEL, JOIN_CONFIRMATION},
            parse::Tags,
            transport::{connection_closed, TransportKind},
        },
    };

    const HANDSHAKE: [&str; 6] = [
        "PASS oauth:secret",
        "NICK deathbot",
        "JOIN #chan",
        "CAP REQ :twitch.tv/tags",
        "CAP REQ :twitch.tv/membership",
        "CAP REQ :twitch.tv/commands",
    ];

    /// Replies with the display name and text it was called with.
    struct Echo {
        shutdowns: Rc<Cell<u32>>,
    }

    impl ChatCommand for Echo {
        fn handle(&mut self, tags: &Tags, text: &str, chat: &mut dyn Chat) -> Result<(), Box<dyn Error>> {
            let Some(display_name) = tags.display_name() else {
                return Err("no display name".into());
            };

            chat.send_privmsg(&format!("{display_name} said {text}"))
        }

        fn shutdown(&mut self) -> Result<(), Box<dyn Error>> {
            self.shutdowns.set(self.shutdowns.get() + 1);
            Ok(())
        }
    }

    struct Session {
        irc: TwitchIRC,
        sent: Rc<RefCell<Vec<String>>>,
        closed: Rc<Cell<bool>>,
        shutdowns: Rc<Cell<u32>>,
        shutdown: Arc<AtomicBool>,
    }

    impl Session {
        /// Lines sent after the handshake.
        fn sent(&self) -> Vec<String> {
            self.sent.borrow()[HANDSHAKE.len()..].to_vec()
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            nickname: ACCOUNT.to_string(),
            oauth_token: "oauth:secret".to_string(),
            channel: CHANNEL.to_string(),
        }
    }

    fn session(transport: ScriptedTransport) -> Session {
        let sent = Rc::clone(&transport.sent);
        let closed = Rc::clone(&transport.closed);
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport {
            shutdown: Some(Arc::clone(&shutdown)),
            ..transport
        };

        let shutdowns = Rc::new(Cell::new(0));
        let mut commands = CommandRouter::new();
        commands.register(
            "!echo",
            Box::new(Echo {
                shutdowns: Rc::clone(&shutdowns),
            }),
        );

        let irc = TwitchIRC::with_transport(Box::new(transport), credentials(), commands).unwrap();

        Session {
            irc,
            sent,
            closed,
            shutdowns,
            shutdown,
        }
    }

    #[test]
    fn test_handshake() {
        let session = session(ScriptedTransport::default());

        assert_eq!(*session.sent.borrow(), HANDSHAKE);
        assert!(!session.irc.is_ready());
    }

    #[test]
    fn test_ping_is_answered() {
        let mut session = session(ScriptedTransport::default());
        session.irc.process(b"PING :tmi.twitch.tv\r\n");

        assert_eq!(session.sent(), vec!["PONG :tmi.twitch.tv"]);
    }

    #[test]
    fn test_join_confirmation_marks_ready() {
        let mut session = session(ScriptedTransport::default());
        session.irc.process(format!("{JOIN_CONFIRMATION}\r\n").as_bytes());

        assert!(session.irc.is_ready());
        assert!(session.sent().is_empty());
    }

    #[test]
    fn test_command_is_dispatched() {
        let mut session = session(ScriptedTransport::default());
        session.irc.process(chat_line("display-name=Foo;mod=0", "foo", "!echo hi").as_bytes());
        session.irc.process(chat_line("display-name=Foo;mod=0", "foo", "just chatting").as_bytes());

        assert_eq!(session.sent(), vec!["PRIVMSG #chan :Foo said !echo hi"]);
    }

    #[test]
    fn test_line_split_between_reads() {
        let mut session = session(ScriptedTransport::default());
        let line = chat_line("display-name=Foo", "foo", "!echo split");
        let (first, second) = line.split_at(30);

        session.irc.process(first.as_bytes());
        assert!(session.sent().is_empty());

        session.irc.process(second.as_bytes());
        assert_eq!(session.sent(), vec!["PRIVMSG #chan :Foo said !echo split"]);
    }

    #[test]
    fn test_failing_line_does_not_stop_later_lines() {
        let mut session = session(ScriptedTransport::default());
        let lines = format!(
            ":foo!foo@foo.tmi.twitch.tv PRIVMSG #other :!echo elsewhere\r\n{}{}",
            chat_line("mod=0", "nameless", "!echo first"),
            chat_line("display-name=Foo", "foo", "!echo second"),
        );

        session.irc.process(lines.as_bytes());

        assert_eq!(session.sent(), vec!["PRIVMSG #chan :Foo said !echo second"]);
    }

    #[test]
    fn test_listen_until_shutdown() {
        let line = chat_line("display-name=Foo", "foo", "!echo hello");
        let mut session = session(ScriptedTransport::new(&["PING :tmi.", "twitch.tv\r\n", "", &line]));

        session.irc.listen(&session.shutdown).unwrap();

        assert_eq!(
            session.sent(),
            vec!["PONG :tmi.twitch.tv", "PRIVMSG #chan :Foo said !echo hello", "PART #chan"]
        );
        assert!(session.closed.get());
        assert_eq!(session.shutdowns.get(), 1);
    }

    #[test]
    fn test_transient_read_error_is_skipped() {
        let mut transport = ScriptedTransport::new(&[]);
        transport.incoming.push_back(Err(io::Error::other("flaky")));
        transport.incoming.push_back(Ok(b"PING :tmi.twitch.tv\r\n".to_vec()));
        let mut session = session(transport);

        session.irc.listen(&session.shutdown).unwrap();

        assert_eq!(session.sent(), vec!["PONG :tmi.twitch.tv", "PART #chan"]);
    }

    #[test]
    fn test_lost_connection_still_tears_down() {
        let mut transport = ScriptedTransport::new(&[]);
        transport.incoming.push_back(Err(connection_closed()));
        let mut session = session(transport);

        assert!(session.irc.listen(&session.shutdown).is_err());
        assert_eq!(session.sent(), vec!["PART #chan"]);
        assert!(session.closed.get());
        assert_eq!(session.shutdowns.get(), 1);
    }

    #[test]
    fn test_drop_tears_down_once() {
        let session = session(ScriptedTransport::default());
        let Session {
            mut irc,
            sent,
            closed,
            shutdowns,
            ..
        } = session;

        irc.stop();
        drop(irc);

        assert_eq!(sent.borrow().last().map(String::as_str), Some("PART #chan"));
        assert_eq!(sent.borrow().iter().filter(|line| line.starts_with("PART")).count(), 1);
        assert!(closed.get());
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_drop_without_listen_tears_down() {
        let session = session(ScriptedTransport::default());
        let shutdowns = Rc::clone(&session.shutdowns);
        let sent = Rc::clone(&session.sent);
        drop(session);

        assert_eq!(sent.borrow().last().map(String::as_str), Some("PART #chan"));
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_connect_gives_up_when_shutting_down() {
        let shutdown = AtomicBool::new(true);
        let started = Instant::now();

        let transport = connect(TransportKind::Tcp, &credentials(), &shutdown, 1).unwrap();

        assert!(transport.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_during_reconnect_stops_retrying() {
        let mut session = session(ScriptedTransport::default());
        session.irc.transport_kind = Some(TransportKind::Tcp);
        session.shutdown.store(true, Ordering::Relaxed);

        let started = Instant::now();
        session.irc.reconnect(connection_closed(), &session.shutdown).unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(session.closed.get());

        session.irc.listen(&session.shutdown).unwrap();
        assert_eq!(session.shutdowns.get(), 1);
    }
}
