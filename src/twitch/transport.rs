use std::{
    error::Error,
    io::{self, ErrorKind, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

use clap::ValueEnum;
use tungstenite::{stream::MaybeTlsStream, Message, WebSocket};

const TWITCH_IRC_SERVER: &str = "irc.chat.twitch.tv";
const TWITCH_IRC_PORT: u16 = 6667;
const TWITCH_IRC_WEBSOCKET: &str = "wss://irc-ws.chat.twitch.tv:443";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The socket a chat session talks through.
pub trait Transport {
    /// Sends one IRC line. The transport adds its own framing.
    fn send(&mut self, line: &str) -> io::Result<()>;

    /// Waits up to `wait` for data. An empty read means nothing arrived in
    /// time. A closed connection is an error, see [`is_connection_lost`].
    fn receive(&mut self, max_bytes: usize, wait: Duration) -> io::Result<Vec<u8>>;

    fn close(&mut self);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Plain IRC over TCP
    #[default]
    Tcp,

    /// IRC over a secure WebSocket
    Websocket,
}

pub fn connect(kind: TransportKind) -> Result<Box<dyn Transport>, Box<dyn Error>> {
    Ok(match kind {
        TransportKind::Tcp => Box::new(TcpTransport::connect(TWITCH_IRC_SERVER, TWITCH_IRC_PORT)?),
        TransportKind::Websocket => Box::new(WebSocketTransport::connect(TWITCH_IRC_WEBSOCKET)?),
    })
}

pub fn connection_closed() -> io::Error {
    io::Error::new(ErrorKind::UnexpectedEof, "connection closed by server")
}

pub fn is_connection_lost(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

// A zero read timeout is rejected by the OS
fn read_timeout(wait: Duration) -> Option<Duration> {
    Some(wait.max(Duration::from_millis(1)))
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let mut last_error = io::Error::new(ErrorKind::NotFound, format!("{host} did not resolve"));
        for address in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&address, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(TcpTransport { stream }),
                Err(error) => last_error = error,
            }
        }

        Err(last_error)
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(format!("{line}\r\n").as_bytes())
    }

    fn receive(&mut self, max_bytes: usize, wait: Duration) -> io::Result<Vec<u8>> {
        self.stream.set_read_timeout(read_timeout(wait))?;

        let mut buffer = vec![0; max_bytes];
        match self.stream.read(&mut buffer) {
            Ok(0) => Err(connection_closed()),

            Ok(read) => {
                buffer.truncate(read);
                Ok(buffer)
            }

            Err(error) if is_timeout(&error) => Ok(vec![]),

            Err(error) => Err(error),
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

pub struct WebSocketTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    pub fn connect(url: &str) -> Result<Self, Box<dyn Error>> {
        let (socket, _) = tungstenite::connect(url)?;

        Ok(WebSocketTransport { socket })
    }

    fn set_read_timeout(&mut self, wait: Duration) -> io::Result<()> {
        match self.socket.get_mut() {
            MaybeTlsStream::Plain(stream) => stream.set_read_timeout(read_timeout(wait)),
            MaybeTlsStream::NativeTls(stream) => stream.get_mut().set_read_timeout(read_timeout(wait)),
            _ => Ok(()),
        }
    }
}

impl Transport for WebSocketTransport {
    fn send(&mut self, line: &str) -> io::Result<()> {
        self.socket.send(Message::Text(line.to_string())).map_err(io::Error::other)
    }

    // Every text frame carries whole lines, so `max_bytes` does not apply.
    fn receive(&mut self, _max_bytes: usize, wait: Duration) -> io::Result<Vec<u8>> {
        self.set_read_timeout(wait)?;

        match self.socket.read() {
            Ok(Message::Text(mut text)) => {
                if !text.ends_with("\r\n") {
                    text.push_str("\r\n");
                }

                Ok(text.into_bytes())
            }

            Ok(Message::Close(_)) => Err(connection_closed()),

            Ok(_) => Ok(vec![]),

            Err(tungstenite::Error::Io(error)) if is_timeout(&error) => Ok(vec![]),

            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Err(connection_closed()),

            Err(error) => Err(io::Error::other(error)),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}
