//! Minimal FTP client with optional explicit TLS (FTPES).
//!
//! Only what an upload needs is implemented: login, CWD, binary passive-mode
//! STOR and QUIT. With TLS enabled the control connection is upgraded with
//! `AUTH TLS` and data connections are protected with `PROT P`.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};

use super::error::ProtocolError;
use super::session::{Connector, Session};

/// A TCP stream, optionally wrapped in TLS.
enum NetStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// Placeholder while the control connection is being upgraded.
    Detached,
}

impl NetStream {
    fn tcp(&self) -> Option<&TcpStream> {
        match self {
            NetStream::Plain(stream) => Some(stream),
            NetStream::Tls(stream) => Some(&stream.sock),
            NetStream::Detached => None,
        }
    }

    fn upgrade(
        self,
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
    ) -> Result<Self, ProtocolError> {
        let tcp = match self {
            NetStream::Plain(tcp) => tcp,
            other => return Ok(other),
        };
        let connection = ClientConnection::new(config, server_name)?;
        let mut stream = StreamOwned::new(connection, tcp);
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }
        Ok(NetStream::Tls(Box::new(stream)))
    }

    /// Send TLS close_notify (if any) and half-close the socket.
    fn close_write(&mut self) -> io::Result<()> {
        if let NetStream::Tls(stream) = self {
            stream.conn.send_close_notify();
            while stream.conn.wants_write() {
                stream.conn.write_tls(&mut stream.sock)?;
            }
        }
        match self.tcp() {
            Some(tcp) => tcp.shutdown(Shutdown::Write),
            None => Ok(()),
        }
    }

    fn force_close(&self) {
        if let Some(tcp) = self.tcp() {
            let _ = tcp.shutdown(Shutdown::Both);
        }
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NetStream::Plain(stream) => stream.read(buf),
            NetStream::Tls(stream) => stream.read(buf),
            NetStream::Detached => Err(io::ErrorKind::NotConnected.into()),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            NetStream::Plain(stream) => stream.write(buf),
            NetStream::Tls(stream) => stream.write(buf),
            NetStream::Detached => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NetStream::Plain(stream) => stream.flush(),
            NetStream::Tls(stream) => stream.flush(),
            NetStream::Detached => Ok(()),
        }
    }
}

/// A complete server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

/// Opens [`FtpSession`]s over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

impl Connector for FtpConnector {
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        tls: Option<Arc<ClientConfig>>,
    ) -> Result<Box<dyn Session>, ProtocolError> {
        Ok(Box::new(FtpSession::connect(host, port, timeout, tls)?))
    }
}

/// One FTP control connection.
pub struct FtpSession {
    control: BufReader<NetStream>,
    tls: Option<(Arc<ClientConfig>, ServerName<'static>)>,
    peer: IpAddr,
    timeout: Duration,
    data: Option<NetStream>,
}

impl FtpSession {
    /// Connect, read the greeting and, with `tls`, upgrade via `AUTH TLS`.
    pub fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        tls: Option<Arc<ClientConfig>>,
    ) -> Result<Self, ProtocolError> {
        let tcp = connect_tcp((host, port), timeout)?;
        let peer = tcp.peer_addr()?.ip();

        let tls = match tls {
            Some(config) => {
                let name = ServerName::try_from(host.to_string())
                    .map_err(|_| ProtocolError::InvalidServerName(host.to_string()))?;
                Some((config, name))
            }
            None => None,
        };

        let mut session = Self {
            control: BufReader::new(NetStream::Plain(tcp)),
            tls,
            peer,
            timeout,
            data: None,
        };

        let mut greeting = session.read_reply()?;
        while greeting.is_preliminary() {
            greeting = session.read_reply()?;
        }
        check("connect", &greeting, &[220])?;
        log::debug!("Server greeting: {} {}", greeting.code, greeting.text);

        if let Some((config, name)) = session.tls.clone() {
            session.expect("AUTH TLS", &[234])?;
            if !session.control.buffer().is_empty() {
                return Err(ProtocolError::MalformedReply(
                    "unexpected data before TLS handshake".to_string(),
                ));
            }
            let plain = std::mem::replace(session.control.get_mut(), NetStream::Detached);
            *session.control.get_mut() = plain.upgrade(config, name)?;
            log::debug!("Control connection secured");
        }

        Ok(session)
    }

    fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        if line.starts_with("PASS ") {
            log::debug!("> PASS ****");
        } else {
            log::debug!("> {}", line);
        }
        let stream = self.control.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        Ok(())
    }

    fn read_reply(&mut self) -> Result<Reply, ProtocolError> {
        let first = self.read_line()?;
        let code = parse_code(&first)?;
        let mut text = first.get(4..).unwrap_or_default().to_string();

        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{code} ");
            let continuation = format!("{code}-");
            loop {
                let line = self.read_line()?;
                let last = line.starts_with(&terminator) || line == code.to_string();
                text.push('\n');
                if last || line.starts_with(&continuation) {
                    text.push_str(line.get(4..).unwrap_or_default());
                } else {
                    text.push_str(&line);
                }
                if last {
                    break;
                }
            }
        }

        log::debug!("< {} {}", code, text);
        Ok(Reply { code, text })
    }

    fn read_line(&mut self) -> Result<String, ProtocolError> {
        let mut line = String::new();
        if self.control.read_line(&mut line)? == 0 {
            return Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed by server",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn command(&mut self, line: &str) -> Result<Reply, ProtocolError> {
        self.send_line(line)?;
        self.read_reply()
    }

    fn expect(&mut self, line: &str, accepted: &[u16]) -> Result<Reply, ProtocolError> {
        let reply = self.command(line)?;
        check(line, &reply, accepted)?;
        Ok(reply)
    }

    fn open_passive(&mut self) -> Result<NetStream, ProtocolError> {
        let reply = self.expect("PASV", &[227])?;
        let port = parse_pasv_port(&reply.text)?;
        // The advertised host is ignored; servers behind NAT often report a private address.
        let addr = SocketAddr::new(self.peer, port);
        log::debug!("Opening data connection to {}", addr);
        Ok(NetStream::Plain(connect_tcp(addr, self.timeout)?))
    }
}

impl Session for FtpSession {
    fn login(&mut self, user: &str, password: &str) -> Result<(), ProtocolError> {
        let reply = self.expect(&command_line("USER", user)?, &[230, 331])?;
        if reply.code == 331 {
            self.expect(&command_line("PASS", password)?, &[230, 202])?;
        }

        if self.tls.is_some() {
            self.expect("PBSZ 0", &[200])?;
            self.expect("PROT P", &[200])?;
        }
        Ok(())
    }

    fn change_dir(&mut self, directory: &str) -> Result<(), ProtocolError> {
        if directory.trim().is_empty() {
            return Ok(());
        }
        self.expect(&command_line("CWD", directory)?, &[250, 200])?;
        Ok(())
    }

    fn start_store(&mut self, remote_name: &str) -> Result<(), ProtocolError> {
        let store = command_line("STOR", remote_name)?;
        self.expect("TYPE I", &[200])?;
        let data = self.open_passive()?;

        let reply = self.command(&store)?;
        if !reply.is_preliminary() {
            data.force_close();
            return Err(unexpected(&store, &reply));
        }

        let data = match self.tls.clone() {
            Some((config, name)) => data.upgrade(config, name)?,
            None => data,
        };
        self.data = Some(data);
        Ok(())
    }

    fn write_data(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        let data = self.data.as_mut().ok_or_else(|| {
            ProtocolError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "no data connection",
            ))
        })?;
        data.write_all(chunk)?;
        Ok(())
    }

    fn finish_store(&mut self) -> Result<(), ProtocolError> {
        if let Some(mut data) = self.data.take() {
            data.flush()?;
            data.close_write()?;
        }
        let reply = self.read_reply()?;
        check("STOR", &reply, &[226, 250])?;
        Ok(())
    }

    fn abort_store(&mut self) {
        if let Some(data) = self.data.take() {
            data.force_close();
        }
        if let Err(e) = self.send_line("ABOR") {
            log::debug!("Failed to send ABOR: {}", e);
        }
    }

    fn quit(&mut self) -> Result<(), ProtocolError> {
        let result = self.expect("QUIT", &[221]).map(|_| ());
        if let Err(e) = self.control.get_mut().close_write() {
            log::debug!("Failed to close control connection: {}", e);
        }
        result
    }

    fn force_close(&mut self) {
        if let Some(data) = self.data.take() {
            data.force_close();
        }
        self.control.get_ref().force_close();
    }
}

fn connect_tcp(addr: impl ToSocketAddrs, timeout: Duration) -> Result<TcpStream, ProtocolError> {
    let mut last_err = None;
    for candidate in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                log::debug!("Connection to {} failed: {}", candidate, e);
                last_err = Some(e);
            }
        }
    }

    Err(ProtocolError::Io(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host name resolved to no addresses")
    })))
}

/// `VERB argument`, refusing arguments that would end the control line early.
fn command_line(verb: &str, argument: &str) -> Result<String, ProtocolError> {
    if argument.contains(['\r', '\n']) {
        return Err(ProtocolError::LineBreakInArgument(verb.to_string()));
    }
    Ok(format!("{verb} {argument}"))
}

fn check(command: &str, reply: &Reply, accepted: &[u16]) -> Result<(), ProtocolError> {
    if accepted.contains(&reply.code) {
        Ok(())
    } else {
        Err(unexpected(command, reply))
    }
}

fn unexpected(command: &str, reply: &Reply) -> ProtocolError {
    let command = if command.starts_with("PASS ") {
        "PASS"
    } else {
        command
    };
    ProtocolError::UnexpectedReply {
        command: command.to_string(),
        code: reply.code,
        text: reply.text.clone(),
    }
}

fn parse_code(line: &str) -> Result<u16, ProtocolError> {
    line.get(..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| ProtocolError::MalformedReply(line.to_string()))
}

/// Port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply.
pub(crate) fn parse_pasv_port(text: &str) -> Result<u16, ProtocolError> {
    let malformed = || ProtocolError::MalformedReply(format!("PASV reply '{}'", text));

    let start = text.find('(').ok_or_else(malformed)?;
    let end = text[start..].find(')').ok_or_else(malformed)? + start;
    let numbers = text[start + 1..end]
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;

    match numbers.as_slice() {
        [_, _, _, _, high, low] => Ok((u16::from(*high) << 8) | u16::from(*low)),
        _ => Err(malformed()),
    }
}
