//! SMTP session: connection state machine, command layer and authentication
//!
//! An [`SmtpSession`] owns one transport connection and drives it through
//! the greeting, EHLO/HELO negotiation, an optional STARTTLS upgrade and
//! authentication, then exposes the submission verbs. Commands are
//! serialized: every call writes one command and blocks until its reply is
//! parsed, so there is never more than one command in flight.

use std::{
    fmt::Display,
    io::{BufRead, BufReader, Read, Write},
    thread,
    time::Duration,
};

pub mod mock;
mod net;
mod tls;

pub use self::{
    net::{Connector, NetworkStream, Timeout},
    tls::{Certificate, Tls, TlsParameters, TlsParametersBuilder},
};

use crate::{
    authentication::{self, Credentials, Mechanism, DEFAULT_MECHANISMS},
    commands::{
        Auth, AuthResponse, Data, DataEnd, Ehlo, Expn, Helo, Help, Mail, Noop, Quit, Rcpt, Rset,
        Starttls, Vrfy,
    },
    error::{self, Error},
    extension::{ClientId, ServerInfo},
    response::{parse_reply, Response},
    escape_crlf, DEFAULT_TIMEOUT, GREYLIST_DELAY, SMTP_PORT, SUBMISSIONS_PORT, SUBMISSION_PORT,
};

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport; the session must be connected before use
    #[default]
    NotConnected,
    /// The transport is being opened and the greeting awaited
    Connecting,
    /// The greeting was accepted; commands may be issued
    Connected,
}

#[derive(Debug, Clone)]
struct SessionConfig {
    host: String,
    port: Option<u16>,
    timeout: Duration,
    hello_name: ClientId,
    tls: Tls,
    credentials: Option<Credentials>,
    authentication: Vec<Mechanism>,
}

/// Contains session configuration
///
/// Created by [`SmtpSession::builder`].
#[derive(Debug, Clone)]
pub struct SmtpSessionBuilder {
    config: SessionConfig,
}

impl SmtpSessionBuilder {
    /// Set the port to use
    ///
    /// Defaults to 25, or 465 with implicit TLS, or 587 with STARTTLS.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Set the inactivity timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the name used during HELO or EHLO
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.config.hello_name = name;
        self
    }

    /// Set the TLS settings to use
    pub fn tls(mut self, tls: Tls) -> Self {
        self.config.tls = tls;
        self
    }

    /// Set the client credentials
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Set the authentication mechanism preference order
    pub fn authentication(mut self, mechanisms: Vec<Mechanism>) -> Self {
        self.config.authentication = mechanisms;
        self
    }

    /// Builds the session
    ///
    /// It does not connect to the server, but only creates the
    /// `SmtpSession`. Fails if a password is configured without a user.
    pub fn build(self) -> Result<SmtpSession, Error> {
        self.build_with::<NetworkStream>()
    }

    /// Builds the session over a custom stream type
    pub fn build_with<S: Read + Write>(self) -> Result<SmtpSession<S>, Error> {
        if let Some(ref credentials) = self.config.credentials {
            if credentials.username().is_empty() && !credentials.password().is_empty() {
                return Err(error::client("password configured without a user"));
            }
        }

        Ok(SmtpSession {
            stream: None,
            state: SessionState::NotConnected,
            server_info: None,
            logged_in: self.config.credentials.is_none(),
            config: self.config,
        })
    }
}

/// Structure that implements the SMTP session
pub struct SmtpSession<S: Read + Write = NetworkStream> {
    /// Transport between client and session, with its buffered read half
    /// acting as the response monitor. Value is `None` before connection
    stream: Option<BufReader<S>>,
    state: SessionState,
    /// Features advertised by the server; `None` before a successful EHLO
    server_info: Option<ServerInfo>,
    logged_in: bool,
    config: SessionConfig,
}

impl SmtpSession {
    /// Creates a builder for a session to the given host
    pub fn builder<T: Into<String>>(host: T) -> SmtpSessionBuilder {
        SmtpSessionBuilder {
            config: SessionConfig {
                host: host.into(),
                port: None,
                timeout: DEFAULT_TIMEOUT,
                hello_name: ClientId::default(),
                tls: Tls::None,
                credentials: None,
                authentication: DEFAULT_MECHANISMS.to_vec(),
            },
        }
    }

    /// Creates a builder for a session to a local mail daemon on port 25
    pub fn localhost() -> SmtpSessionBuilder {
        SmtpSession::builder("localhost")
    }
}

impl<S: Connector + Timeout + Read + Write> SmtpSession<S> {
    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when no credentials are configured or authentication succeeded
    pub fn authorized(&self) -> bool {
        self.logged_in
    }

    /// Information advertised by the server in its EHLO reply
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Checks if the server advertised an ESMTP keyword
    pub fn supports_extension(&self, keyword: &str) -> bool {
        self.server_info
            .as_ref()
            .map_or(false, |info| info.supports_feature(keyword))
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream
            .as_ref()
            .map_or(false, |stream| stream.get_ref().is_encrypted())
    }

    fn effective_port(&self) -> u16 {
        self.config.port.unwrap_or(match self.config.tls {
            Tls::Wrapper(_) => SUBMISSIONS_PORT,
            Tls::Required(_) | Tls::Opportunistic(_) => SUBMISSION_PORT,
            Tls::None => SMTP_PORT,
        })
    }

    /// Opens the transport and waits for the `220` greeting
    ///
    /// A session that is already connected is closed with `QUIT` first.
    pub fn connect(&mut self) -> Result<Response, Error> {
        if self.state == SessionState::Connected {
            self.quit()?;
        }
        self.state = SessionState::Connecting;

        let wrapper = match self.config.tls {
            Tls::Wrapper(ref parameters) => Some(parameters),
            _ => None,
        };

        let port = self.effective_port();
        let stream = match S::connect(
            self.config.host.trim(),
            port,
            Some(self.config.timeout),
            wrapper,
        ) {
            Ok(stream) => stream,
            Err(err) => {
                self.state = SessionState::NotConnected;
                return Err(err);
            }
        };
        tracing::debug!("connected to {}:{}", self.config.host.trim(), port);

        self.greet(stream)
    }

    /// Drives the greeting over an already established stream
    ///
    /// Useful when the connection comes from elsewhere (a proxy, a test
    /// double); the rest of the session behaves exactly as after
    /// [`connect`](Self::connect).
    pub fn connect_with(&mut self, stream: S) -> Result<Response, Error> {
        if self.state == SessionState::Connected {
            self.quit()?;
        }
        self.state = SessionState::Connecting;
        self.greet(stream)
    }

    fn greet(&mut self, mut stream: S) -> Result<Response, Error> {
        let timeout = Some(self.config.timeout);
        if let Err(err) = stream
            .set_read_timeout(timeout)
            .and_then(|()| stream.set_write_timeout(timeout))
        {
            self.state = SessionState::NotConnected;
            return Err(error::network(err));
        }
        self.stream = Some(BufReader::new(stream));

        let greeting = match self.read_response() {
            Ok(response) => response,
            Err(err) => {
                self.close(true);
                return Err(err);
            }
        };

        if !greeting.has_code(220) {
            let _ = self.write(Quit.to_string().as_bytes());
            self.close(false);
            return Err(error::response(format!("unexpected greeting: {greeting}")));
        }

        self.state = SessionState::Connected;
        Ok(greeting)
    }

    /// Closes the session
    ///
    /// Stops the monitor, drops the transport and resets the negotiated
    /// state. Idempotent. A forced close skips the orderly shutdown.
    pub fn close(&mut self, force: bool) {
        if let Some(stream) = self.stream.take() {
            let mut stream = stream.into_inner();
            let _ = stream.shutdown(force);
        }
        self.state = SessionState::NotConnected;
        self.server_info = None;
        self.logged_in = self.config.credentials.is_none();
    }

    /// Sends `QUIT` and closes the session
    pub fn quit(&mut self) -> Result<Response, Error> {
        let response = self.command(Quit, &[221, 250]);
        self.close(false);
        response
    }

    /// Sends a command without classifying the reply
    pub fn send<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.send_line(&command.to_string(), false)
    }

    /// Sends a command and checks the reply against the accepted codes
    ///
    /// A `450`/`451` reply mentioning greylisting is retried once after
    /// [`GREYLIST_DELAY`](crate::GREYLIST_DELAY); any other unexpected code
    /// fails with a response error.
    pub fn command<C: Display>(&mut self, command: C, expected: &[u16]) -> Result<Response, Error> {
        self.command_line(&command.to_string(), expected, false)
    }

    fn command_redacted(&mut self, line: &str, expected: &[u16]) -> Result<Response, Error> {
        self.command_line(line, expected, true)
    }

    fn command_line(
        &mut self,
        line: &str,
        expected: &[u16],
        sensitive: bool,
    ) -> Result<Response, Error> {
        let mut retried = false;
        loop {
            let response = self.send_line(line, sensitive)?;

            if expected.iter().any(|&code| response.has_code(code)) {
                return Ok(response);
            }

            if !retried && is_greylisted(&response) {
                tracing::debug!("greylisted, resending after {:?}", GREYLIST_DELAY);
                thread::sleep(GREYLIST_DELAY);
                retried = true;
                continue;
            }

            let verb = line.split_whitespace().next().unwrap_or(line);
            return Err(error::response(format!(
                "bad response on command '{}': {}",
                verb,
                response.message()
            )));
        }
    }

    fn send_line(&mut self, line: &str, sensitive: bool) -> Result<Response, Error> {
        if self.state != SessionState::Connected {
            self.close(true);
            return Err(error::no_connection());
        }

        self.write(line.as_bytes())?;
        if sensitive {
            tracing::debug!("Wrote: <credentials hidden>");
        } else {
            tracing::debug!("Wrote: {}", escape_crlf(line));
        }

        self.read_response()
    }

    /// Writes raw bytes to the transport
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.as_mut().ok_or_else(error::no_connection)?;

        let result = stream
            .get_mut()
            .write_all(bytes)
            .and_then(|()| stream.get_mut().flush());

        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = classify_io(err);
                self.close(true);
                Err(err)
            }
        }
    }

    /// Reads one complete reply from the transport
    ///
    /// Accumulates lines until the streaming parser produces a reply.
    /// Timeouts, transport errors and malformed replies force the session
    /// closed and surface through the same return channel.
    fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        loop {
            let stream = self.stream.as_mut().ok_or_else(error::no_connection)?;
            let read = match stream.read_line(&mut buffer) {
                Ok(read) => read,
                Err(err) => {
                    let err = classify_io(err);
                    self.close(true);
                    return Err(err);
                }
            };
            if read == 0 {
                self.close(true);
                return Err(error::network("connection closed before a complete reply"));
            }
            tracing::debug!("<< {}", escape_crlf(&buffer));

            match parse_reply(&buffer) {
                Ok((_remaining, response)) => return Ok(response),
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
                    let message = err.to_string();
                    self.close(true);
                    return Err(error::response(message));
                }
            }
        }
    }

    /// Sends EHLO and parses the advertised features
    ///
    /// When STARTTLS is configured and the stream is still plaintext, the
    /// transport is upgraded and EHLO is sent again on the encrypted
    /// stream.
    pub fn ehlo(&mut self) -> Result<(), Error> {
        self.server_info = Some(ServerInfo::default());
        let response = self.command(Ehlo::new(self.config.hello_name.clone()), &[250])?;
        let info = ServerInfo::from_response(&response)?;
        tracing::debug!("server {info}");
        self.server_info = Some(info);

        let wants_upgrade = match self.config.tls {
            Tls::Required(_) => true,
            Tls::Opportunistic(_) => self.supports_extension("starttls"),
            _ => false,
        };
        if wants_upgrade && !self.is_encrypted() {
            self.starttls()?;
        }

        Ok(())
    }

    /// Sends the legacy HELO greeting
    pub fn helo(&mut self) -> Result<Response, Error> {
        self.command(Helo::new(self.config.hello_name.clone()), &[250])
    }

    /// Negotiates features unless already negotiated, falling back from
    /// EHLO to HELO
    pub fn ehlo_or_helo_if_needed(&mut self) -> Result<(), Error> {
        if self.server_info.is_some() {
            return Ok(());
        }

        match self.ehlo() {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!("EHLO failed ({err}), falling back to HELO");
                self.helo().map(|_| ())
            }
        }
    }

    /// Upgrades the transport to TLS with STARTTLS and renegotiates
    /// features on the encrypted stream
    pub fn starttls(&mut self) -> Result<(), Error> {
        let parameters = match self.config.tls {
            Tls::Opportunistic(ref parameters)
            | Tls::Required(ref parameters)
            | Tls::Wrapper(ref parameters) => parameters.clone(),
            Tls::None => return Err(error::client("no TLS parameters configured")),
        };

        self.command(Starttls, &[220])
            .map_err(|err| err.during("while establishing a starttls session"))?;

        let mut stream = match self.stream.take() {
            Some(stream) => stream.into_inner(),
            None => return Err(error::no_connection()),
        };
        if let Err(err) = stream.upgrade_tls(&parameters) {
            self.close(true);
            return Err(err.during("while establishing a starttls session"));
        }
        self.stream = Some(BufReader::new(stream));
        tracing::debug!("connection encrypted");

        // Renegotiate on the encrypted stream
        self.ehlo()
    }

    /// Sends a MAIL command
    pub fn mail(&mut self, from: &str) -> Result<Response, Error> {
        self.command(Mail::new(from), &[250])
    }

    /// Sends an RCPT command
    pub fn rcpt(&mut self, to: &str) -> Result<Response, Error> {
        self.command(Rcpt::new(to), &[250, 251])
    }

    /// Sends a DATA command
    pub fn data(&mut self) -> Result<Response, Error> {
        self.command(Data, &[354])
    }

    /// Sends the end-of-data terminator after the body has been streamed
    pub fn data_end(&mut self) -> Result<Response, Error> {
        self.command(DataEnd, &[250])
    }

    /// Streams message content during the DATA phase
    ///
    /// This is a raw transport write: body lines are not replies, so the
    /// command/response pipeline is bypassed. The caller is responsible for
    /// dot-stuffing and calls [`data_end`](Self::data_end) to terminate.
    pub fn message(&mut self, message: &[u8]) -> Result<(), Error> {
        if self.state != SessionState::Connected {
            self.close(true);
            return Err(error::no_connection());
        }
        self.write(message)?;
        tracing::debug!("Wrote {} bytes of message data", message.len());
        Ok(())
    }

    /// Sends a NOOP command, reporting the reply as-is
    pub fn noop(&mut self) -> Result<Response, Error> {
        self.send(Noop)
    }

    /// Checks if the server still answers, using the NOOP command
    pub fn test_connected(&mut self) -> bool {
        self.noop().map(|r| r.is_positive()).unwrap_or(false)
    }

    /// Sends a HELP command
    pub fn help(&mut self, argument: Option<&str>) -> Result<Response, Error> {
        self.command(Help::new(argument.map(Into::into)), &[211, 214])
    }

    /// Sends a VRFY command
    pub fn vrfy(&mut self, address: &str) -> Result<Response, Error> {
        self.command(Vrfy::new(address), &[250, 251, 252])
    }

    /// Sends an EXPN command
    pub fn expn(&mut self, address: &str) -> Result<Response, Error> {
        self.command(Expn::new(address), &[250])
    }

    /// Sends an RSET command
    pub fn rset(&mut self) -> Result<Response, Error> {
        self.command(Rset, &[250])
    }

    /// Authenticates with the configured credentials
    ///
    /// Ensures features are negotiated, picks the first preferred mechanism
    /// the server offers and runs its exchange. A session without
    /// configured credentials is already authorized and this is a no-op.
    pub fn login(&mut self) -> Result<(), Error> {
        let credentials = match self.config.credentials.clone() {
            Some(credentials) => credentials,
            None => return Ok(()),
        };
        self.login_with(&credentials, None)
    }

    /// Authenticates with explicit credentials, optionally forcing the
    /// mechanism
    pub fn login_with(
        &mut self,
        credentials: &Credentials,
        mechanism: Option<Mechanism>,
    ) -> Result<(), Error> {
        self.ehlo_or_helo_if_needed()?;

        let mechanism = match mechanism {
            Some(mechanism) => mechanism,
            None => self
                .server_info
                .as_ref()
                .and_then(|info| info.get_auth_mechanism(&self.config.authentication))
                .ok_or_else(error::auth_not_supported)?,
        };
        tracing::debug!("authenticating with {mechanism}");

        match self.auth_exchange(mechanism, credentials) {
            Ok(_response) => {
                self.logged_in = true;
                Ok(())
            }
            Err(err) => {
                self.logged_in = false;
                self.close(false);
                Err(error::auth(err))
            }
        }
    }

    fn auth_exchange(
        &mut self,
        mechanism: Mechanism,
        credentials: &Credentials,
    ) -> Result<Response, Error> {
        match mechanism {
            Mechanism::Plain => {
                let command =
                    Auth::initial(mechanism, authentication::plain_response(credentials));
                self.command_redacted(&command.to_string(), &[235, 503])
            }
            Mechanism::Xoauth2 => {
                let command =
                    Auth::initial(mechanism, authentication::xoauth2_response(credentials));
                self.command_redacted(&command.to_string(), &[235, 503])
            }
            Mechanism::Login => {
                self.command(Auth::start(mechanism), &[334])?;
                let username = AuthResponse::new(credentials.username()).to_string();
                self.command_redacted(&username, &[334])?;
                let password = AuthResponse::new(credentials.password()).to_string();
                self.command_redacted(&password, &[235, 503])
            }
            Mechanism::CramMd5 => {
                let challenge = self.command(Auth::start(mechanism), &[334])?;
                let encoded_challenge = challenge
                    .first_word()
                    .map(str::to_owned)
                    .ok_or_else(|| error::response("could not read auth challenge"))?;
                let payload = authentication::cram_md5_response(credentials, &encoded_challenge)?;
                self.command_redacted(&AuthResponse::new(payload).to_string(), &[235, 503])
            }
        }
    }
}

fn is_greylisted(response: &Response) -> bool {
    matches!(response.code(), 450 | 451)
        && response.message().to_ascii_lowercase().contains("greylist")
}

fn classify_io(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => error::timeout(err),
        _ => error::network(err),
    }
}
