//! SMTP commands
//!
//! Each command knows its own wire form, including the trailing CRLF.

use std::fmt::{self, Display, Formatter};

use crate::{authentication::Mechanism, extension::ClientId};

/// HELO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Helo {
    client_id: ClientId,
}

impl Display for Helo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HELO {}\r\n", self.client_id)
    }
}

impl Helo {
    /// Creates a HELO command
    pub fn new(client_id: ClientId) -> Helo {
        Helo { client_id }
    }
}

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", self.client_id)
    }
}

impl Ehlo {
    /// Creates an EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// MAIL command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail {
    sender: String,
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>\r\n", self.sender)
    }
}

impl Mail {
    /// Creates a MAIL command
    pub fn new<S: Into<String>>(sender: S) -> Mail {
        Mail {
            sender: sender.into(),
        }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt {
    recipient: String,
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>\r\n", self.recipient)
    }
}

impl Rcpt {
    /// Creates an RCPT command
    pub fn new<S: Into<String>>(recipient: S) -> Rcpt {
        Rcpt {
            recipient: recipient.into(),
        }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// End-of-data terminator, sent after the message body has been streamed
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct DataEnd;

impl Display for DataEnd {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("\r\n.\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// NOOP command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Noop;

impl Display for Noop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("NOOP\r\n")
    }
}

/// HELP command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Help {
    argument: Option<String>,
}

impl Display for Help {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("HELP")?;
        if let Some(argument) = &self.argument {
            write!(f, " {argument}")?;
        }
        f.write_str("\r\n")
    }
}

impl Help {
    /// Creates a HELP command
    pub fn new(argument: Option<String>) -> Help {
        Help { argument }
    }
}

/// VRFY command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Vrfy {
    argument: String,
}

impl Display for Vrfy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "VRFY {}\r\n", self.argument)
    }
}

impl Vrfy {
    /// Creates a VRFY command
    pub fn new<S: Into<String>>(argument: S) -> Vrfy {
        Vrfy {
            argument: argument.into(),
        }
    }
}

/// EXPN command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Expn {
    argument: String,
}

impl Display for Expn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EXPN {}\r\n", self.argument)
    }
}

impl Expn {
    /// Creates an EXPN command
    pub fn new<S: Into<String>>(argument: S) -> Expn {
        Expn {
            argument: argument.into(),
        }
    }
}

/// RSET command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Rset;

impl Display for Rset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("RSET\r\n")
    }
}

/// AUTH command
///
/// Carries the mechanism name and, for mechanisms with an initial response,
/// the raw payload. The payload is base64-encoded when rendered.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Auth {
    mechanism: Mechanism,
    response: Option<String>,
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.response {
            Some(ref response) => write!(
                f,
                "AUTH {} {}\r\n",
                self.mechanism,
                crate::base64::encode(response)
            ),
            None => write!(f, "AUTH {}\r\n", self.mechanism),
        }
    }
}

impl Auth {
    /// Creates an AUTH command carrying an initial response
    pub fn initial(mechanism: Mechanism, response: String) -> Auth {
        Auth {
            mechanism,
            response: Some(response),
        }
    }

    /// Creates an AUTH command that starts a challenge exchange
    pub fn start(mechanism: Mechanism) -> Auth {
        Auth {
            mechanism,
            response: None,
        }
    }
}

/// A reply to a server challenge during an AUTH exchange
///
/// The raw payload is base64-encoded when rendered.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct AuthResponse {
    response: String,
}

impl Display for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", crate::base64::encode(&self.response))
    }
}

impl AuthResponse {
    /// Creates a challenge reply from a raw payload
    pub fn new<S: Into<String>>(response: S) -> AuthResponse {
        AuthResponse {
            response: response.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::authentication::{plain_response, Credentials};

    #[test]
    fn test_display() {
        let id = ClientId::Domain("localhost".to_owned());
        assert_eq!(Helo::new(id.clone()).to_string(), "HELO localhost\r\n");
        assert_eq!(Ehlo::new(id).to_string(), "EHLO localhost\r\n");
        assert_eq!(format!("{Starttls}"), "STARTTLS\r\n");
        assert_eq!(
            Mail::new("test@example.com").to_string(),
            "MAIL FROM:<test@example.com>\r\n"
        );
        assert_eq!(Mail::new("").to_string(), "MAIL FROM:<>\r\n");
        assert_eq!(
            Rcpt::new("test@example.com").to_string(),
            "RCPT TO:<test@example.com>\r\n"
        );
        assert_eq!(format!("{Data}"), "DATA\r\n");
        assert_eq!(format!("{DataEnd}"), "\r\n.\r\n");
        assert_eq!(format!("{Quit}"), "QUIT\r\n");
        assert_eq!(format!("{Noop}"), "NOOP\r\n");
        assert_eq!(Help::new(None).to_string(), "HELP\r\n");
        assert_eq!(
            Help::new(Some("test".to_owned())).to_string(),
            "HELP test\r\n"
        );
        assert_eq!(Vrfy::new("test").to_string(), "VRFY test\r\n");
        assert_eq!(Expn::new("test").to_string(), "EXPN test\r\n");
        assert_eq!(format!("{Rset}"), "RSET\r\n");
    }

    #[test]
    fn test_auth_display() {
        let credentials = Credentials::new("user", "password");
        assert_eq!(
            Auth::initial(Mechanism::Plain, plain_response(&credentials)).to_string(),
            "AUTH PLAIN AHVzZXIAcGFzc3dvcmQ=\r\n"
        );
        assert_eq!(
            Auth::start(Mechanism::Login).to_string(),
            "AUTH LOGIN\r\n"
        );
        assert_eq!(
            Auth::start(Mechanism::CramMd5).to_string(),
            "AUTH CRAM-MD5\r\n"
        );
        assert_eq!(AuthResponse::new("pooh").to_string(), "cG9vaA==\r\n");
    }
}
