//! `smtp-session` is a client-side SMTP protocol engine. It manages a single
//! connection to a mail submission or transfer agent and provides:
//!
//! * The connection state machine (greeting, EHLO/HELO, STARTTLS, AUTH)
//! * A multi-line reply parser with an inactivity timeout
//! * The SMTP command verbs needed to submit a message
//! * PLAIN, LOGIN, CRAM-MD5 and XOAUTH2 authentication with greylist-aware
//!   retry
//!
//! Message construction, envelope handling and submission orchestration are
//! left to the layer above: this crate speaks the wire protocol and nothing
//! else.
//!
//! # Example
//!
//! ```no_run
//! use smtp_session::{Credentials, SmtpSession};
//!
//! # fn main() -> Result<(), smtp_session::Error> {
//! let mut session = SmtpSession::builder("mail.example.com")
//!     .credentials(Credentials::new("pooh", "honey"))
//!     .build()?;
//!
//! session.connect()?;
//! session.login()?;
//! session.mail("pooh@example.com")?;
//! session.rcpt("owl@example.com")?;
//! session.data()?;
//! session.message(b"Subject: hunny\r\n\r\nI was wondering...\r\n")?;
//! session.data_end()?;
//! session.quit()?;
//! # Ok(())
//! # }
//! ```

#![deny(
    missing_docs,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unsafe_code
)]

use std::time::Duration;

mod base64;
pub mod authentication;
pub mod commands;
pub mod error;
pub mod extension;
pub mod response;
pub mod session;

pub use crate::{
    authentication::{Credentials, Mechanism},
    error::Error,
    extension::{ClientId, Feature, ServerInfo},
    response::Response,
    session::{SessionState, SmtpSession, SmtpSessionBuilder, Tls, TlsParameters},
};

/// Type alias for boxed source errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Registered port numbers:
// https://www.iana.org/assignments/service-names-port-numbers/service-names-port-numbers.xhtml

/// Default SMTP port
pub const SMTP_PORT: u16 = 25;

/// Default submission over TLS port
pub const SUBMISSIONS_PORT: u16 = 465;

/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;

/// The line ending for SMTP transactions (carriage return + line feed)
pub const CRLF: &str = "\r\n";

/// The ending of message content
pub const MESSAGE_ENDING: &str = "\r\n.\r\n";

/// How long to wait before resending a command a greylisting server
/// temporarily rejected
pub const GREYLIST_DELAY: Duration = Duration::from_millis(300);

/// Default inactivity timeout on a monitored connection
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Returns the string replacing all the CRLF with "\<CRLF\>"
#[inline]
pub(crate) fn escape_crlf(string: &str) -> String {
    string.replace(CRLF, "<CR><LF>")
}

#[cfg(test)]
mod test {
    use super::escape_crlf;

    #[test]
    fn test_escape_crlf() {
        assert_eq!(escape_crlf("\r\n"), "<CR><LF>");
        assert_eq!(escape_crlf("EHLO my_name\r\n"), "EHLO my_name<CR><LF>");
        assert_eq!(
            escape_crlf("EHLO my_name\r\nSIZE 42\r\n"),
            "EHLO my_name<CR><LF>SIZE 42<CR><LF>"
        );
    }
}
