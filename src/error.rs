//! Error and result type for SMTP sessions

use std::{error::Error as StdError, fmt};

use crate::BoxError;

// Inspired by https://github.com/seanmonstar/reqwest/blob/a8566383168c0ef06c21f38cbc9213af6ff6db31/src/error.rs

/// The errors that may occur while driving an SMTP session
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    context: Option<&'static str>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                context: None,
            }),
        }
    }

    /// Appends context to the rendered error, keeping kind and source
    pub(crate) fn during(mut self, context: &'static str) -> Error {
        self.inner.context = Some(context);
        self
    }

    /// Returns true if the error occurred while opening the connection
    pub fn is_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::Connection)
    }

    /// Returns true if the error comes from TLS setup or peer verification
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if the error is a malformed or unexpected server reply
    pub fn is_response(&self) -> bool {
        matches!(self.inner.kind, Kind::Response)
    }

    /// Returns true if an operation was attempted without a connection
    pub fn is_no_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::NoConnection)
    }

    /// Returns true if no offered AUTH mechanism matched the preference list
    pub fn is_auth_not_supported(&self) -> bool {
        matches!(self.inner.kind, Kind::AuthNotSupported)
    }

    /// Returns true if the authentication exchange failed
    pub fn is_auth_failed(&self) -> bool {
        matches!(self.inner.kind, Kind::AuthFailed)
    }

    /// Returns true if the inactivity timer elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    /// Returns true if the error is an underlying network I/O fault
    pub fn is_network(&self) -> bool {
        matches!(self.inner.kind, Kind::Network)
    }

    /// Returns true if the error is an internal client error
    pub fn is_client(&self) -> bool {
        matches!(self.inner.kind, Kind::Client)
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Transport-level failure opening the socket
    Connection,
    /// TLS setup failed or the peer certificate did not verify
    Tls,
    /// Malformed reply or unexpected status code
    Response,
    /// Operation attempted while not connected
    NoConnection,
    /// No offered AUTH mechanism matches the preference list
    AuthNotSupported,
    /// The authentication exchange returned a non-success status
    AuthFailed,
    /// Inactivity timer elapsed
    Timeout,
    /// Underlying network I/O error
    Network,
    /// Internal client error
    Client,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("smtp_session::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Connection => f.write_str("could not connect")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Response => f.write_str("response error")?,
            Kind::NoConnection => f.write_str("no connection")?,
            Kind::AuthNotSupported => f.write_str("authentication mechanism not supported")?,
            Kind::AuthFailed => f.write_str("authentication failed")?,
            Kind::Timeout => f.write_str("connection timed out")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Client => f.write_str("internal client error")?,
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        if let Some(context) = self.inner.context {
            write!(f, " {context}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn std::error::Error + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

pub(crate) fn response<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Response, Some(e))
}

pub(crate) fn no_connection() -> Error {
    Error::new(Kind::NoConnection, None::<BoxError>)
}

pub(crate) fn auth_not_supported() -> Error {
    Error::new(Kind::AuthNotSupported, None::<BoxError>)
}

pub(crate) fn auth<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::AuthFailed, Some(e))
}

pub(crate) fn timeout<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Timeout, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}

pub(crate) fn client<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Client, Some(e))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(no_connection().is_no_connection());
        assert!(auth_not_supported().is_auth_not_supported());
        assert!(response("bad").is_response());
        assert!(timeout("slow").is_timeout());
        assert!(!response("bad").is_timeout());
    }

    #[test]
    fn test_display_includes_source() {
        let err = response("missing status code");
        assert_eq!(err.to_string(), "response error: missing status code");
        assert_eq!(no_connection().to_string(), "no connection");
    }
}
