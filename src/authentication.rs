//! Provides SASL authentication mechanisms

use std::fmt::{self, Debug, Display, Formatter, Write as _};

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::error::{self, Error};

/// Mechanism preference order used when none is configured
pub const DEFAULT_MECHANISMS: &[Mechanism] = &[
    Mechanism::CramMd5,
    Mechanism::Login,
    Mechanism::Plain,
    Mechanism::Xoauth2,
];

/// Contains user credentials
///
/// The `Debug` rendering is redacted so credentials cannot leak into logs or
/// error dumps; the identity and secret are only reachable through the read
/// accessors.
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    /// Create a `Credentials` struct from username and password
    pub fn new<S: Into<String>, T: Into<String>>(username: S, password: T) -> Credentials {
        Credentials {
            authentication_identity: username.into(),
            secret: password.into(),
        }
    }

    /// The authentication identity (username)
    pub fn username(&self) -> &str {
        &self.authentication_identity
    }

    /// The secret (password or token)
    pub fn password(&self) -> &str {
        &self.secret
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("authentication_identity", &"<hidden>")
            .field("secret", &"<hidden>")
            .finish()
    }
}

/// Represents authentication mechanisms
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Mechanism {
    /// PLAIN authentication mechanism
    /// RFC 4616: https://tools.ietf.org/html/rfc4616
    Plain,
    /// LOGIN authentication mechanism
    /// Obsolete but needed for some providers (like office365)
    /// https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt
    Login,
    /// CRAM-MD5 authentication mechanism
    /// RFC 2195: https://tools.ietf.org/html/rfc2195
    CramMd5,
    /// Non-standard XOAUTH2 mechanism
    /// https://developers.google.com/gmail/imap/xoauth2-protocol
    Xoauth2,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::Xoauth2 => "XOAUTH2",
        })
    }
}

impl Mechanism {
    /// Does the mechanism support an initial response carried on the AUTH
    /// command line
    pub fn supports_initial_response(&self) -> bool {
        match *self {
            Mechanism::Plain | Mechanism::Xoauth2 => true,
            Mechanism::Login | Mechanism::CramMd5 => false,
        }
    }
}

/// Returns a PLAIN mechanism response
pub(crate) fn plain_response(credentials: &Credentials) -> String {
    format!(
        "\u{0}{}\u{0}{}",
        credentials.authentication_identity, credentials.secret
    )
}

/// Returns an XOAUTH2 mechanism response
pub(crate) fn xoauth2_response(credentials: &Credentials) -> String {
    format!(
        "user={}\u{1}auth=Bearer {}\u{1}\u{1}",
        credentials.authentication_identity, credentials.secret
    )
}

/// Returns a CRAM-MD5 mechanism response for a base64-encoded challenge
pub(crate) fn cram_md5_response(
    credentials: &Credentials,
    encoded_challenge: &str,
) -> Result<String, Error> {
    let challenge = crate::base64::decode(encoded_challenge).map_err(error::response)?;

    let mut hmac = Hmac::<Md5>::new_from_slice(credentials.secret.as_bytes())
        .map_err(error::client)?;
    hmac.update(&challenge);
    let digest = hmac.finalize().into_bytes();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }

    Ok(format!("{} {}", credentials.authentication_identity, hex))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new("alice", "wonderland");
        let rendered = format!("{credentials:?}");

        assert!(!rendered.contains("alice"));
        assert!(!rendered.contains("wonderland"));
        assert_eq!(credentials.username(), "alice");
        assert_eq!(credentials.password(), "wonderland");
    }

    #[test]
    fn test_mechanism_fmt() {
        assert_eq!(Mechanism::Plain.to_string(), "PLAIN");
        assert_eq!(Mechanism::Login.to_string(), "LOGIN");
        assert_eq!(Mechanism::CramMd5.to_string(), "CRAM-MD5");
        assert_eq!(Mechanism::Xoauth2.to_string(), "XOAUTH2");
    }

    #[test]
    fn test_plain() {
        let credentials = Credentials::new("username", "password");
        assert_eq!(plain_response(&credentials), "\u{0}username\u{0}password");
        assert_eq!(
            crate::base64::encode(plain_response(&credentials)),
            "AHVzZXJuYW1lAHBhc3N3b3Jk"
        );
    }

    #[test]
    fn test_xoauth2() {
        let credentials = Credentials::new(
            "username",
            "vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg==",
        );
        assert_eq!(
            xoauth2_response(&credentials),
            "user=username\u{1}auth=Bearer vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg==\u{1}\u{1}"
        );
    }

    #[test]
    fn test_cram_md5() {
        let credentials = Credentials::new("alice", "wonderland");
        let response = cram_md5_response(
            &credentials,
            "PDE3ODkzLjEzMjA2NzkxMjNAdGVzc2VyYWN0LnN1c2FtLmluPg==",
        )
        .unwrap();

        assert_eq!(response, "alice 64b2a43c1f6ed6806a980914e23e75f0");
        assert_eq!(
            crate::base64::encode(&response),
            "YWxpY2UgNjRiMmE0M2MxZjZlZDY4MDZhOTgwOTE0ZTIzZTc1ZjA="
        );
    }

    #[test]
    fn test_cram_md5_rejects_bad_challenge() {
        let credentials = Credentials::new("alice", "wonderland");
        assert!(cram_md5_response(&credentials, "not base64!").is_err());
    }
}
