//! TLS configuration for SMTP sessions

use std::fmt::{self, Debug};

use native_tls::{Protocol, TlsConnector};
pub use native_tls::Certificate;

use crate::error::{self, Error};

/// How to apply TLS to the connection
#[derive(Clone, Default)]
#[allow(missing_copy_implementations)]
pub enum Tls {
    /// Plaintext connection only
    #[default]
    None,
    /// Start plaintext and upgrade with `STARTTLS` when the server
    /// advertises it
    Opportunistic(TlsParameters),
    /// Start plaintext and require a `STARTTLS` upgrade
    Required(TlsParameters),
    /// TLS from the first byte (implicit TLS, submissions port)
    Wrapper(TlsParameters),
}

impl Debug for Tls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::None => f.pad("None"),
            Self::Opportunistic(_) => f.pad("Opportunistic"),
            Self::Required(_) => f.pad("Required"),
            Self::Wrapper(_) => f.pad("Wrapper"),
        }
    }
}

/// Parameters to use for secure clients
#[derive(Clone)]
pub struct TlsParameters {
    connector: TlsConnector,
    /// The domain name expected in the TLS certificate from the server
    domain: String,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .finish()
    }
}

impl TlsParameters {
    /// Creates a new `TlsParameters` using the default trust store
    pub fn new<S: Into<String>>(domain: S) -> Result<TlsParameters, Error> {
        TlsParameters::builder(domain).build()
    }

    /// Creates a new builder for `TlsParameters`
    pub fn builder<S: Into<String>>(domain: S) -> TlsParametersBuilder {
        TlsParametersBuilder {
            domain: domain.into(),
            root_certs: Vec::new(),
            accept_invalid_hostnames: false,
            accept_invalid_certs: false,
        }
    }

    /// The domain name expected in the server certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn connector(&self) -> &TlsConnector {
        &self.connector
    }
}

/// Builder for `TlsParameters`
pub struct TlsParametersBuilder {
    domain: String,
    root_certs: Vec<Certificate>,
    accept_invalid_hostnames: bool,
    accept_invalid_certs: bool,
}

impl Debug for TlsParametersBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParametersBuilder")
            .field("domain", &self.domain)
            .field("root_certs", &self.root_certs.len())
            .field("accept_invalid_hostnames", &self.accept_invalid_hostnames)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl TlsParametersBuilder {
    /// Adds a trusted root certificate
    ///
    /// The peer certificate must chain to one of the configured roots (or
    /// the default store) or the handshake fails verification.
    pub fn add_root_certificate(mut self, certificate: Certificate) -> Self {
        self.root_certs.push(certificate);
        self
    }

    /// Controls whether certificates with an invalid hostname are accepted
    ///
    /// Defaults to `false`. Disables hostname verification if set to `true`,
    /// which introduces a significant vulnerability to man-in-the-middle
    /// attacks.
    pub fn dangerous_accept_invalid_hostnames(mut self, accept: bool) -> Self {
        self.accept_invalid_hostnames = accept;
        self
    }

    /// Controls whether invalid certificates are accepted
    ///
    /// Defaults to `false`. Disables certificate verification if set to
    /// `true`, which introduces a significant vulnerability to
    /// man-in-the-middle attacks.
    pub fn dangerous_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Builds the `TlsParameters`
    pub fn build(self) -> Result<TlsParameters, Error> {
        let mut builder = TlsConnector::builder();
        builder.min_protocol_version(Some(Protocol::Tlsv12));
        builder.danger_accept_invalid_hostnames(self.accept_invalid_hostnames);
        builder.danger_accept_invalid_certs(self.accept_invalid_certs);
        for certificate in self.root_certs {
            builder.add_root_certificate(certificate);
        }

        let connector = builder.build().map_err(error::tls)?;
        Ok(TlsParameters {
            connector,
            domain: self.domain,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tls_debug_hides_parameters() {
        let parameters = TlsParameters::new("mail.example.com").unwrap();
        assert_eq!(format!("{:?}", Tls::Required(parameters)), "Required");
        assert_eq!(format!("{:?}", Tls::None), "None");
    }

    #[test]
    fn test_parameters_expose_domain() {
        let parameters = TlsParameters::new("mail.example.com").unwrap();
        assert_eq!(parameters.domain(), "mail.example.com");
    }
}
