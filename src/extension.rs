//! ESMTP features advertised in the EHLO reply

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    net::{Ipv4Addr, Ipv6Addr},
    result::Result,
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    authentication::Mechanism,
    error::{self, Error},
    response::Response,
};

/// Client identifier, the parameter to `EHLO`
#[derive(PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum ClientId {
    /// A fully-qualified domain name
    Domain(String),
    /// An IPv4 address
    Ipv4(Ipv4Addr),
    /// An IPv6 address
    Ipv6(Ipv6Addr),
}

const LOCALHOST_CLIENT: ClientId = ClientId::Ipv4(Ipv4Addr::new(127, 0, 0, 1));

impl Default for ClientId {
    fn default() -> Self {
        // https://tools.ietf.org/html/rfc5321#section-4.1.4
        //
        // The SMTP client MUST, if possible, ensure that the domain parameter
        // to the EHLO command is a primary host name as specified for this
        // command in Section 2.3.5.  If this is not possible (e.g., when the
        // client's address is dynamically assigned and the client does not have
        // an obvious name), an address literal SHOULD be substituted for the
        // domain name.
        hostname::get()
            .ok()
            .and_then(|s| s.into_string().map(Self::Domain).ok())
            .unwrap_or(LOCALHOST_CLIENT)
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Domain(ref value) => f.write_str(value),
            Self::Ipv4(ref value) => write!(f, "[{value}]"),
            Self::Ipv6(ref value) => write!(f, "[IPv6:{value}]"),
        }
    }
}

/// A single advertised ESMTP keyword value
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Feature {
    /// The keyword was advertised without parameters
    Present,
    /// The keyword was advertised with parameter text
    Params(String),
}

impl Feature {
    /// Parameter text, if the keyword carried any
    pub fn params(&self) -> Option<&str> {
        match *self {
            Feature::Present => None,
            Feature::Params(ref params) => Some(params),
        }
    }
}

/// One advertisement line: an optional status-code prefix (kept for raw
/// old-style `250=KEYWORD` lines), the keyword, optional parameter text.
static FEATURE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[-=])?\s*(\S+)(?:\s+(.*))?$").expect("valid feature regex"));

/// Contains information about an SMTP server, as advertised in its EHLO
/// reply
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ServerInfo {
    /// The name given in the EHLO greeting line
    name: String,
    /// Advertised ESMTP keywords, lowercased
    features: HashMap<String, Feature>,
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            write!(f, "{} with no supported features", self.name)
        } else {
            let mut keywords: Vec<&str> = self.features.keys().map(String::as_str).collect();
            keywords.sort_unstable();
            write!(f, "{} with {}", self.name, keywords.join(", "))
        }
    }
}

impl ServerInfo {
    /// Parses an EHLO reply to create a `ServerInfo`
    ///
    /// The first line names the server; every following line is stored as a
    /// feature entry. Lines that do not look like an advertisement are
    /// ignored.
    pub fn from_response(response: &Response) -> Result<ServerInfo, Error> {
        let name = match response.first_word() {
            Some(name) => name,
            None => return Err(error::response("Could not read server name")),
        };

        let mut features: HashMap<String, Feature> = HashMap::new();

        for line in response.lines().skip(1) {
            let captures = match FEATURE_LINE.captures(line) {
                Some(captures) => captures,
                None => continue,
            };

            let keyword = captures[1].to_ascii_lowercase();
            let feature = match captures.get(2).map(|m| m.as_str().trim()) {
                Some(params) if !params.is_empty() => Feature::Params(params.to_owned()),
                _ => Feature::Present,
            };
            features.insert(keyword, feature);
        }

        Ok(ServerInfo {
            name: name.to_owned(),
            features,
        })
    }

    /// Checks if the server advertised an ESMTP keyword
    pub fn supports_feature(&self, keyword: &str) -> bool {
        self.features.contains_key(&keyword.to_ascii_lowercase())
    }

    /// The advertised value of an ESMTP keyword
    pub fn feature(&self, keyword: &str) -> Option<&Feature> {
        self.features.get(&keyword.to_ascii_lowercase())
    }

    /// Picks the first of `mechanisms` whose name occurs in the advertised
    /// `AUTH` parameter text
    pub fn get_auth_mechanism(&self, mechanisms: &[Mechanism]) -> Option<Mechanism> {
        let advertised = self.feature("auth")?.params()?.to_ascii_lowercase();

        mechanisms
            .iter()
            .find(|mechanism| advertised.contains(&mechanism.to_string().to_ascii_lowercase()))
            .copied()
    }

    /// The name given in the EHLO greeting line
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::Response;

    fn ehlo_response(lines: &[&str]) -> Response {
        Response::new(250, lines.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn test_clientid_fmt() {
        assert_eq!(ClientId::Domain("test".to_owned()).to_string(), "test");
        assert_eq!(LOCALHOST_CLIENT.to_string(), "[127.0.0.1]");
    }

    #[test]
    fn test_from_response() {
        let response = ehlo_response(&[
            "me hello there",
            "8BITMIME",
            "SIZE 42",
            "AUTH PLAIN CRAM-MD5",
        ]);
        let info = ServerInfo::from_response(&response).unwrap();

        assert_eq!(info.name(), "me");
        assert!(info.supports_feature("8bitmime"));
        assert!(info.supports_feature("8BITMIME"));
        assert_eq!(info.feature("size"), Some(&Feature::Params("42".to_owned())));
        assert_eq!(
            info.feature("auth"),
            Some(&Feature::Params("PLAIN CRAM-MD5".to_owned()))
        );
        assert!(!info.supports_feature("starttls"));
    }

    #[test]
    fn test_keywords_are_lowercased_and_params_trimmed() {
        let response = ehlo_response(&["me", "StArtTLS", "SIZE 35882577   "]);
        let info = ServerInfo::from_response(&response).unwrap();

        assert_eq!(info.feature("starttls"), Some(&Feature::Present));
        assert_eq!(
            info.feature("size"),
            Some(&Feature::Params("35882577".to_owned()))
        );
    }

    #[test]
    fn test_old_style_prefix_is_stripped() {
        let response = ehlo_response(&["me", "250=VRFY", "250-HELP"]);
        let info = ServerInfo::from_response(&response).unwrap();

        assert_eq!(info.feature("vrfy"), Some(&Feature::Present));
        assert_eq!(info.feature("help"), Some(&Feature::Present));
    }

    #[test]
    fn test_unparsable_lines_are_ignored() {
        let response = ehlo_response(&["me", "", "   ", "STARTTLS"]);
        let info = ServerInfo::from_response(&response).unwrap();

        assert!(info.supports_feature("starttls"));
        assert!(!info.supports_feature(""));
    }

    #[test]
    fn test_empty_response_has_no_name() {
        let response = Response::new(250, vec![]);
        assert!(ServerInfo::from_response(&response).is_err());
    }

    #[test]
    fn test_get_auth_mechanism_prefers_caller_order() {
        let response = ehlo_response(&["me", "AUTH PLAIN LOGIN CRAM-MD5"]);
        let info = ServerInfo::from_response(&response).unwrap();

        assert_eq!(
            info.get_auth_mechanism(&[
                Mechanism::CramMd5,
                Mechanism::Login,
                Mechanism::Plain,
                Mechanism::Xoauth2,
            ]),
            Some(Mechanism::CramMd5)
        );
        assert_eq!(
            info.get_auth_mechanism(&[Mechanism::Login, Mechanism::Plain]),
            Some(Mechanism::Login)
        );
        assert_eq!(info.get_auth_mechanism(&[Mechanism::Xoauth2]), None);
    }

    #[test]
    fn test_get_auth_mechanism_without_auth_feature() {
        let response = ehlo_response(&["me", "8BITMIME"]);
        let info = ServerInfo::from_response(&response).unwrap();

        assert_eq!(info.get_auth_mechanism(&[Mechanism::Plain]), None);
    }
}
