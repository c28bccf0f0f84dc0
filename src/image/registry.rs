use std::{
    cmp::{Ord, Ordering, PartialOrd},
    convert::Infallible,
    fmt,
    hash::{Hash, Hasher},
    ops::Range,
    str,
    str::FromStr,
};

/// Host name of a Docker-style image registry server
///
/// This is a domain name, with an optional port. Typically the protocol is
/// https, but we include the same heuristic Docker uses to improve the
/// ergonomics of development setups: if a domain has no dots in it, the
/// protocol switches to unencrypted http.
///
/// Parsing never fails. Whatever string an image reference carried in its
/// host position is kept as-is, and a malformed host surfaces later as a
/// network error.
#[derive(Clone)]
pub struct Registry {
    serialized: String,
    domain_pos: Range<usize>,
}

impl Registry {
    /// Returns a reference to the existing string representation of a
    /// [Registry]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Parse a [prim@str] as a [Registry]
    ///
    /// A trailing `:<digits>` is taken as the port. Anything else after a
    /// colon stays part of the domain.
    pub fn parse(s: &str) -> Self {
        let domain_pos = match s.rfind(':') {
            Some(colon) if s[colon + 1..].parse::<u16>().is_ok() => 0..colon,
            _ => 0..s.len(),
        };
        Registry {
            serialized: s.to_owned(),
            domain_pos,
        }
    }

    /// Returns a reference to the domain portion of the string
    pub fn domain_str(&self) -> &str {
        &self.serialized[self.domain_pos.clone()]
    }

    /// Are we using https to connect to the registry?
    ///
    /// Hosts without a dot in their domain, like `localhost`, are plain http.
    pub fn is_https(&self) -> bool {
        self.domain_str().contains('.')
    }

    /// The protocol to use, either "http" or "https"
    pub fn protocol_str(&self) -> &str {
        if self.is_https() {
            "https"
        } else {
            "http"
        }
    }

    /// Base URL of the registry's v2 API, without a trailing slash
    pub fn api_base(&self) -> String {
        format!("{}://{}/v2", self.protocol_str(), self.serialized)
    }
}

impl Eq for Registry {}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.serialized.eq(&other.serialized)
    }
}

impl PartialEq<str> for Registry {
    fn eq(&self, other: &str) -> bool {
        self.serialized == other
    }
}

impl FromStr for Registry {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Registry::parse(s))
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Hash for Registry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serialized.hash(state);
    }
}

impl Ord for Registry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serialized.cmp(&other.serialized)
    }
}

impl PartialOrd for Registry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
