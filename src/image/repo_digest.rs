use std::fmt;

/// One entry of an image's locally recorded repository digests
///
/// Engines keep these as `repository@digest` strings, where the repository
/// may be fully qualified (`docker.io/library/nginx`), a bare path
/// (`library/nginx`), or a short library name (`nginx`).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct RepoDigest {
    repository: String,
    digest: String,
}

impl RepoDigest {
    /// Split a `repository@digest` record, if it has that shape
    pub fn parse(s: &str) -> Option<Self> {
        let at = s.rfind('@')?;
        Some(RepoDigest {
            repository: s[..at].to_owned(),
            digest: s[at + 1..].to_owned(),
        })
    }

    pub fn repository_str(&self) -> &str {
        &self.repository
    }

    pub fn digest_str(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for RepoDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.digest)
    }
}

impl fmt::Debug for RepoDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
