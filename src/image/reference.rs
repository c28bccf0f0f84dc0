use crate::{
    image::{ImageVersion, Registry},
    registry::DefaultRegistry,
};
use std::{
    cmp::{Ordering, PartialOrd},
    convert::Infallible,
    fmt,
    hash::{Hash, Hasher},
    str,
    str::FromStr,
};

static LATEST_STR: &str = "latest";

/// Parsed Docker-style image reference
///
/// This is an owned struct representing a docker "reference" (like a URI)
/// which refers to an image at a specific version, resolved against a
/// registry server (possibly the configured default).
///
/// A complete reference contains a [Registry], a repository path, a tag and an
/// optional content digest, in that order. Only the repository is mandatory in
/// the input string; the rest is filled in:
///
/// - The tag follows the last `:` only if that colon comes after the last
///   `/`, so a registry port is never mistaken for a tag. Without one the tag
///   is `latest`.
/// - The first path section names a registry if it includes any dot (.) or
///   colon (:) characters, or is the special case `localhost`. Otherwise the
///   whole path is a repository on the default registry.
/// - A single-component repository on the default registry lives in the
///   `library` namespace, and the default registry's historical aliases are
///   normalized to one host.
///
/// Parsing never fails. Any string produces a best-effort reference, and
/// malformed input surfaces later as a registry or engine error.
#[derive(Clone)]
pub struct ImageReference {
    serialized: String,
    name: String,
    registry: Registry,
    repository: String,
    tag: String,
    digest: Option<String>,
}

impl ImageReference {
    /// Parse a [prim@str] as an [ImageReference] on the built-in default
    /// registry
    pub fn parse(s: &str) -> Self {
        ImageReference::parse_with(s, &DefaultRegistry::new())
    }

    /// Parse a [prim@str] as an [ImageReference], resolving unqualified names
    /// against a custom default registry
    pub fn parse_with(s: &str, defaults: &DefaultRegistry) -> Self {
        let (rest, digest) = match s.rfind('@') {
            Some(at) => (&s[..at], Some(&s[at + 1..])),
            None => (s, None),
        };

        let (name, tag) = match (rest.rfind('/'), rest.rfind(':')) {
            (Some(slash), Some(colon)) if colon > slash => (&rest[..colon], &rest[colon + 1..]),
            (None, Some(colon)) => (&rest[..colon], &rest[colon + 1..]),
            _ => (rest, LATEST_STR),
        };
        let tag = if tag.is_empty() { LATEST_STR } else { tag };

        let (registry, repository) = match name.find('/') {
            Some(slash) if is_registry_host(&name[..slash]) => {
                (Some(&name[..slash]), &name[slash + 1..])
            }
            _ => (None, name),
        };

        let registry = registry.map(Registry::parse);
        let (registry, repository) = if defaults.is_default(&registry) {
            let repository = match &defaults.library_prefix {
                Some(prefix) if !repository.contains('/') => format!("{}/{}", prefix, repository),
                _ => repository.to_owned(),
            };
            (defaults.network_name.clone(), repository)
        } else {
            (registry.unwrap_or_else(|| defaults.network_name.clone()), repository.to_owned())
        };

        ImageReference {
            serialized: s.to_owned(),
            name: name.to_owned(),
            registry,
            repository,
            tag: tag.to_owned(),
            digest: digest.filter(|d| !d.is_empty()).map(str::to_owned),
        }
    }

    /// Returns a reference to the original string this was parsed from
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Returns the name as written, without its tag or digest
    ///
    /// This is the form an engine expects when asked to pull the image, with
    /// the tag supplied separately.
    pub fn name_str(&self) -> &str {
        &self.name
    }

    /// Returns the normalized registry host
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the normalized repository path on the registry
    pub fn repository_str(&self) -> &str {
        &self.repository
    }

    /// Returns the tag, `latest` if none was given
    pub fn tag_str(&self) -> &str {
        &self.tag
    }

    /// Returns the content digest the reference was pinned to, if any
    pub fn content_digest_str(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Returns the most specific available version
    ///
    /// If the reference includes a digest, this returns the digest. Otherwise
    /// it returns the tag.
    pub fn version(&self) -> ImageVersion {
        match &self.digest {
            Some(digest) => ImageVersion::ContentDigest(digest.clone()),
            None => ImageVersion::Tag(self.tag.clone()),
        }
    }

    /// URL of the manifest this reference's tag points at
    pub fn manifest_url(&self) -> String {
        format!(
            "{}/{}/manifests/{}",
            self.registry.api_base(),
            self.repository,
            self.tag
        )
    }

    /// Token scope granting pull access to this reference's repository
    pub fn pull_scope(&self) -> String {
        format!("repository:{}:pull", self.repository)
    }
}

fn is_registry_host(section: &str) -> bool {
    section.contains('.') || section.contains(':') || section == "localhost"
}

impl Eq for ImageReference {}

impl PartialEq for ImageReference {
    fn eq(&self, other: &Self) -> bool {
        self.serialized.eq(&other.serialized)
    }
}

impl FromStr for ImageReference {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ImageReference::parse(s))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}",
            self.registry, self.repository, self.tag
        )?;
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl Hash for ImageReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serialized.hash(state);
    }
}

impl Ord for ImageReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serialized.cmp(&other.serialized)
    }
}

impl PartialOrd for ImageReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
