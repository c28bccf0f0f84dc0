use std::{cmp::Ord, fmt, hash::Hash};

/// Either an image tag or a content digest
///
/// An [crate::image::ImageReference] always has a tag, possibly the implied
/// `latest`, and an optional content digest. When a digest is present it
/// wins: the engine resolves the image by digest and ignores the tag, so the
/// reference can never move to a newer image.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ImageVersion {
    Tag(String),
    ContentDigest(String),
}

impl ImageVersion {
    /// Returns a reference to the existing string representation of an
    /// [ImageVersion]
    pub fn as_str(&self) -> &str {
        match self {
            ImageVersion::Tag(tag) => tag,
            ImageVersion::ContentDigest(content_digest) => content_digest,
        }
    }

    /// Is this version a content digest?
    pub fn is_content_digest(&self) -> bool {
        match self {
            ImageVersion::Tag(_) => false,
            ImageVersion::ContentDigest(_) => true,
        }
    }

    /// Is this version a mutable tag?
    pub fn is_tag(&self) -> bool {
        !self.is_content_digest()
    }
}

impl fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for ImageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
