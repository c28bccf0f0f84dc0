//! Image references and the records an engine keeps about pulled images


mod reference;
mod registry;
mod repo_digest;
mod version;

pub use reference::ImageReference;
pub use registry::Registry;
pub use repo_digest::RepoDigest;
pub use version::ImageVersion;
