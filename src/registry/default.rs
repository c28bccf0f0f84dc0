//! Settings for compatibility with the default registry server

use crate::image::Registry;

/// Additional settings for compatibility with a default registry server
///
/// If you don't need the additional options, you can convert a plain [Registry]
/// [Into] a [DefaultRegistry]
#[derive(Clone, Debug)]
pub struct DefaultRegistry {
    /// Connect to the registry under this name
    pub network_name: Registry,
    /// This registry is also known under additional names
    pub also_known_as: Vec<Registry>,
    /// Use this prefix when accessing an image repository with only a single
    /// path component
    pub library_prefix: Option<String>,
}

impl From<Registry> for DefaultRegistry {
    fn from(network_name: Registry) -> Self {
        DefaultRegistry {
            network_name,
            also_known_as: vec![],
            library_prefix: None,
        }
    }
}

impl Default for DefaultRegistry {
    fn default() -> Self {
        DefaultRegistry::new()
    }
}

impl DefaultRegistry {
    /// Return the built-in defaults
    pub fn new() -> Self {
        DefaultRegistry {
            network_name: Registry::parse("registry-1.docker.io"),
            also_known_as: vec![Registry::parse("docker.io"), Registry::parse("index.docker.io")],
            library_prefix: Some("library".to_owned()),
        }
    }

    /// Check whether a particular registry is considered default under these
    /// settings
    ///
    /// Returns true if the given registry is None or if it matches either the
    /// `network_name` or any of the `also_known_as` settings here.
    pub fn is_default(&self, registry: &Option<Registry>) -> bool {
        match registry {
            None => true,
            Some(registry) => self.is_default_host(registry),
        }
    }

    /// Check whether a normalized host names this default registry
    pub fn is_default_host(&self, registry: &Registry) -> bool {
        registry == &self.network_name || self.also_known_as.contains(registry)
    }

    /// Repository names a local engine may have recorded for a repository on
    /// this registry, besides the fully qualified one
    ///
    /// The engine's own short form uses the first alias (`docker.io`), and
    /// library images are also stored under their bare short name.
    pub fn local_repository_aliases(&self, repository: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .also_known_as
            .iter()
            .map(|alias| format!("{}/{}", alias, repository))
            .collect();
        names.push(repository.to_owned());
        if let Some(prefix) = &self.library_prefix {
            if let Some(short) = repository.strip_prefix(prefix.as_str()) {
                if let Some(short) = short.strip_prefix('/') {
                    names.push(short.to_owned());
                }
            }
        }
        names
    }
}
