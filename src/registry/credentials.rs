//! Registry logins read from a Docker-style `config.json`

use crate::{image::Registry, registry::DefaultRegistry};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

/// A username and password for one registry
#[derive(Clone, Eq, PartialEq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

#[derive(Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: String,
}

/// Read-only view of a credential file on disk
///
/// The file is read again on every lookup, never cached, so an operator can
/// remount or rewrite it while we run. A missing or unreadable file, or a
/// host without an entry, just means no credentials.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
    defaults: DefaultRegistry,
}

impl CredentialStore {
    /// Use the credential file at this exact path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CredentialStore {
            path: path.into(),
            defaults: DefaultRegistry::new(),
        }
    }

    /// Use `config.json` inside a Docker configuration directory
    pub fn from_config_dir(dir: &Path) -> Self {
        CredentialStore::new(dir.join("config.json"))
    }

    /// Look up the login for a registry host
    pub fn credentials_for(&self, registry: &Registry) -> Option<Credential> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) => {
                log::trace!("no credential file at {:?}: {}", self.path, err);
                return None;
            }
        };
        let config: ConfigFile = match serde_json::from_slice(&data) {
            Ok(config) => config,
            Err(err) => {
                log::debug!("ignoring unparseable credential file {:?}: {}", self.path, err);
                return None;
            }
        };

        for key in self.lookup_keys(registry) {
            if let Some(entry) = config.auths.get(&key) {
                if let Some(credential) = decode_auth(&entry.auth) {
                    log::debug!("using credentials for {} from key {:?}", registry, key);
                    return Some(credential);
                }
            }
        }
        None
    }

    /// Every key a login for this host may have been stored under
    fn lookup_keys(&self, registry: &Registry) -> Vec<String> {
        let mut keys = key_variants(registry.as_str());
        if self.defaults.is_default_host(registry) {
            for alias in &self.defaults.also_known_as {
                keys.extend(key_variants(alias.as_str()));
            }
        }
        keys
    }
}

fn key_variants(host: &str) -> Vec<String> {
    vec![
        host.to_owned(),
        format!("https://{}", host),
        format!("https://{}/v1/", host),
        format!("https://{}/v2/", host),
    ]
}

fn decode_auth(blob: &str) -> Option<Credential> {
    if blob.is_empty() {
        return None;
    }
    let decoded = STANDARD.decode(blob.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let mut parts = decoded.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some(username), Some(password)) => Some(Credential {
            username: username.to_owned(),
            password: password.to_owned(),
        }),
        _ => None,
    }
}
