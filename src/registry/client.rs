//! Resolving remote manifest digests from a registry server

use crate::{
    errors::RegistryError,
    image::ImageReference,
    registry::{
        auth::{exchange_token, BearerChallenge},
        CredentialStore,
    },
};
use reqwest::{
    header::{self, HeaderValue},
    RequestBuilder, Response, StatusCode,
};
use std::{path::Path, time::Duration};

/// Manifest media types we accept when asking for a digest
///
/// The list and index types must be present, or multi-platform tags report
/// a per-platform digest the engine never recorded.
pub mod media_types {
    pub const MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

    pub const ALL: [&str; 4] = [MANIFEST, MANIFEST_LIST, OCI_MANIFEST, OCI_INDEX];
}

pub const DIGEST_HEADER: &str = "docker-content-digest";

/// Builder for configuring custom [RegistryClient] instances
#[derive(Debug)]
pub struct RegistryClientBuilder {
    req: reqwest::ClientBuilder,
    credentials: Option<CredentialStore>,
}

impl RegistryClientBuilder {
    /// Start constructing a custom registry client
    pub fn new() -> Self {
        let req = reqwest::Client::builder().user_agent(RegistryClient::default_user_agent());
        RegistryClientBuilder {
            req,
            credentials: None,
        }
    }

    /// Set a timeout for each network request
    ///
    /// This timeout applies from the beginning of a request until the last
    /// byte has been received. By default there is no timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.req = self.req.timeout(timeout);
        self
    }

    /// Set a timeout for only the initial connect phase of each network request
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.req = self.req.connect_timeout(timeout);
        self
    }

    /// Read registry logins from this credential store
    pub fn credentials(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Read registry logins from `config.json` in a Docker config directory
    pub fn docker_config_dir(self, dir: &Path) -> Self {
        self.credentials(CredentialStore::from_config_dir(dir))
    }

    /// Construct a RegistryClient using the parameters from this Builder
    pub fn build(self) -> Result<RegistryClient, RegistryError> {
        Ok(RegistryClient {
            req: self.req.build()?,
            credentials: self.credentials,
        })
    }
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        RegistryClientBuilder::new()
    }
}

/// Registry clients ask registry servers which manifest a tag points at
///
/// Each call is independent. Tokens are never kept between calls, so every
/// digest check that needs one goes through the challenge again.
#[derive(Clone, Debug)]
pub struct RegistryClient {
    req: reqwest::Client,
    credentials: Option<CredentialStore>,
}

impl RegistryClient {
    /// Construct a new registry client with default options
    pub fn new() -> Result<RegistryClient, RegistryError> {
        RegistryClient::builder().build()
    }

    /// Construct a registry client with custom options, via
    /// [RegistryClientBuilder]
    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    /// Return the default `User-Agent` that we use if no other is set
    pub fn default_user_agent() -> HeaderValue {
        static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        HeaderValue::from_static(USER_AGENT)
    }

    pub fn credential_store(&self) -> Option<&CredentialStore> {
        self.credentials.as_ref()
    }

    fn manifest_head(&self, reference: &ImageReference) -> RequestBuilder {
        self.req
            .head(reference.manifest_url())
            .header(header::ACCEPT, media_types::ALL.join(", "))
    }

    /// Resolve the digest of the manifest a reference's tag currently points
    /// at, without downloading it
    ///
    /// The first request carries Basic credentials when we know some for the
    /// registry. If the registry answers with a bearer challenge, one token
    /// is fetched and the request is retried once with it.
    pub async fn resolve_digest(&self, reference: &ImageReference) -> Result<String, RegistryError> {
        let login = self
            .credentials
            .as_ref()
            .and_then(|store| store.credentials_for(reference.registry()));

        log::debug!("{} checking remote digest at {}", reference, reference.manifest_url());
        let req = self.manifest_head(reference);
        let req = match &login {
            Some(login) => req.basic_auth(&login.username, Some(&login.password)),
            None => req,
        };
        let response = req.send().await?;

        match response.status() {
            status if status.is_success() => content_digest(&response),
            StatusCode::UNAUTHORIZED => {
                let challenge = response
                    .headers()
                    .get(header::WWW_AUTHENTICATE)
                    .and_then(|value| value.to_str().ok())
                    .ok_or(RegistryError::MissingChallenge)?;
                let challenge = BearerChallenge::parse(challenge)?;
                log::debug!("{} login challenge, {:?}", reference, challenge);

                let token = exchange_token(&self.req, &challenge, reference, login.as_ref()).await?;
                log::debug!("{} received token, retrying", reference);

                let response = self.manifest_head(reference).bearer_auth(token).send().await?;
                if !response.status().is_success() {
                    return Err(RegistryError::AuthenticatedStatus(
                        response.status().as_u16(),
                    ));
                }
                content_digest(&response)
            }
            status => Err(RegistryError::UnexpectedStatus(status.as_u16())),
        }
    }
}

fn content_digest(response: &Response) -> Result<String, RegistryError> {
    match response
        .headers()
        .get(DIGEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
    {
        Some(digest) if !digest.is_empty() => Ok(digest.to_owned()),
        _ => Err(RegistryError::MissingDigest {
            status: response.status().as_u16(),
        }),
    }
}
