//! Error types you might see while checking or updating containers

use thiserror::Error;

/// Errors while resolving a remote digest from a registry server
///
/// None of these are fatal for a container. Any of them sends the update
/// check down the pull-and-compare path instead.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// network request error
    #[error("network request error: {0}")]
    NetworkRequest(#[from] reqwest::Error),

    /// json error
    #[error("json error: {0}")]
    JSON(#[from] serde_json::Error),

    /// registry answered with a success status but no content digest header
    #[error("registry answered {status} without a Docker-Content-Digest header")]
    MissingDigest { status: u16 },

    /// registry answered the manifest request with an unexpected status
    #[error("unexpected status {0} from manifest request")]
    UnexpectedStatus(u16),

    /// authenticated retry of the manifest request was still refused
    #[error("authenticated manifest request returned {0}")]
    AuthenticatedStatus(u16),

    /// registry asked for authentication without saying how
    #[error("authentication required but no WWW-Authenticate challenge was given")]
    MissingChallenge,

    /// registry server requested an unsupported type of authentication
    #[error("registry server requested an unsupported type of authentication: {0:?}")]
    UnsupportedAuthentication(String),

    /// bearer challenge has no realm to request a token from
    #[error("no realm in authentication challenge: {0:?}")]
    MissingRealm(String),

    /// bearer challenge realm is not a usable URL
    #[error("invalid realm in authentication challenge: {0:?}")]
    InvalidRealm(String),

    /// token endpoint refused the exchange
    #[error("token endpoint returned {0}")]
    TokenStatus(u16),

    /// token endpoint answered without a token
    #[error("empty token in token endpoint response")]
    EmptyToken,
}

/// Errors from the container engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// docker engine API error
    #[error("docker engine error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// engine response was missing a field we depend on
    #[error("engine response is missing {0}")]
    MissingField(&'static str),

    /// engine rejected the request
    #[error("engine rejected request: {0}")]
    Rejected(String),
}

/// Errors while recreating a container against a new image
///
/// Each variant names the step that failed. Failing to stop gracefully or to
/// reattach a secondary network is only logged, so neither appears here.
#[derive(Error, Debug)]
pub enum RecreateError {
    /// could not read the container's configuration
    #[error("inspecting container {id}: {source}")]
    Inspect { id: String, source: EngineError },

    /// container's configuration is not usable for a replacement
    #[error("container {id} has no recorded configuration")]
    NoConfig { id: String },

    /// could not remove the old container
    #[error("removing container {name}: {source}")]
    Remove { name: String, source: EngineError },

    /// could not move the running container out of the way
    #[error("renaming container {name} to {temp_name}: {source}")]
    Rename {
        name: String,
        temp_name: String,
        source: EngineError,
    },

    /// could not create the replacement
    #[error("creating container {name}: {source}")]
    Create { name: String, source: EngineError },

    /// replacement was created but did not start
    #[error("starting container {name}: {source}")]
    Start { name: String, source: EngineError },

    /// replacement is running but removing our own container did not end
    /// this process
    #[error("still running after handing over to replacement {new_id}")]
    SurvivedSelfRemoval { new_id: String },

    /// asynchronous self-update task failed
    #[error("self-update task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Errors from an update cycle
#[derive(Error, Debug)]
pub enum UpdateError {
    /// could not enumerate containers, the whole cycle is abandoned
    #[error("listing containers: {0}")]
    ListContainers(#[source] EngineError),

    /// could not pull an image while checking a container
    #[error("pulling image {image}: {source}")]
    Pull { image: String, source: EngineError },

    /// pulled image could not be found afterwards
    #[error("inspecting pulled image {image}: {source}")]
    InspectImage { image: String, source: EngineError },

    /// container recreation failed
    #[error("recreating container: {0}")]
    Recreate(#[from] RecreateError),
}
