//! The container engine operations the updater relies on
//!
//! Everything here is a thin request to the engine. The [Engine] trait is the
//! seam between update logic and the engine, with [DockerEngine] talking to a
//! real Docker daemon.

mod docker;
mod snapshot;

pub use docker::DockerEngine;
pub use snapshot::{read_running, short_id, ContainerSnapshot};

use crate::{errors::EngineError, registry::Credential};
use async_trait::async_trait;
use bollard::{
    container::Config,
    models::{ContainerInspectResponse, ContainerSummary, EndpointSettings},
};
use std::time::Duration;

/// What the engine knows about a local image
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub repo_digests: Vec<String>,
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// List running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError>;

    /// Full configuration, mounts and network attachments of one container
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, EngineError>;

    /// Look up a local image by id or reference
    async fn inspect_image(&self, name: &str) -> Result<ImageRecord, EngineError>;

    /// Pull `name:tag`, returning once the pull has completed
    async fn pull_image(
        &self,
        name: &str,
        tag: &str,
        login: Option<&Credential>,
    ) -> Result<(), EngineError>;

    async fn remove_image(&self, id: &str) -> Result<(), EngineError>;

    /// Ask a container to stop, killing it after the grace period
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError>;

    /// Remove a container, killing it first if it is still running
    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    /// Create a container under a name, returning its id
    async fn create_container(&self, name: &str, config: Config<String>)
        -> Result<String, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), EngineError>;

    /// Attach a created container to one more network
    async fn connect_network(
        &self,
        network: &str,
        container_id: &str,
        endpoint: EndpointSettings,
    ) -> Result<(), EngineError>;
}
