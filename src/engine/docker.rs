use crate::{
    engine::{Engine, ImageRecord},
    errors::EngineError,
    registry::Credential,
};
use async_trait::async_trait;
use bollard::{
    auth::DockerCredentials,
    container::{
        Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
        RemoveContainerOptions, RenameContainerOptions, StartContainerOptions,
        StopContainerOptions,
    },
    image::{CreateImageOptions, RemoveImageOptions},
    models::{ContainerInspectResponse, ContainerSummary, EndpointSettings},
    network::ConnectNetworkOptions,
    Docker,
};
use futures_util::StreamExt;
use std::time::Duration;

/// [Engine] backed by a Docker daemon
#[derive(Clone, Debug)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using `DOCKER_HOST`, or the platform's default socket
    pub fn connect() -> Result<Self, EngineError> {
        Ok(DockerEngine {
            docker: Docker::connect_with_local_defaults()?,
        })
    }

    /// Ask the daemon for its version, proving the connection works
    pub async fn server_version(&self) -> Result<String, EngineError> {
        let version = self.docker.version().await?;
        Ok(version.version.unwrap_or_default())
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        Ok(self.docker.list_containers(Some(options)).await?)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, EngineError> {
        Ok(self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?)
    }

    async fn inspect_image(&self, name: &str) -> Result<ImageRecord, EngineError> {
        let image = self.docker.inspect_image(name).await?;
        Ok(ImageRecord {
            id: image.id.ok_or(EngineError::MissingField("image id"))?,
            repo_digests: image.repo_digests.unwrap_or_default(),
        })
    }

    async fn pull_image(
        &self,
        name: &str,
        tag: &str,
        login: Option<&Credential>,
    ) -> Result<(), EngineError> {
        let options = CreateImageOptions {
            from_image: name.to_owned(),
            tag: tag.to_owned(),
            ..Default::default()
        };
        let credentials = login.map(|login| DockerCredentials {
            username: Some(login.username.clone()),
            password: Some(login.password.clone()),
            ..Default::default()
        });

        // The pull only completes once its progress stream is drained
        let mut progress = self.docker.create_image(Some(options), None, credentials);
        while let Some(info) = progress.next().await {
            let info = info?;
            if let Some(error) = info.error {
                return Err(EngineError::Rejected(error));
            }
            log::trace!("pull {}:{} {:?}", name, tag, info.status);
        }
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> Result<(), EngineError> {
        let options = RemoveImageOptions {
            noprune: false,
            ..Default::default()
        };
        self.docker.remove_image(id, Some(options), None).await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        Ok(self.docker.stop_container(id, Some(options)).await?)
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        Ok(self.docker.remove_container(id, Some(options)).await?)
    }

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<String, EngineError> {
        let options = CreateContainerOptions {
            name: name.to_owned(),
            platform: None,
        };
        let response = self.docker.create_container(Some(options), config).await?;
        for warning in &response.warnings {
            log::warn!("creating {}: {}", name, warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        Ok(self
            .docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?)
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), EngineError> {
        let options = RenameContainerOptions {
            name: new_name.to_owned(),
        };
        Ok(self.docker.rename_container(id, options).await?)
    }

    async fn connect_network(
        &self,
        network: &str,
        container_id: &str,
        endpoint: EndpointSettings,
    ) -> Result<(), EngineError> {
        let options = ConnectNetworkOptions {
            container: container_id.to_owned(),
            endpoint_config: endpoint,
        };
        Ok(self.docker.connect_network(network, options).await?)
    }
}
