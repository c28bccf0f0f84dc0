#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use bollard::{
    container::Config,
    models::{
        ContainerConfig, ContainerInspectResponse, ContainerSummary, EndpointSettings, HostConfig,
        MountPoint, MountPointTypeEnum, NetworkSettings,
    },
};
use isengard::{
    engine::{Engine, ImageRecord},
    errors::EngineError,
    registry::Credential,
};
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serve a mock registry on a local port, returning the port
///
/// The router is built once the port is known, so challenge realms can
/// point back at the same server.
pub async fn serve<F>(make_router: F) -> u16
where
    F: FnOnce(u16) -> Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let router = make_router(port);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

/// Every request the updater made of the engine, in order
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    List,
    InspectContainer(String),
    InspectImage(String),
    Pull(String),
    RemoveImage(String),
    Stop(String),
    Remove(String),
    Create(String),
    Start(String),
    Rename { id: String, name: String },
    Connect { network: String, id: String },
}

#[derive(Clone, Debug)]
pub struct FakeImage {
    pub id: String,
    pub names: Vec<String>,
    pub repo_digests: Vec<String>,
}

#[derive(Clone, Debug)]
struct FakeContainer {
    inspect: ContainerInspectResponse,
    listed_image: Option<String>,
    running: bool,
}

#[derive(Default)]
struct State {
    containers: Vec<FakeContainer>,
    images: Vec<FakeImage>,
    calls: Vec<Call>,
    created: Vec<(String, Config<String>)>,
    pull_results: HashMap<String, FakeImage>,
    failing: HashSet<&'static str>,
    next_id: u32,
}

/// In-memory engine that keeps just enough state to recreate containers
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<State>,
}

/// Builder for a container inspection as the engine would report it
#[derive(Clone, Debug)]
pub struct ContainerSpec {
    inspect: ContainerInspectResponse,
    listed_image: Option<String>,
}

impl ContainerSpec {
    pub fn new(id: &str, name: &str, image: &str, image_id: &str) -> Self {
        ContainerSpec {
            inspect: ContainerInspectResponse {
                id: Some(id.to_owned()),
                name: Some(format!("/{}", name)),
                image: Some(image_id.to_owned()),
                config: Some(ContainerConfig {
                    image: Some(image.to_owned()),
                    labels: Some(HashMap::new()),
                    ..Default::default()
                }),
                host_config: Some(HostConfig::default()),
                network_settings: Some(NetworkSettings {
                    networks: Some(HashMap::new()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            listed_image: None,
        }
    }

    /// Have listings show this instead of the configured image, the way
    /// engines show a bare image id once the tag has moved
    pub fn listed_as(mut self, image: &str) -> Self {
        self.listed_image = Some(image.to_owned());
        self
    }

    fn config(&mut self) -> &mut ContainerConfig {
        self.inspect.config.as_mut().unwrap()
    }

    fn host_config(&mut self) -> &mut HostConfig {
        self.inspect.host_config.as_mut().unwrap()
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.config()
            .labels
            .get_or_insert_with(HashMap::new)
            .insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn env(mut self, var: &str) -> Self {
        self.config()
            .env
            .get_or_insert_with(Vec::new)
            .push(var.to_owned());
        self
    }

    /// Image `VOLUME` declaration
    pub fn volume(mut self, path: &str) -> Self {
        self.config()
            .volumes
            .get_or_insert_with(HashMap::new)
            .insert(path.to_owned(), HashMap::new());
        self
    }

    /// `-v source:target` style bind, which also shows up as a mount point
    pub fn bind(mut self, source: &str, target: &str) -> Self {
        self.host_config()
            .binds
            .get_or_insert_with(Vec::new)
            .push(format!("{}:{}", source, target));
        self.inspect
            .mounts
            .get_or_insert_with(Vec::new)
            .push(MountPoint {
                typ: Some(MountPointTypeEnum::BIND),
                source: Some(source.to_owned()),
                destination: Some(target.to_owned()),
                rw: Some(true),
                ..Default::default()
            });
        self
    }

    pub fn network_mode(mut self, mode: &str) -> Self {
        self.host_config().network_mode = Some(mode.to_owned());
        self
    }

    pub fn network(mut self, name: &str, aliases: &[&str]) -> Self {
        let endpoint = EndpointSettings {
            aliases: Some(aliases.iter().map(|s| s.to_string()).collect()),
            network_id: Some(format!("{}-id", name)),
            ..Default::default()
        };
        self.inspect
            .network_settings
            .as_mut()
            .unwrap()
            .networks
            .get_or_insert_with(HashMap::new)
            .insert(name.to_owned(), endpoint);
        self
    }
}

impl FakeImage {
    pub fn new(id: &str, names: &[&str], repo_digests: &[&str]) -> Self {
        FakeImage {
            id: id.to_owned(),
            names: names.iter().map(|s| s.to_string()).collect(),
            repo_digests: repo_digests.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        FakeEngine::default()
    }

    pub fn add_running(&self, spec: ContainerSpec) {
        self.state.lock().unwrap().containers.push(FakeContainer {
            inspect: spec.inspect,
            listed_image: spec.listed_image,
            running: true,
        });
    }

    pub fn add_image(&self, image: FakeImage) {
        self.state.lock().unwrap().images.push(image);
    }

    /// Pulling `name:tag` makes this image the one the reference resolves to
    pub fn on_pull(&self, reference: &str, image: FakeImage) {
        self.state
            .lock()
            .unwrap()
            .pull_results
            .insert(reference.to_owned(), image);
    }

    /// Make every call of one kind fail: "stop", "create", "start", "pull",
    /// "connect", "rename", "remove"
    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change something, leaving out lookups
    pub fn changes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    Call::List | Call::InspectContainer(_) | Call::InspectImage(_)
                )
            })
            .collect()
    }

    pub fn created(&self) -> Vec<(String, Config<String>)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn container_named(&self, name: &str) -> Option<ContainerInspectResponse> {
        let slashed = format!("/{}", name);
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.inspect.name.as_deref() == Some(slashed.as_str()))
            .map(|c| c.inspect.clone())
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .any(|c| c.running && c.inspect.id.as_deref() == Some(id))
    }

    fn record(&self, call: Call, op: &'static str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(op) {
            Err(EngineError::Rejected(format!("{} failed on purpose", op)))
        } else {
            Ok(())
        }
    }
}

fn not_found(what: &str) -> EngineError {
    EngineError::Rejected(format!("no such {}", what))
}

#[async_trait]
impl Engine for FakeEngine {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError> {
        self.record(Call::List, "list")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| {
                let config = c.inspect.config.clone().unwrap_or_default();
                ContainerSummary {
                    id: c.inspect.id.clone(),
                    names: c.inspect.name.clone().map(|name| vec![name]),
                    image: c.listed_image.clone().or(config.image),
                    image_id: c.inspect.image.clone(),
                    labels: config.labels,
                    state: Some("running".to_owned()),
                    ..Default::default()
                }
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, EngineError> {
        self.record(Call::InspectContainer(id.to_owned()), "inspect")?;
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .find(|c| c.inspect.id.as_deref() == Some(id))
            .map(|c| c.inspect.clone())
            .ok_or_else(|| not_found("container"))
    }

    async fn inspect_image(&self, name: &str) -> Result<ImageRecord, EngineError> {
        self.record(Call::InspectImage(name.to_owned()), "inspect_image")?;
        let state = self.state.lock().unwrap();
        state
            .images
            .iter()
            .rev()
            .find(|image| image.id == name || image.names.iter().any(|n| n == name))
            .map(|image| ImageRecord {
                id: image.id.clone(),
                repo_digests: image.repo_digests.clone(),
            })
            .ok_or_else(|| not_found("image"))
    }

    async fn pull_image(
        &self,
        name: &str,
        tag: &str,
        _login: Option<&Credential>,
    ) -> Result<(), EngineError> {
        let reference = format!("{}:{}", name, tag);
        self.record(Call::Pull(reference.clone()), "pull")?;
        let mut state = self.state.lock().unwrap();
        if let Some(image) = state.pull_results.get(&reference).cloned() {
            for existing in state.images.iter_mut() {
                existing.names.retain(|n| n != &reference);
            }
            state.images.push(image);
        }
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> Result<(), EngineError> {
        self.record(Call::RemoveImage(id.to_owned()), "remove_image")?;
        let mut state = self.state.lock().unwrap();
        state.images.retain(|image| image.id != id);
        Ok(())
    }

    async fn stop_container(&self, id: &str, _grace: Duration) -> Result<(), EngineError> {
        self.record(Call::Stop(id.to_owned()), "stop")?;
        let mut state = self.state.lock().unwrap();
        for c in state.containers.iter_mut() {
            if c.inspect.id.as_deref() == Some(id) {
                c.running = false;
            }
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(Call::Remove(id.to_owned()), "remove")?;
        let mut state = self.state.lock().unwrap();
        let before = state.containers.len();
        state
            .containers
            .retain(|c| c.inspect.id.as_deref() != Some(id));
        if state.containers.len() == before {
            return Err(not_found("container"));
        }
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<String, EngineError> {
        self.record(Call::Create(name.to_owned()), "create")?;
        let mut state = self.state.lock().unwrap();
        let slashed = format!("/{}", name);
        if state
            .containers
            .iter()
            .any(|c| c.inspect.name.as_deref() == Some(slashed.as_str()))
        {
            return Err(EngineError::Rejected(format!("name {} in use", name)));
        }

        state.next_id += 1;
        let id = format!("{:064x}", 0xfeed_0000u64 + state.next_id as u64);
        let image = config.image.clone().unwrap_or_default();
        let image_id = state
            .images
            .iter()
            .rev()
            .find(|i| i.names.contains(&image))
            .map(|i| i.id.clone())
            .unwrap_or_default();
        let networks = config
            .networking_config
            .clone()
            .map(|networking| networking.endpoints_config)
            .unwrap_or_default();

        state.created.push((name.to_owned(), config.clone()));
        state.containers.push(FakeContainer {
            inspect: ContainerInspectResponse {
                id: Some(id.clone()),
                name: Some(slashed),
                image: Some(image_id),
                config: Some(ContainerConfig {
                    image: config.image,
                    labels: config.labels,
                    env: config.env,
                    volumes: config.volumes,
                    ..Default::default()
                }),
                host_config: config.host_config,
                network_settings: Some(NetworkSettings {
                    networks: Some(networks),
                    ..Default::default()
                }),
                ..Default::default()
            },
            listed_image: None,
            running: false,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(Call::Start(id.to_owned()), "start")?;
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.inspect.id.as_deref() == Some(id))
            .ok_or_else(|| not_found("container"))?;
        container.running = true;
        Ok(())
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), EngineError> {
        self.record(
            Call::Rename {
                id: id.to_owned(),
                name: new_name.to_owned(),
            },
            "rename",
        )?;
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.inspect.id.as_deref() == Some(id))
            .ok_or_else(|| not_found("container"))?;
        container.inspect.name = Some(format!("/{}", new_name));
        Ok(())
    }

    async fn connect_network(
        &self,
        network: &str,
        container_id: &str,
        endpoint: EndpointSettings,
    ) -> Result<(), EngineError> {
        self.record(
            Call::Connect {
                network: network.to_owned(),
                id: container_id.to_owned(),
            },
            "connect",
        )?;
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.inspect.id.as_deref() == Some(container_id))
            .ok_or_else(|| not_found("container"))?;
        container
            .inspect
            .network_settings
            .get_or_insert_with(Default::default)
            .networks
            .get_or_insert_with(HashMap::new)
            .insert(network.to_owned(), endpoint);
        Ok(())
    }
}
