use crate::errors::RecreateError;
use bollard::{
    container::{Config, NetworkingConfig},
    models::{
        ContainerConfig, ContainerInspectResponse, EndpointIpamConfig, EndpointSettings,
        HostConfig, Mount, MountPoint, MountPointTypeEnum, MountTypeEnum,
    },
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Working copy of a container's configuration, to be submitted as a
/// replacement running a different image
///
/// Built from a full inspection. Networks are ordered: the first one is
/// attached at creation time and the rest are connected one by one after.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecreationPlan {
    /// Container name without the engine's leading slash
    pub name: String,
    pub config: ContainerConfig,
    pub host_config: HostConfig,
    pub networks: Vec<(String, EndpointSettings)>,
}

impl RecreationPlan {
    /// Capture an inspected container's configuration with its image replaced
    ///
    /// When the host configuration lists no explicit mounts but the
    /// container reported mount points, those become explicit mounts. The
    /// returned plan already has duplicate targets resolved.
    pub fn from_inspect(
        inspect: ContainerInspectResponse,
        image: &str,
    ) -> Result<Self, RecreateError> {
        let id = inspect.id.clone().unwrap_or_default();
        let mut config = inspect.config.ok_or(RecreateError::NoConfig { id })?;
        config.image = Some(image.to_owned());

        let mut host_config = inspect.host_config.unwrap_or_default();
        let has_mounts = host_config
            .mounts
            .as_ref()
            .map(|mounts| !mounts.is_empty())
            .unwrap_or(false);
        if !has_mounts {
            if let Some(points) = inspect.mounts.as_ref().filter(|points| !points.is_empty()) {
                host_config.mounts = Some(mounts_from_points(points));
            }
        }

        let networks = inspect
            .network_settings
            .and_then(|settings| settings.networks)
            .unwrap_or_default();
        let networks = order_networks(host_config.network_mode.as_deref(), networks);

        let mut plan = RecreationPlan {
            name: inspect
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_owned(),
            config,
            host_config,
            networks,
        };
        plan.resolve_duplicate_targets();
        Ok(plan)
    }

    /// Remove declarations that would put two things at the same path
    ///
    /// Bind entries win over explicit mounts, and both win over image
    /// volume declarations. Running this again changes nothing.
    pub fn resolve_duplicate_targets(&mut self) {
        let bind_targets: HashSet<String> = self
            .host_config
            .binds
            .iter()
            .flatten()
            .filter_map(|bind| bind_target(bind))
            .map(str::to_owned)
            .collect();

        if let Some(mounts) = self.host_config.mounts.as_mut() {
            mounts.retain(|mount| match &mount.target {
                Some(target) => !bind_targets.contains(target),
                None => true,
            });
        }

        let mount_targets: HashSet<&str> = self
            .host_config
            .mounts
            .iter()
            .flatten()
            .filter_map(|mount| mount.target.as_deref())
            .collect();

        if let Some(volumes) = self.config.volumes.as_mut() {
            volumes.retain(|path, _| {
                !bind_targets.contains(path) && !mount_targets.contains(path.as_str())
            });
        }
    }

    pub fn image(&self) -> &str {
        self.config.image.as_deref().unwrap_or_default()
    }

    /// The network attached at creation time, if any
    pub fn primary_network(&self) -> Option<&(String, EndpointSettings)> {
        self.networks.first()
    }

    /// Networks to connect after creation, in order
    pub fn secondary_networks(&self) -> &[(String, EndpointSettings)] {
        self.networks.get(1..).unwrap_or_default()
    }

    /// The engine's create request for this plan
    pub fn create_config(&self) -> Config<String> {
        let config = self.config.clone();
        let networking_config = self.primary_network().map(|(name, endpoint)| {
            let mut endpoints_config = HashMap::new();
            endpoints_config.insert(name.clone(), endpoint.clone());
            NetworkingConfig { endpoints_config }
        });
        Config {
            hostname: config.hostname,
            domainname: config.domainname,
            user: config.user,
            attach_stdin: config.attach_stdin,
            attach_stdout: config.attach_stdout,
            attach_stderr: config.attach_stderr,
            exposed_ports: config.exposed_ports,
            tty: config.tty,
            open_stdin: config.open_stdin,
            stdin_once: config.stdin_once,
            env: config.env,
            cmd: config.cmd,
            healthcheck: config.healthcheck,
            args_escaped: config.args_escaped,
            image: config.image,
            volumes: config.volumes,
            working_dir: config.working_dir,
            entrypoint: config.entrypoint,
            network_disabled: config.network_disabled,
            mac_address: config.mac_address,
            on_build: config.on_build,
            labels: config.labels,
            stop_signal: config.stop_signal,
            stop_timeout: config.stop_timeout,
            shell: config.shell,
            host_config: Some(self.host_config.clone()),
            networking_config,
            ..Default::default()
        }
    }
}

/// Destination path of a `source:dest[:options]` bind entry
pub fn bind_target(bind: &str) -> Option<&str> {
    let mut parts = bind.splitn(3, ':');
    parts.next()?;
    parts.next().filter(|target| !target.is_empty())
}

fn mounts_from_points(points: &[MountPoint]) -> Vec<Mount> {
    points
        .iter()
        .filter_map(|point| {
            let (typ, source) = match point.typ {
                Some(MountPointTypeEnum::BIND) => (MountTypeEnum::BIND, point.source.clone()),
                Some(MountPointTypeEnum::VOLUME) => (MountTypeEnum::VOLUME, point.name.clone()),
                Some(MountPointTypeEnum::TMPFS) => (MountTypeEnum::TMPFS, None),
                Some(MountPointTypeEnum::NPIPE) => (MountTypeEnum::NPIPE, point.source.clone()),
                _ => {
                    log::debug!("not carrying over mount point {:?}", point);
                    return None;
                }
            };
            Some(Mount {
                target: point.destination.clone(),
                source,
                typ: Some(typ),
                read_only: point.rw.map(|rw| !rw),
                ..Default::default()
            })
        })
        .collect()
}

/// Keep only the endpoint settings that belong to the container's own
/// configuration, not the ones the engine assigned at runtime
fn endpoint_for_create(settings: &EndpointSettings) -> EndpointSettings {
    let ipam_config = settings.ipam_config.as_ref().and_then(|ipam| {
        if ipam.ipv4_address.is_none() && ipam.ipv6_address.is_none() {
            None
        } else {
            Some(EndpointIpamConfig {
                ipv4_address: ipam.ipv4_address.clone(),
                ipv6_address: ipam.ipv6_address.clone(),
                ..Default::default()
            })
        }
    });
    EndpointSettings {
        aliases: settings.aliases.clone(),
        ipam_config,
        ..Default::default()
    }
}

fn order_networks(
    network_mode: Option<&str>,
    networks: HashMap<String, EndpointSettings>,
) -> Vec<(String, EndpointSettings)> {
    let mut sorted: BTreeMap<String, EndpointSettings> = networks.into_iter().collect();
    let mut ordered = Vec::with_capacity(sorted.len());
    if let Some(primary) = network_mode.and_then(|mode| sorted.remove_entry(mode)) {
        ordered.push(primary);
    }
    ordered.extend(sorted);
    ordered
        .into_iter()
        .map(|(name, settings)| {
            let endpoint = endpoint_for_create(&settings);
            (name, endpoint)
        })
        .collect()
}
