//! One update cycle over every running container

mod decision;

pub use decision::{extract_local_digest, needs_update};

use crate::{
    config::{Config, ENABLE_LABEL},
    container::{recreate, recreate_self},
    engine::{read_running, short_id, ContainerSnapshot, Engine},
    errors::UpdateError,
    identity::SelfId,
    image::ImageReference,
    registry::RegistryClient,
};
use std::{collections::HashMap, fmt, sync::Arc};
use tokio_util::sync::CancellationToken;

/// What happened to one container during a cycle
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    /// Left alone by policy, or never reached before shutdown
    Skipped,
    UpToDate,
    Updated { new_id: String },
    Failed(String),
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Skipped => write!(f, "skipped"),
            UpdateOutcome::UpToDate => write!(f, "up to date"),
            UpdateOutcome::Updated { new_id } => write!(f, "updated to {}", short_id(new_id)),
            UpdateOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerReport {
    pub id: String,
    pub name: String,
    pub image: String,
    pub outcome: UpdateOutcome,
}

/// Per-container results of one cycle
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CycleReport {
    pub containers: Vec<ContainerReport>,
}

impl CycleReport {
    fn record(&mut self, snapshot: &ContainerSnapshot, outcome: UpdateOutcome) {
        log::debug!("{} {}", snapshot.name, outcome);
        self.containers.push(ContainerReport {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            image: snapshot.image.clone(),
            outcome,
        });
    }

    /// Look up the outcome for a container by name
    pub fn outcome(&self, name: &str) -> Option<&UpdateOutcome> {
        self.containers
            .iter()
            .find(|report| report.name == name)
            .map(|report| &report.outcome)
    }

    /// Containers whose image was checked, whatever the result
    pub fn checked(&self) -> usize {
        self.containers
            .iter()
            .filter(|report| report.outcome != UpdateOutcome::Skipped)
            .count()
    }

    pub fn updated(&self) -> usize {
        self.containers
            .iter()
            .filter(|report| matches!(report.outcome, UpdateOutcome::Updated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.containers
            .iter()
            .filter(|report| matches!(report.outcome, UpdateOutcome::Failed(_)))
            .count()
    }
}

/// Which containers the updater is allowed to touch
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Policy {
    /// Include containers unless labeled out, instead of only labeled-in ones
    pub watch_all: bool,
}

impl Policy {
    /// Check the enable label against the watch mode
    pub fn includes(&self, labels: &HashMap<String, String>) -> bool {
        let label = labels.get(ENABLE_LABEL).map(|value| value.trim());
        if self.watch_all {
            !matches!(label, Some(value) if value.eq_ignore_ascii_case("false"))
        } else {
            matches!(label, Some(value) if value.eq_ignore_ascii_case("true"))
        }
    }
}

/// Can this configured image ever move to a newer image?
///
/// Not if it is empty, a bare image id, or pinned by digest.
pub fn is_updatable(image: &str) -> bool {
    if image.is_empty() || image.starts_with("sha256:") {
        return false;
    }
    ImageReference::parse(image).version().is_tag()
}

/// Runs update cycles against one engine
///
/// The self id is worked out once at startup and handed in here. Nothing
/// else carries over between cycles.
pub struct Updater<E: Engine + ?Sized + 'static> {
    engine: Arc<E>,
    registry: RegistryClient,
    config: Config,
    self_id: SelfId,
}

impl<E: Engine + ?Sized + 'static> Updater<E> {
    pub fn new(engine: Arc<E>, registry: RegistryClient, config: Config, self_id: SelfId) -> Self {
        Updater {
            engine,
            registry,
            config,
            self_id,
        }
    }

    pub fn policy(&self) -> Policy {
        Policy {
            watch_all: self.config.watch_all,
        }
    }

    pub fn self_id(&self) -> &SelfId {
        &self.self_id
    }

    /// Check every running container and replace the ones whose image moved
    ///
    /// Containers are handled one at a time. Cancellation ends an update
    /// check in progress, but never interrupts a recreation. Our own
    /// container, if self-update is on, always goes last.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, UpdateError> {
        let snapshots = read_running(&*self.engine)
            .await
            .map_err(UpdateError::ListContainers)?;
        log::info!("starting update cycle, {} containers running", snapshots.len());

        let mut report = CycleReport::default();
        let mut own = None;
        let mut candidates = Vec::new();
        for snapshot in snapshots {
            if self.self_id.matches(&snapshot.id) {
                if self.config.self_update {
                    log::debug!("{} is this container, checking it last", snapshot.name);
                    own = Some(snapshot);
                } else {
                    report.record(&snapshot, UpdateOutcome::Skipped);
                }
            } else if !is_updatable(&snapshot.image) {
                log::debug!(
                    "{} image {:?} can't be updated",
                    snapshot.name,
                    snapshot.image
                );
                report.record(&snapshot, UpdateOutcome::Skipped);
            } else if !self.policy().includes(&snapshot.labels) {
                log::debug!("{} excluded by {} label", snapshot.name, ENABLE_LABEL);
                report.record(&snapshot, UpdateOutcome::Skipped);
            } else {
                candidates.push(snapshot);
            }
        }

        let mut stale = Vec::new();
        for snapshot in candidates {
            match self.check(&snapshot, cancel).await {
                None => report.record(&snapshot, UpdateOutcome::Skipped),
                Some(Ok(false)) => report.record(&snapshot, UpdateOutcome::UpToDate),
                Some(Ok(true)) => stale.push(snapshot),
                Some(Err(err)) => {
                    log::warn!("{} update check failed: {}", snapshot.name, err);
                    report.record(&snapshot, UpdateOutcome::Failed(err.to_string()));
                }
            }
        }

        for snapshot in stale {
            if cancel.is_cancelled() {
                report.record(&snapshot, UpdateOutcome::Skipped);
                continue;
            }
            let outcome = self.update(&snapshot).await;
            report.record(&snapshot, outcome);
        }

        if let Some(snapshot) = own {
            let outcome = if cancel.is_cancelled() {
                UpdateOutcome::Skipped
            } else {
                self.update_self(snapshot.clone(), cancel).await
            };
            report.record(&snapshot, outcome);
        }

        if cancel.is_cancelled() {
            log::info!("update cycle interrupted by shutdown");
        }
        log::info!(
            "update cycle complete, checked {}, updated {}, failed {}",
            report.checked(),
            report.updated(),
            report.failed()
        );
        Ok(report)
    }

    /// Run the update check unless shutdown arrives first
    ///
    /// Returns `None` when cancelled, whether before or during the registry
    /// request or pull.
    async fn check(
        &self,
        snapshot: &ContainerSnapshot,
        cancel: &CancellationToken,
    ) -> Option<Result<bool, UpdateError>> {
        if cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("{} update check interrupted by shutdown", snapshot.name);
                None
            }
            result = needs_update(&*self.engine, &self.registry, snapshot) => Some(result),
        }
    }

    async fn update(&self, snapshot: &ContainerSnapshot) -> UpdateOutcome {
        log::info!("{} updating to {}", snapshot.name, snapshot.image);
        match recreate(
            &*self.engine,
            &snapshot.id,
            &snapshot.image,
            self.config.stop_timeout,
        )
        .await
        {
            Ok(new_id) => {
                log::info!(
                    "{} updated, {} -> {}",
                    snapshot.name,
                    snapshot.short_id(),
                    short_id(&new_id)
                );
                if self.config.cleanup {
                    self.remove_old_image(snapshot).await;
                }
                UpdateOutcome::Updated { new_id }
            }
            Err(err) => {
                log::error!("{} update failed: {}", snapshot.name, err);
                UpdateOutcome::Failed(err.to_string())
            }
        }
    }

    async fn remove_old_image(&self, snapshot: &ContainerSnapshot) {
        if snapshot.image_id.is_empty() {
            return;
        }
        match self.engine.remove_image(&snapshot.image_id).await {
            Ok(()) => log::info!("removed old image {}", short_id(&snapshot.image_id)),
            Err(err) => log::debug!(
                "old image {} not removed: {}",
                short_id(&snapshot.image_id),
                err
            ),
        }
    }

    async fn update_self(
        &self,
        mut snapshot: ContainerSnapshot,
        cancel: &CancellationToken,
    ) -> UpdateOutcome {
        // the engine lists a bare image id once the local tag has moved on
        if snapshot.image.starts_with("sha256:") {
            match self.engine.inspect_container(&snapshot.id).await {
                Ok(inspect) => {
                    if let Some(image) = inspect
                        .config
                        .and_then(|config| config.image)
                        .filter(|image| is_updatable(image))
                    {
                        log::debug!(
                            "self-update: using configured image {} instead of {}",
                            image,
                            short_id(&snapshot.image)
                        );
                        snapshot.image = image;
                    }
                }
                Err(err) => log::debug!("self-update: could not inspect this container: {}", err),
            }
        }

        if !is_updatable(&snapshot.image) {
            log::debug!("self-update: image {:?} can't be updated", snapshot.image);
            return UpdateOutcome::Skipped;
        }

        match self.check(&snapshot, cancel).await {
            None => UpdateOutcome::Skipped,
            Some(Ok(false)) => {
                log::debug!("self-update: {} is up to date", snapshot.image);
                UpdateOutcome::UpToDate
            }
            Some(Ok(true)) => {
                log::info!(
                    "self-update: replacing {} with {}",
                    snapshot.name,
                    snapshot.image
                );
                let err = recreate_self(self.engine.clone(), &snapshot.id, &snapshot.image).await;
                log::error!("self-update failed: {}", err);
                UpdateOutcome::Failed(err.to_string())
            }
            Some(Err(err)) => {
                log::error!("self-update check failed: {}", err);
                UpdateOutcome::Failed(err.to_string())
            }
        }
    }
}
