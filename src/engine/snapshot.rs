use crate::{engine::Engine, errors::EngineError};
use bollard::models::ContainerSummary;
use std::collections::HashMap;

/// One running container at the moment the cycle started
///
/// Read fresh every cycle and never mutated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContainerSnapshot {
    pub id: String,
    /// Container name without the engine's leading slash
    pub name: String,
    /// Image reference as configured, e.g. `nginx:1.25`
    pub image: String,
    /// Resolved image id, `sha256:...`
    pub image_id: String,
    pub labels: HashMap<String, String>,
    /// `repository@digest` records of the running image
    pub repo_digests: Vec<String>,
    pub state: String,
}

impl ContainerSnapshot {
    /// First twelve characters of the id, the way engines abbreviate it
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    fn from_summary(summary: ContainerSummary) -> Self {
        let name = summary
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|name| name.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        ContainerSnapshot {
            id: summary.id.unwrap_or_default(),
            name,
            image: summary.image.unwrap_or_default(),
            image_id: summary.image_id.unwrap_or_default(),
            labels: summary.labels.unwrap_or_default(),
            repo_digests: Vec::new(),
            state: summary.state.unwrap_or_default(),
        }
    }
}

/// Abbreviate a container or image id for log output
pub fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    match id.char_indices().nth(12) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// List running containers along with the digests recorded for their images
///
/// A container whose image can't be inspected is still returned, with no
/// digests, so its update check falls back to pulling.
pub async fn read_running<E: Engine + ?Sized>(
    engine: &E,
) -> Result<Vec<ContainerSnapshot>, EngineError> {
    let mut snapshots = Vec::new();
    for summary in engine.list_containers().await? {
        let mut snapshot = ContainerSnapshot::from_summary(summary);
        if snapshot.id.is_empty() {
            continue;
        }
        match engine.inspect_image(&snapshot.image_id).await {
            Ok(image) => snapshot.repo_digests = image.repo_digests,
            Err(err) => log::debug!(
                "{} no digest records for image {}: {}",
                snapshot.name,
                snapshot.image_id,
                err
            ),
        }
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}
