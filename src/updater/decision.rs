//! Deciding whether a running container's image is out of date
//!
//! The registry digest is checked first. Pulling and comparing image ids is
//! the fallback whenever that check can't give an answer.

use crate::{
    engine::{short_id, ContainerSnapshot, Engine},
    errors::UpdateError,
    image::{ImageReference, RepoDigest},
    registry::{DefaultRegistry, RegistryClient},
};

/// Does this container's image reference now point somewhere else?
///
/// A registry failure is never an error here, it only switches to pulling.
/// When the answer is yes, the new image has already been pulled by the time
/// this returns, ready for recreation.
pub async fn needs_update<E: Engine + ?Sized>(
    engine: &E,
    registry: &RegistryClient,
    snapshot: &ContainerSnapshot,
) -> Result<bool, UpdateError> {
    let reference = ImageReference::parse(&snapshot.image);

    let remote = match registry.resolve_digest(&reference).await {
        Ok(digest) => digest,
        Err(err) => {
            log::debug!(
                "{} digest check for {} failed, pulling instead: {}",
                snapshot.name,
                snapshot.image,
                err
            );
            return pull_and_compare(engine, registry, &reference, snapshot).await;
        }
    };

    let local = match extract_local_digest(&reference, &snapshot.repo_digests) {
        Some(digest) => digest,
        None => {
            log::debug!(
                "{} has no local digest for {}, pulling instead",
                snapshot.name,
                snapshot.image
            );
            return pull_and_compare(engine, registry, &reference, snapshot).await;
        }
    };

    if remote == local {
        log::debug!("{} is up to date at {}", snapshot.name, short_id(&remote));
        return Ok(false);
    }

    log::info!(
        "{} has an update for {}, {} -> {}",
        snapshot.name,
        snapshot.image,
        short_id(&local),
        short_id(&remote)
    );
    pull(engine, registry, &reference, snapshot).await?;
    Ok(true)
}

/// Pick the digest the engine recorded for this reference's repository
///
/// Engines store the repository fully qualified, as a bare path, or for
/// library images as just the short name. If no record matches any of those
/// we take the first record, since an image usually has only one.
pub fn extract_local_digest(reference: &ImageReference, repo_digests: &[String]) -> Option<String> {
    let records: Vec<RepoDigest> = repo_digests
        .iter()
        .filter_map(|record| RepoDigest::parse(record))
        .collect();

    let mut names = vec![
        format!("{}/{}", reference.registry(), reference.repository_str()),
        reference.repository_str().to_owned(),
    ];
    let defaults = DefaultRegistry::new();
    if defaults.is_default_host(reference.registry()) {
        names.extend(defaults.local_repository_aliases(reference.repository_str()));
    }

    records
        .iter()
        .find(|record| names.iter().any(|name| name == record.repository_str()))
        .or_else(|| records.first())
        .map(|record| record.digest_str().to_owned())
        .filter(|digest| !digest.is_empty())
}

async fn pull<E: Engine + ?Sized>(
    engine: &E,
    registry: &RegistryClient,
    reference: &ImageReference,
    snapshot: &ContainerSnapshot,
) -> Result<(), UpdateError> {
    let login = registry
        .credential_store()
        .and_then(|store| store.credentials_for(reference.registry()));
    log::debug!(
        "{} pulling {}:{}",
        snapshot.name,
        reference.name_str(),
        reference.tag_str()
    );
    engine
        .pull_image(reference.name_str(), reference.tag_str(), login.as_ref())
        .await
        .map_err(|source| UpdateError::Pull {
            image: snapshot.image.clone(),
            source,
        })
}

async fn pull_and_compare<E: Engine + ?Sized>(
    engine: &E,
    registry: &RegistryClient,
    reference: &ImageReference,
    snapshot: &ContainerSnapshot,
) -> Result<bool, UpdateError> {
    pull(engine, registry, reference, snapshot).await?;
    let pulled = engine
        .inspect_image(&snapshot.image)
        .await
        .map_err(|source| UpdateError::InspectImage {
            image: snapshot.image.clone(),
            source,
        })?;

    if pulled.id == snapshot.image_id {
        log::debug!("{} is up to date after pulling", snapshot.name);
        Ok(false)
    } else {
        log::info!(
            "{} has an update for {}, image {} -> {}",
            snapshot.name,
            snapshot.image,
            short_id(&snapshot.image_id),
            short_id(&pulled.id)
        );
        Ok(true)
    }
}
