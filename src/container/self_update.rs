use crate::{
    container::{
        recreate::{create_from_plan, plan_for},
        RecreationPlan,
    },
    engine::{short_id, Engine},
    errors::RecreateError,
};
use std::sync::Arc;

/// Suffix for the name our own container is moved to while its replacement
/// takes over the original name
pub const OLD_NAME_SUFFIX: &str = "-old";

/// Replace the container this process is running in
///
/// The order differs from [crate::container::recreate] so that the process
/// is never stopped before its replacement is running: rename ourselves out
/// of the way, create and start the replacement under our name, then
/// force-remove ourselves. The sequence runs in its own task, which keeps
/// going even if the caller stops waiting for it.
///
/// Removing ourselves normally ends this process, so this only returns when
/// something went wrong. Finishing the whole sequence and still running is
/// [RecreateError::SurvivedSelfRemoval].
pub async fn recreate_self<E: Engine + ?Sized + 'static>(
    engine: Arc<E>,
    container_id: &str,
    image: &str,
) -> RecreateError {
    let container_id = container_id.to_owned();
    let image = image.to_owned();
    let task = tokio::spawn(async move { replace_running(&*engine, &container_id, &image).await });
    let new_id = match task.await {
        Ok(Ok(new_id)) => new_id,
        Ok(Err(err)) => return err,
        Err(err) => return err.into(),
    };
    log::warn!(
        "self-update: still running after handing over to {}",
        short_id(&new_id)
    );
    RecreateError::SurvivedSelfRemoval { new_id }
}

async fn replace_running<E: Engine + ?Sized>(
    engine: &E,
    container_id: &str,
    image: &str,
) -> Result<String, RecreateError> {
    let plan = plan_for(engine, container_id, image).await?;
    let temp_name = format!("{}{}", plan.name, OLD_NAME_SUFFIX);

    log::debug!("self-update: renaming {} to {}", plan.name, temp_name);
    engine
        .rename_container(container_id, &temp_name)
        .await
        .map_err(|source| RecreateError::Rename {
            name: plan.name.clone(),
            temp_name: temp_name.clone(),
            source,
        })?;

    log::debug!("self-update: creating {} from {}", plan.name, image);
    let new_id = match create_from_plan(engine, &plan).await {
        Ok(new_id) => new_id,
        Err(err) => {
            restore_name(engine, container_id, &plan).await;
            return Err(err);
        }
    };

    log::info!(
        "self-update: starting replacement {} as {}",
        short_id(&new_id),
        plan.name
    );
    if let Err(source) = engine.start_container(&new_id).await {
        if let Err(err) = engine.remove_container(&new_id).await {
            log::warn!(
                "self-update: could not remove failed replacement {}: {}",
                short_id(&new_id),
                err
            );
        }
        restore_name(engine, container_id, &plan).await;
        return Err(RecreateError::Start {
            name: plan.name.clone(),
            source,
        });
    }

    log::info!("self-update: replacement started, removing this container");
    if let Err(err) = engine.remove_container(container_id).await {
        log::warn!("self-update: could not remove this container: {}", err);
    }
    Ok(new_id)
}

async fn restore_name<E: Engine + ?Sized>(engine: &E, container_id: &str, plan: &RecreationPlan) {
    if let Err(err) = engine.rename_container(container_id, &plan.name).await {
        log::error!(
            "self-update: could not rename {} back to {}: {}",
            short_id(container_id),
            plan.name,
            err
        );
    }
}
