use crate::{
    container::RecreationPlan,
    engine::{short_id, Engine},
    errors::RecreateError,
};
use std::time::Duration;

/// Read a container's configuration and plan its replacement
pub(crate) async fn plan_for<E: Engine + ?Sized>(
    engine: &E,
    container_id: &str,
    image: &str,
) -> Result<RecreationPlan, RecreateError> {
    let inspect = engine
        .inspect_container(container_id)
        .await
        .map_err(|source| RecreateError::Inspect {
            id: container_id.to_owned(),
            source,
        })?;
    let plan = RecreationPlan::from_inspect(inspect, image)?;
    log::debug!(
        "{} captured configuration, {} mounts, {} networks",
        plan.name,
        plan.host_config.mounts.as_ref().map(Vec::len).unwrap_or(0),
        plan.networks.len()
    );
    Ok(plan)
}

/// Create the planned container and attach its networks, returning the new id
///
/// Only the creation itself can fail here. A secondary network that won't
/// attach leaves the container with partial connectivity, which is logged.
pub(crate) async fn create_from_plan<E: Engine + ?Sized>(
    engine: &E,
    plan: &RecreationPlan,
) -> Result<String, RecreateError> {
    let new_id = engine
        .create_container(&plan.name, plan.create_config())
        .await
        .map_err(|source| RecreateError::Create {
            name: plan.name.clone(),
            source,
        })?;

    for (network, endpoint) in plan.secondary_networks() {
        if let Err(err) = engine
            .connect_network(network, &new_id, endpoint.clone())
            .await
        {
            log::warn!(
                "{} could not connect network {}: {}",
                plan.name,
                network,
                err
            );
        }
    }
    Ok(new_id)
}

/// Replace a container with one running `image`, keeping its name and
/// configuration
///
/// The old container is stopped and removed before the replacement is
/// created, so a failure to create or start leaves nothing running under
/// this name until the next cycle.
pub async fn recreate<E: Engine + ?Sized>(
    engine: &E,
    container_id: &str,
    image: &str,
    stop_grace: Duration,
) -> Result<String, RecreateError> {
    let plan = plan_for(engine, container_id, image).await?;

    if let Err(err) = engine.stop_container(container_id, stop_grace).await {
        log::warn!(
            "{} did not stop cleanly, removing by force: {}",
            plan.name,
            err
        );
    }
    engine
        .remove_container(container_id)
        .await
        .map_err(|source| RecreateError::Remove {
            name: plan.name.clone(),
            source,
        })?;

    let new_id = create_from_plan(engine, &plan).await?;
    engine
        .start_container(&new_id)
        .await
        .map_err(|source| RecreateError::Start {
            name: plan.name.clone(),
            source,
        })?;

    log::debug!(
        "{} replaced {} with {} running {}",
        plan.name,
        short_id(container_id),
        short_id(&new_id),
        image
    );
    Ok(new_id)
}
