mod common;

use common::{Call, ContainerSpec, FakeEngine, FakeImage};
use isengard::{container::recreate, errors::RecreateError};
use std::time::Duration;

const WEB_ID: &str = "a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";
const IMAGE: &str = "ghcr.io/team/web:stable";
const IMAGE_ID: &str = "sha256:0101010101010101010101010101010101010101010101010101010101010101";

fn engine() -> FakeEngine {
    let engine = FakeEngine::new();
    engine.add_image(FakeImage::new(IMAGE_ID, &[IMAGE], &[]));
    engine.add_running(
        ContainerSpec::new(WEB_ID, "web", IMAGE, IMAGE_ID)
            .label("traefik.enable", "true")
            .network_mode("frontend")
            .network("frontend", &["web"])
            .network("backend", &["api", "web-internal"])
            .network("metrics", &[]),
    );
    engine
}

fn grace() -> Duration {
    Duration::from_secs(10)
}

#[tokio::test]
async fn secondary_networks_attach_before_start() {
    common::init_logging();
    let engine = engine();
    let new_id = recreate(&engine, WEB_ID, IMAGE, grace()).await.unwrap();

    assert_eq!(
        engine.changes(),
        vec![
            Call::Stop(WEB_ID.to_owned()),
            Call::Remove(WEB_ID.to_owned()),
            Call::Create("web".to_owned()),
            Call::Connect {
                network: "backend".to_owned(),
                id: new_id.clone()
            },
            Call::Connect {
                network: "metrics".to_owned(),
                id: new_id.clone()
            },
            Call::Start(new_id.clone()),
        ]
    );

    let created = engine.created();
    let endpoints = created[0]
        .1
        .networking_config
        .clone()
        .unwrap()
        .endpoints_config;
    assert_eq!(endpoints.len(), 1);
    assert_eq!(
        endpoints["frontend"].aliases,
        Some(vec!["web".to_owned()])
    );

    let replacement = engine.container_named("web").unwrap();
    let networks = replacement.network_settings.unwrap().networks.unwrap();
    assert_eq!(networks.len(), 3);
    assert_eq!(
        networks["backend"].aliases,
        Some(vec!["api".to_owned(), "web-internal".to_owned()])
    );
    assert!(engine.is_running(&new_id));
}

#[tokio::test]
async fn network_failure_is_not_fatal() {
    common::init_logging();
    let engine = engine();
    engine.fail("connect");
    let new_id = recreate(&engine, WEB_ID, IMAGE, grace()).await.unwrap();
    assert!(engine.is_running(&new_id));
}

#[tokio::test]
async fn stop_failure_is_not_fatal() {
    common::init_logging();
    let engine = engine();
    engine.fail("stop");
    let new_id = recreate(&engine, WEB_ID, IMAGE, grace()).await.unwrap();
    let changes = engine.changes();
    assert_eq!(changes[0], Call::Stop(WEB_ID.to_owned()));
    assert_eq!(changes[1], Call::Remove(WEB_ID.to_owned()));
    assert!(engine.is_running(&new_id));
}

#[tokio::test]
async fn create_failure_surfaces() {
    common::init_logging();
    let engine = engine();
    engine.fail("create");
    let result = recreate(&engine, WEB_ID, IMAGE, grace()).await;
    assert!(matches!(result, Err(RecreateError::Create { ref name, .. }) if name == "web"));
    assert!(!engine
        .changes()
        .iter()
        .any(|call| matches!(call, Call::Start(_))));
}

#[tokio::test]
async fn start_failure_surfaces() {
    common::init_logging();
    let engine = engine();
    engine.fail("start");
    let result = recreate(&engine, WEB_ID, IMAGE, grace()).await;
    assert!(matches!(result, Err(RecreateError::Start { .. })));
}

#[tokio::test]
async fn unknown_container() {
    common::init_logging();
    let engine = engine();
    let result = recreate(&engine, "nope", IMAGE, grace()).await;
    assert!(matches!(result, Err(RecreateError::Inspect { .. })));
    assert!(engine.changes().is_empty());
}

#[tokio::test]
async fn labels_survive() {
    common::init_logging();
    let engine = engine();
    recreate(&engine, WEB_ID, "ghcr.io/team/web:next", grace())
        .await
        .unwrap();
    let replacement = engine.container_named("web").unwrap();
    let config = replacement.config.unwrap();
    assert_eq!(config.image.as_deref(), Some("ghcr.io/team/web:next"));
    assert_eq!(
        config.labels.unwrap().get("traefik.enable").map(String::as_str),
        Some("true")
    );
}
