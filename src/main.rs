use env_logger::{from_env, Env};
use isengard::{Config, DockerEngine, RegistryClient, SelfId, Updater};
use std::{process, sync::Arc, time::Duration};
use tokio::{
    signal::unix::{signal, SignalKind},
    time::{interval_at, Instant},
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let (config, invalid) = Config::from_args();
    let log_level = config.log_level.to_string().to_lowercase();
    from_env(Env::default().default_filter_or(log_level)).init();
    for setting in &invalid {
        log::warn!("ignoring {}, using the default", setting);
    }

    log::info!(
        "starting isengard {}, interval {:?}, run once {}, cleanup {}, watch all {}, self-update {}, stop timeout {:?}",
        env!("CARGO_PKG_VERSION"),
        config.interval,
        config.run_once,
        config.cleanup,
        config.watch_all,
        config.self_update,
        config.stop_timeout
    );

    let engine = match DockerEngine::connect() {
        Ok(engine) => engine,
        Err(err) => {
            log::error!("can't create docker client: {}", err);
            process::exit(1);
        }
    };
    match engine.server_version().await {
        Ok(version) => log::info!("connected to docker {}", version),
        Err(err) => {
            log::error!("can't connect to docker: {}", err);
            process::exit(1);
        }
    }

    let credentials = config.docker_config.join("config.json");
    if credentials.is_dir() {
        log::warn!(
            "{:?} is a directory, private registry logins will not work. Mount the file itself, not its directory",
            credentials
        );
    }

    let registry = match RegistryClient::builder()
        .docker_config_dir(&config.docker_config)
        .connect_timeout(Duration::from_secs(10))
        .request_timeout(Duration::from_secs(30))
        .build()
    {
        Ok(registry) => registry,
        Err(err) => {
            log::error!("can't create registry client: {}", err);
            process::exit(1);
        }
    };

    let self_id = SelfId::detect();
    match self_id.as_str() {
        Some(id) => log::info!("running in container {}", id),
        None => log::info!("not running in a container we can identify"),
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let interval = config.interval;
    let run_once = config.run_once;
    let updater = Updater::new(Arc::new(engine), registry, config, self_id);

    run_cycle(&updater, &cancel).await;
    if run_once {
        log::info!("run-once mode, exiting");
        return;
    }

    let mut ticker = interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => run_cycle(&updater, &cancel).await,
        }
    }
    log::info!("shutting down");
}

async fn run_cycle(updater: &Updater<DockerEngine>, cancel: &CancellationToken) {
    if cancel.is_cancelled() {
        return;
    }
    if let Err(err) = updater.run_cycle(cancel).await {
        log::error!("update cycle failed: {}", err);
    }
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            log::warn!("can't listen for SIGTERM: {}", err);
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => log::info!("received SIGINT, shutting down"),
        _ = terminate.recv() => log::info!("received SIGTERM, shutting down"),
    }
    cancel.cancel();
}
